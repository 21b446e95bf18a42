//! Training pipeline: epoch loop, scheduling, checkpointing, and history

pub mod checkpoint;
pub mod history;
pub mod run;
pub mod scheduler;

pub use checkpoint::{Checkpoint, Checkpointer};
pub use history::{EpochRecord, TrainingHistory};
pub use run::{multi_head_bce, run};
pub use scheduler::{LearningRateScheduler, SchedulerType};
