//! Learning rate scheduling.
//!
//! Training monitors validation loss and decays the learning rate when it
//! plateaus, mirroring the classic reduce-on-plateau policy: after `patience`
//! epochs without meaningful improvement the rate is multiplied by `factor`,
//! never dropping below `min_lr`.

use tracing::info;

/// Learning rate schedule variants
#[derive(Debug, Clone)]
pub enum SchedulerType {
    /// Fixed learning rate for the whole run
    Constant,
    /// Multiply the rate by `factor` after `patience` epochs without
    /// improvement of the monitored metric
    ReduceOnPlateau {
        factor: f64,
        patience: usize,
        threshold: f64,
        min_lr: f64,
    },
}

impl SchedulerType {
    /// The policy used for this pipeline: factor 0.1, patience 2,
    /// floor 1e-6 on validation loss.
    pub fn plateau_default() -> Self {
        Self::ReduceOnPlateau {
            factor: 0.1,
            patience: 2,
            threshold: 1e-4,
            min_lr: 1e-6,
        }
    }
}

/// Stateful learning rate scheduler
#[derive(Debug, Clone)]
pub struct LearningRateScheduler {
    scheduler_type: SchedulerType,
    current_lr: f64,
    best_metric: f64,
    epochs_without_improvement: usize,
}

impl LearningRateScheduler {
    pub fn new(scheduler_type: SchedulerType, initial_lr: f64) -> Self {
        Self {
            scheduler_type,
            current_lr: initial_lr,
            best_metric: f64::INFINITY,
            epochs_without_improvement: 0,
        }
    }

    /// Current learning rate
    pub fn get_lr(&self) -> f64 {
        self.current_lr
    }

    /// Update the schedule with this epoch's monitored metric (lower is
    /// better). Returns the learning rate to use for the next epoch.
    pub fn step_with_metric(&mut self, metric: f64) -> f64 {
        match self.scheduler_type {
            SchedulerType::Constant => {}
            SchedulerType::ReduceOnPlateau {
                factor,
                patience,
                threshold,
                min_lr,
            } => {
                if metric < self.best_metric - threshold {
                    self.best_metric = metric;
                    self.epochs_without_improvement = 0;
                } else {
                    self.epochs_without_improvement += 1;

                    if self.epochs_without_improvement >= patience {
                        let new_lr = (self.current_lr * factor).max(min_lr);
                        if new_lr < self.current_lr {
                            info!(
                                "Plateau detected, reducing learning rate {:.2e} -> {:.2e}",
                                self.current_lr, new_lr
                            );
                            self.current_lr = new_lr;
                        }
                        self.epochs_without_improvement = 0;
                    }
                }
            }
        }

        self.current_lr
    }
}
