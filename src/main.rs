//! Command-line entry point for the chest X-ray training pipeline.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use chexray::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use chexray::config::RunConfig;
use chexray::dataset::manifest::Manifest;
use chexray::inference::Predictor;
use chexray::utils::logging::{init_logging, LogConfig};

#[derive(Parser)]
#[command(name = "chexray")]
#[command(about = "Multi-label chest X-ray finding classification", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model and score the test split
    Train {
        /// Path to the run configuration JSON
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Run the best checkpoint over the test split
    Predict {
        /// Path to the run configuration JSON
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// Where to write the predictions JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    init_logging(&log_config).map_err(|e| anyhow::anyhow!(e))?;

    println!();
    println!("{}", "CheXray Training Pipeline".bright_cyan().bold());
    println!("{}", format!("Backend: {}", backend_name()).dimmed());
    println!();

    match cli.command {
        Commands::Train { config } => {
            let config = RunConfig::load(&config)?;
            chexray::training::run::<TrainingBackend>(&config, &default_device())?;
            println!("{}", "Training complete".green().bold());
        }

        Commands::Predict { config, output } => {
            let config = RunConfig::load(&config)?;
            let device = default_device();

            let predictor = Predictor::<DefaultBackend>::from_checkpoint(
                &config.weights_dir,
                config.num_classes,
                device,
                config.image_size(),
            )?;

            let test = Manifest::from_csv(
                &config.meta_base_path.join("test.csv"),
                &config.image_base_path,
            )?;
            let predictions = predictor.predict_manifest(&test, config.test_batch)?;

            let output = output.unwrap_or_else(|| config.weights_dir.join("predictions.json"));
            std::fs::write(&output, serde_json::to_string_pretty(&predictions)?)?;
            println!(
                "{}",
                format!("Wrote {} predictions to {}", predictions.len(), output.display())
                    .green()
            );
        }
    }

    Ok(())
}
