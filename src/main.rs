//! GAT homology CLI
//!
//! Runs the hidden-width sweep and scores saved checkpoints.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gat_homology::{
    evaluation::FoldMetrics,
    model::load_checkpoint,
    training::test,
    utils::{hardware_name, infer, Device},
    Dataset, GraphLoader, SweepConfig, SweepDriver,
};

#[derive(Parser)]
#[command(name = "gat_homology")]
#[command(about = "Hidden-width selection for GAT homology models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cross-validate every candidate hidden width
    Sweep {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the sample directory
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Override the checkpoint directory
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,

        /// Write a JSON report to this file
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Write the default configuration
    InitConfig {
        /// Output file path
        #[arg(short, long, default_value = "sweep.toml")]
        output: PathBuf,
    },

    /// Score a saved checkpoint on a sample directory
    Predict {
        /// Checkpoint file
        #[arg(long)]
        checkpoint: PathBuf,

        /// Sample directory
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Graphs per batch
        #[arg(short, long, default_value = "16")]
        batch_size: usize,

        /// Binary label cut-off
        #[arg(short, long, default_value = "0.5")]
        threshold: f64,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sweep {
            config,
            data_dir,
            checkpoint_dir,
            report,
        } => {
            let mut sweep_config = match &config {
                Some(path) => SweepConfig::from_file(path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => SweepConfig::default(),
            };
            if let Some(dir) = data_dir {
                sweep_config.data.data_dir = dir;
            }
            if let Some(dir) = checkpoint_dir {
                sweep_config.sweep.checkpoint_dir = dir;
            }
            if report.is_some() {
                sweep_config.sweep.report_path = report;
            }

            info!("Device: {}", hardware_name());
            info!("Data: {}", sweep_config.data.data_dir.display());
            info!(
                "Checkpoints: {}",
                sweep_config.sweep.checkpoint_dir.display()
            );

            let driver = SweepDriver::new(sweep_config)?;
            let sweep_report = driver.run().context("sweep failed")?;

            match sweep_report.best_candidate() {
                Some(best) => info!(
                    "Best num_hidden_channels = {} ({} folds)",
                    best.hidden_channels,
                    best.folds.len()
                ),
                None => info!("No candidate produced a finite mean R²"),
            }
        }

        Commands::InitConfig { output } => {
            SweepConfig::default()
                .to_file(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!("Default configuration written to {}", output.display());
        }

        Commands::Predict {
            checkpoint,
            data_dir,
            batch_size,
            threshold,
        } => {
            let model = load_checkpoint(&checkpoint)
                .with_context(|| format!("failed to load checkpoint {}", checkpoint.display()))?;
            info!(
                "Loaded {:?} with {} parameters",
                model.architecture(),
                model.num_parameters()
            );

            let dataset = Dataset::load_dir(&data_dir)?;
            let loader = GraphLoader::full(&dataset, batch_size)?;

            let (y_hat, y_true) = infer(&model, &loader, Device::detect())?;
            let loss = test(&model, &loader)?;
            let metrics = FoldMetrics::compute(&y_true, &y_hat, loss, threshold);
            println!("{}", metrics);
        }
    }

    Ok(())
}
