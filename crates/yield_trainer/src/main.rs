//! Crop yield trainer CLI
//!
//! `generate` writes a synthetic dataset, `train` fits and persists the model
//! and scaler, `evaluate` scores the persisted artifacts.

use agri_yield_core::ModelKind;
use agri_yield_trainer::{plots, run_evaluation, run_training, synthetic, WorkflowOptions};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "agri-trainer")]
#[command(author = "Agri Yield Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Synthetic data, training and evaluation for the crop yield predictor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a synthetic dataset
    Generate {
        /// Number of rows
        #[arg(long, default_value = "1000")]
        samples: usize,

        /// Output CSV path (defaults to <data-dir>/raw/sample_data.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Data directory
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Fit the scaler and model, then persist both
    Train(ModelArgs),

    /// Score the persisted model on the held-out split
    Evaluate {
        #[command(flatten)]
        model: ModelArgs,

        /// Directory for the predictions CSV and charts
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// Data directory holding raw/ and models/
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Dataset path (defaults to <data-dir>/raw/sample_data.csv)
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Model artifact path (defaults to <data-dir>/models/yield_predictor.bin)
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// Scaler artifact path (defaults to <data-dir>/models/scaler.bin)
    #[arg(long)]
    scaler_path: Option<PathBuf>,

    /// Ensemble strategy: random_forest or gradient_boosting
    #[arg(long, default_value = "random_forest")]
    model_type: String,

    /// Number of trees (strategy default when omitted)
    #[arg(long)]
    trees: Option<usize>,

    /// Fraction of rows held out for testing
    #[arg(long, default_value = "0.2")]
    test_size: f64,

    /// Seed for the split and the ensemble
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Cross-validation folds
    #[arg(long, default_value = "5")]
    cv_folds: usize,
}

impl ModelArgs {
    fn into_options(self) -> Result<WorkflowOptions> {
        let model_kind: ModelKind = self
            .model_type
            .parse()
            .with_context(|| format!("Invalid --model-type '{}'", self.model_type))?;

        let mut opts = WorkflowOptions::for_data_dir(&self.data_dir);
        if let Some(path) = self.dataset {
            opts.data_path = path;
        }
        if let Some(path) = self.model_path {
            opts.model_path = path;
        }
        if let Some(path) = self.scaler_path {
            opts.scaler_path = path;
        }
        opts.model_kind = model_kind;
        opts.trees = self.trees;
        opts.test_size = self.test_size;
        opts.seed = self.seed;
        opts.cv_folds = self.cv_folds;
        Ok(opts)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Agri Yield Trainer v{}", env!("CARGO_PKG_VERSION"));
    info!("═══════════════════════════════════════════");

    match cli.command {
        Command::Generate {
            samples,
            output,
            data_dir,
            seed,
        } => {
            let path = output.unwrap_or_else(|| data_dir.join("raw").join("sample_data.csv"));
            info!("Generating {} samples with seed {}", samples, seed);
            let rows = synthetic::generate(samples, seed);
            synthetic::write_csv(&rows, &path)?;
            info!("Sample data generated and saved to {}", path.display());
            synthetic::log_summary(&path)?;
        }
        Command::Train(args) => {
            let opts = args.into_options()?;
            run_training(&opts)?;
        }
        Command::Evaluate { model, output } => {
            let opts = model.into_options()?;
            let report = run_evaluation(&opts, &output)?;
            info!("Generating visualizations...");
            let charts = plots::render(&report, &output);
            info!("═══════════════════════════════════════════");
            info!("✓ Evaluation complete ({} charts)", charts.len());
        }
    }

    Ok(())
}
