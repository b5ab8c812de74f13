//! Training and evaluation workflows
//!
//! Both flows read the same dataset and split it with the same seed, so the
//! evaluation test rows are exactly the rows training held out.

use agri_yield_core::{
    split, BoostingParams, CvMetrics, FeaturePipeline, ForestParams, Metrics, ModelKind,
    TrainTestSplit, YieldModel, FEATURE_COLUMNS,
};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Predictions written next to the evaluation charts
pub const PREDICTIONS_FILE: &str = "evaluation_predictions.csv";

/// Inputs shared by `train` and `evaluate`
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub data_path: PathBuf,
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
    pub model_kind: ModelKind,
    /// Overrides the ensemble size of the default hyperparameters
    pub trees: Option<usize>,
    pub test_size: f64,
    pub seed: u64,
    pub cv_folds: usize,
}

impl WorkflowOptions {
    /// Default paths under `data_dir`
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self {
            data_path: data_dir.join("raw").join("sample_data.csv"),
            model_path: data_dir.join("models").join("yield_predictor.bin"),
            scaler_path: data_dir.join("models").join("scaler.bin"),
            model_kind: ModelKind::RandomForest,
            trees: None,
            test_size: 0.2,
            seed: 42,
            cv_folds: 5,
        }
    }

    fn build_model(&self) -> YieldModel {
        match self.model_kind {
            ModelKind::RandomForest => {
                let defaults = ForestParams::default();
                YieldModel::random_forest(ForestParams {
                    n_estimators: self.trees.unwrap_or(defaults.n_estimators),
                    seed: self.seed,
                    ..defaults
                })
            }
            ModelKind::GradientBoosting => {
                let defaults = BoostingParams::default();
                YieldModel::gradient_boosting(BoostingParams {
                    n_estimators: self.trees.unwrap_or(defaults.n_estimators),
                    seed: self.seed,
                    ..defaults
                })
            }
        }
    }
}

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub train_rows: usize,
    pub test_rows: usize,
    pub metrics: Metrics,
    pub cv: CvMetrics,
    /// `(feature, importance)` sorted by importance, descending
    pub importance: Vec<(String, f64)>,
    pub model_checksum: String,
    pub scaler_checksum: String,
}

/// Outcome of an evaluation run
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub metrics: Metrics,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
}

impl EvaluationReport {
    /// `actual - predicted` per test row
    pub fn residuals(&self) -> Vec<f64> {
        self.actual
            .iter()
            .zip(&self.predicted)
            .map(|(a, p)| a - p)
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct PredictionRow {
    actual: f64,
    predicted: f64,
    residual: f64,
}

/// Load, preprocess and split the dataset
fn load_split(pipeline: &mut FeaturePipeline, opts: &WorkflowOptions, fit: bool) -> Result<TrainTestSplit> {
    info!("Loading data from {}", opts.data_path.display());
    let table = FeaturePipeline::load_data(&opts.data_path).context("Failed to load dataset")?;
    info!("Loaded {} records", table.len());

    info!("Preprocessing data...");
    let (features, targets) = pipeline
        .preprocess(&table, fit)
        .context("Failed to preprocess dataset")?;
    let targets = targets.ok_or_else(|| anyhow!("dataset has no target column"))?;

    let parts = split(&features, &targets, opts.test_size, opts.seed).context("Failed to split dataset")?;
    info!("Training set: {} samples", parts.x_train.len());
    info!("Test set: {} samples", parts.x_test.len());
    Ok(parts)
}

fn log_metrics(metrics: &Metrics) {
    info!("  RMSE: {:.4}", metrics.rmse);
    info!("  MAE: {:.4}", metrics.mae);
    info!("  R2_SCORE: {:.4}", metrics.r2_score);
    info!("  MAPE: {:.4}", metrics.mape);
}

/// Fit a fresh scaler and model, cross-validate, then persist both artifacts
pub fn run_training(opts: &WorkflowOptions) -> Result<TrainingReport> {
    let mut pipeline = FeaturePipeline::new();
    let parts = load_split(&mut pipeline, opts, true)?;

    let mut model = opts.build_model();
    info!("Training {} model...", model.kind());
    let metrics = model
        .train(&parts.x_train, &parts.y_train, Some((parts.x_test.as_slice(), parts.y_test.as_slice())))
        .context("Training failed")?
        .ok_or_else(|| anyhow!("training produced no held-out metrics"))?;

    info!("═══════════════════════════════════════════");
    info!("MODEL PERFORMANCE METRICS");
    log_metrics(&metrics);

    info!("Performing {}-fold cross-validation...", opts.cv_folds);
    let cv = model
        .cross_validate(&parts.x_train, &parts.y_train, opts.cv_folds)
        .context("Cross-validation failed")?;
    info!("CV RMSE Mean: {:.4} (+/- {:.4})", cv.cv_rmse_mean, cv.cv_rmse_std);

    let mut importance: Vec<(String, f64)> = model
        .feature_importance()
        .map(|scores| {
            FEATURE_COLUMNS
                .iter()
                .map(|name| name.to_string())
                .zip(scores)
                .collect()
        })
        .unwrap_or_default();
    importance.sort_by(|a, b| b.1.total_cmp(&a.1));
    info!("Feature importance:");
    for (name, score) in &importance {
        info!("  {:<24} {:.4}", name, score);
    }

    let model_checksum = model.save(&opts.model_path).context("Failed to save model")?;
    let scaler_checksum = pipeline
        .save_scaler(&opts.scaler_path)
        .context("Failed to save scaler")?;

    info!("═══════════════════════════════════════════");
    info!("✓ Training complete");
    info!("  Model: {} ({})", opts.model_path.display(), model_checksum);
    info!("  Scaler: {} ({})", opts.scaler_path.display(), scaler_checksum);

    Ok(TrainingReport {
        train_rows: parts.x_train.len(),
        test_rows: parts.x_test.len(),
        metrics,
        cv,
        importance,
        model_checksum,
        scaler_checksum,
    })
}

/// Score persisted artifacts on the held-out split and write predictions to `output_dir`
pub fn run_evaluation(opts: &WorkflowOptions, output_dir: &Path) -> Result<EvaluationReport> {
    info!("Loading model and scaler...");
    let model = YieldModel::load(&opts.model_path)
        .with_context(|| format!("Failed to load model from {}", opts.model_path.display()))?;
    let mut pipeline = FeaturePipeline::new();
    pipeline
        .load_scaler(&opts.scaler_path)
        .with_context(|| format!("Failed to load scaler from {}", opts.scaler_path.display()))?;

    let parts = load_split(&mut pipeline, opts, false)?;

    let predicted = model.predict(&parts.x_test).context("Prediction failed")?;
    let metrics = model
        .evaluate(&parts.x_test, &parts.y_test)
        .context("Evaluation failed")?;

    info!("═══════════════════════════════════════════");
    info!("MODEL EVALUATION");
    log_metrics(&metrics);

    let report = EvaluationReport {
        metrics,
        actual: parts.y_test,
        predicted,
    };

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let predictions_path = output_dir.join(PREDICTIONS_FILE);
    write_predictions(&report, &predictions_path)?;
    info!("Saved: {}", predictions_path.display());

    Ok(report)
}

fn write_predictions(report: &EvaluationReport, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for ((actual, predicted), residual) in report
        .actual
        .iter()
        .zip(&report.predicted)
        .zip(report.residuals())
    {
        writer.serialize(PredictionRow {
            actual: *actual,
            predicted: *predicted,
            residual,
        })?;
    }
    writer.flush().context("Failed to flush predictions")?;
    Ok(())
}
