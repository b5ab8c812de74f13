//! End-to-end generate → train → evaluate in a temp data directory

use agri_yield_core::{FeaturePipeline, ModelKind, YieldModel, FEATURE_COLUMNS, RAW_FEATURES, TARGET_COLUMN};
use agri_yield_trainer::workflow::PREDICTIONS_FILE;
use agri_yield_trainer::{generate, run_evaluation, run_training, write_csv, WorkflowOptions};
use anyhow::Result;
use tempfile::tempdir;

fn options(data_dir: &std::path::Path, kind: ModelKind) -> WorkflowOptions {
    let mut opts = WorkflowOptions::for_data_dir(data_dir);
    opts.model_kind = kind;
    opts.trees = Some(12);
    opts.cv_folds = 3;
    opts
}

#[test]
fn test_generated_file_has_canonical_header() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("raw").join("sample_data.csv");
    write_csv(&generate(25, 42), &path)?;

    let table = FeaturePipeline::load_data(&path)?;
    assert_eq!(table.len(), 25);
    let mut expected: Vec<String> = RAW_FEATURES.iter().map(|s| s.to_string()).collect();
    expected.push(TARGET_COLUMN.to_string());
    assert_eq!(table.columns(), expected.as_slice());
    Ok(())
}

#[test]
fn test_same_seed_same_file() -> Result<()> {
    let dir = tempdir()?;
    let a = dir.path().join("a.csv");
    let b = dir.path().join("b.csv");
    write_csv(&generate(40, 9), &a)?;
    write_csv(&generate(40, 9), &b)?;
    assert_eq!(std::fs::read(&a)?, std::fs::read(&b)?);
    Ok(())
}

#[test]
fn test_train_then_evaluate() -> Result<()> {
    let dir = tempdir()?;
    let opts = options(dir.path(), ModelKind::RandomForest);
    write_csv(&generate(200, 42), &opts.data_path)?;

    let report = run_training(&opts)?;
    assert_eq!(report.test_rows, 40);
    assert_eq!(report.train_rows, 160);
    assert!(report.metrics.r2_score > 0.2, "r2 {}", report.metrics.r2_score);
    assert!(report.cv.cv_rmse_mean > 0.0);
    assert_eq!(report.importance.len(), FEATURE_COLUMNS.len());
    assert!(report.importance.windows(2).all(|w| w[0].1 >= w[1].1));
    assert!(opts.model_path.exists());
    assert!(opts.scaler_path.exists());

    let out = dir.path().join("eval");
    let evaluation = run_evaluation(&opts, &out)?;
    assert_eq!(evaluation.actual.len(), 40);
    // Same rows, same artifacts: evaluation reproduces the training metrics
    assert!((evaluation.metrics.rmse - report.metrics.rmse).abs() < 1e-9);

    let written = std::fs::read_to_string(out.join(PREDICTIONS_FILE))?;
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("actual,predicted,residual"));
    assert_eq!(lines.count(), 40);
    Ok(())
}

#[test]
fn test_gradient_boosting_artifacts_reload() -> Result<()> {
    let dir = tempdir()?;
    let opts = options(dir.path(), ModelKind::GradientBoosting);
    write_csv(&generate(120, 5), &opts.data_path)?;

    run_training(&opts)?;
    let model = YieldModel::load(&opts.model_path)?;
    assert_eq!(model.kind(), ModelKind::GradientBoosting);
    assert!(model.is_trained());
    Ok(())
}

#[test]
fn test_evaluate_without_artifacts_fails() -> Result<()> {
    let dir = tempdir()?;
    let opts = options(dir.path(), ModelKind::RandomForest);
    write_csv(&generate(30, 1), &opts.data_path)?;

    let err = run_evaluation(&opts, dir.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to load model"));
    Ok(())
}
