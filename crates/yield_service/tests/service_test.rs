//! Prediction and data services against on-disk artifacts and datasets

use agri_yield_core::{FeaturePipeline, ForestParams, YieldModel, RAW_FEATURES, TARGET_COLUMN};
use agri_yield_service::{DataService, PredictionService, RecommendationKind, ServiceError, YIELD_UNIT};
use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_dataset(path: &Path, rows: usize) -> Result<()> {
    let mut content = format!("{},{}\n", RAW_FEATURES.join(","), TARGET_COLUMN);
    for i in 0..rows {
        let f = i as f64;
        let values = [
            20.0 + f % 10.0,
            400.0 + 40.0 * (f % 25.0),
            50.0 + f % 30.0,
            5.5 + 0.1 * (f % 25.0),
            10.0 + f % 30.0,
            5.0 + f % 25.0,
            10.0 + f % 20.0,
            60.0 + 5.0 * (f % 30.0),
            120.0 + 10.0 * (f % 25.0),
            1.0 + f % 19.0,
        ];
        let target = 0.05 * values[0] + 0.002 * values[1] + 0.3 * values[3] + 0.08 * values[4];
        let cells: Vec<String> = values.iter().map(|v| format!("{v}")).collect();
        content.push_str(&format!("{},{target:.3}\n", cells.join(",")));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

fn scenario() -> HashMap<String, f64> {
    let values = [25.0, 400.0, 60.0, 5.0, 10.0, 10.0, 10.0, 100.0, 200.0, 5.0];
    RAW_FEATURES
        .iter()
        .zip(values)
        .map(|(name, v)| (name.to_string(), v))
        .collect()
}

/// Train a small forest on `dataset` and persist model and scaler
fn train_artifacts(dataset: &Path, model_path: &Path, scaler_path: &Path) -> Result<()> {
    let table = FeaturePipeline::load_data(dataset)?;
    let mut pipeline = FeaturePipeline::new();
    let (x, y) = pipeline.preprocess(&table, true)?;
    let y = y.expect("dataset has targets");

    let mut model = YieldModel::random_forest(ForestParams {
        n_estimators: 10,
        max_depth: 6,
        ..ForestParams::default()
    });
    model.train(&x, &y, None)?;
    model.save(model_path)?;
    pipeline.save_scaler(scaler_path)?;
    Ok(())
}

#[test]
fn test_scenario_against_trained_model() -> Result<()> {
    let dir = tempdir()?;
    let dataset = dir.path().join("raw").join("sample_data.csv");
    let model_path = dir.path().join("models").join("yield_predictor.bin");
    let scaler_path = dir.path().join("models").join("scaler.bin");
    write_dataset(&dataset, 100)?;
    train_artifacts(&dataset, &model_path, &scaler_path)?;

    let service = PredictionService::from_paths(&model_path, &scaler_path);
    assert!(service.is_ready());

    let result = service.predict_yield(&scenario())?;
    assert_eq!(result.unit, YIELD_UNIT);
    assert!(result.confidence_score >= 75.0 && result.confidence_score <= 95.0);
    assert!(result.confidence_interval.lower <= result.predicted_yield);
    assert!(result.predicted_yield <= result.confidence_interval.upper);

    let kinds: Vec<RecommendationKind> = result.recommendations.iter().map(|r| r.kind).collect();
    assert!(kinds.contains(&RecommendationKind::Irrigation));
    assert!(kinds.contains(&RecommendationKind::Fertilizer));
    assert!(kinds.contains(&RecommendationKind::SoilManagement));
    Ok(())
}

#[test]
fn test_missing_artifacts_leave_service_unready() -> Result<()> {
    let dir = tempdir()?;
    let service = PredictionService::from_paths(dir.path().join("none.bin"), dir.path().join("none2.bin"));
    assert!(!service.is_ready());

    let err = service.predict_yield(&scenario()).unwrap_err();
    assert!(matches!(err, ServiceError::Prediction(_)));
    assert!(err.to_string().starts_with("Prediction error:"));
    Ok(())
}

#[test]
fn test_corrupt_model_is_not_fatal() -> Result<()> {
    let dir = tempdir()?;
    let model_path = dir.path().join("yield_predictor.bin");
    fs::write(&model_path, b"not a model")?;

    let service = PredictionService::from_paths(&model_path, dir.path().join("scaler.bin"));
    assert!(!service.is_ready());
    Ok(())
}

#[test]
fn test_historical_and_statistics() -> Result<()> {
    let dir = tempdir()?;
    write_dataset(&dir.path().join("raw").join("sample_data.csv"), 12)?;
    let service = DataService::from_data_dir(dir.path());

    let records = service.get_historical(5)?;
    assert_eq!(records.len(), 5);
    // Last row of the file comes last
    assert_eq!(records[4].temperature_avg, Some(21.0));
    assert!(records.iter().all(|r| r.yield_tons_per_hectare.is_some()));

    let stats = service.get_statistics()?.expect("statistics for a populated file");
    assert_eq!(stats.total_records, 12);
    assert!(stats.min_yield <= stats.average_yield && stats.average_yield <= stats.max_yield);
    assert!(stats.std_yield > 0.0);
    Ok(())
}

#[test]
fn test_statistics_on_empty_or_unlabeled_files() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("data.csv");
    let service = DataService::new(&path);

    fs::write(&path, "")?;
    assert!(service.get_statistics()?.is_none());

    fs::write(&path, format!("{},{}\n", RAW_FEATURES.join(","), TARGET_COLUMN))?;
    assert!(service.get_statistics()?.is_none());
    assert!(service.get_historical(100)?.is_empty());

    fs::write(&path, format!("{}\n{}\n", RAW_FEATURES.join(","), vec!["1"; 10].join(",")))?;
    assert!(service.get_statistics()?.is_none());
    Ok(())
}

#[test]
fn test_malformed_file_errors_are_wrapped() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("data.csv");
    fs::write(&path, "a,yield_tons_per_hectare\n1,high\n")?;
    let service = DataService::new(&path);

    let err = service.get_statistics().unwrap_err();
    assert!(err.to_string().starts_with("Error calculating statistics: "));

    let err = service.get_historical(10).unwrap_err();
    assert!(err.to_string().starts_with("Error fetching historical data: "));
    Ok(())
}
