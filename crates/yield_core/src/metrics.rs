//! Regression metrics

use serde::{Deserialize, Serialize};

/// Held-out evaluation metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2_score: f64,
    /// Mean absolute percentage error; undefined when a target is zero
    pub mape: f64,
}

impl Metrics {
    /// Compute metrics for paired targets and predictions
    pub fn compute(targets: &[f64], predictions: &[f64]) -> Self {
        let n = targets.len().min(predictions.len()) as f64;
        let pairs = || targets.iter().zip(predictions);

        let mse = pairs().map(|(y, p)| (y - p).powi(2)).sum::<f64>() / n;
        let mae = pairs().map(|(y, p)| (y - p).abs()).sum::<f64>() / n;
        let mape = pairs().map(|(y, p)| ((y - p) / y).abs()).sum::<f64>() / n * 100.0;

        let mean = targets.iter().sum::<f64>() / targets.len() as f64;
        let ss_tot: f64 = targets.iter().map(|y| (y - mean).powi(2)).sum();
        let ss_res: f64 = pairs().map(|(y, p)| (y - p).powi(2)).sum();
        let r2_score = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Self {
            rmse: mse.sqrt(),
            mae,
            r2_score,
            mape,
        }
    }
}

/// Cross-validation summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CvMetrics {
    pub cv_rmse_mean: f64,
    /// Population standard deviation of the per-fold RMSE
    pub cv_rmse_std: f64,
}

impl CvMetrics {
    pub fn from_fold_rmse(fold_rmse: &[f64]) -> Self {
        let n = fold_rmse.len() as f64;
        let mean = fold_rmse.iter().sum::<f64>() / n;
        let var = fold_rmse.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            cv_rmse_mean: mean,
            cv_rmse_std: var.sqrt(),
        }
    }
}
