//! Yield model: a named ensemble strategy plus its trained state

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::artifact::{self, ArtifactKind};
use crate::ensemble::{
    check_training_data, BoostingParams, Estimator, ForestParams, GradientBoosting, RandomForest,
    Regressor,
};
use crate::errors::{Result, YieldError};
use crate::metrics::{CvMetrics, Metrics};
use crate::tree::Tree;

/// Ensemble strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    RandomForest,
    GradientBoosting,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
        }
    }

    /// Estimator with default hyperparameters
    pub fn default_estimator(&self) -> Estimator {
        match self {
            ModelKind::RandomForest => Estimator::RandomForest(RandomForest::new(ForestParams::default())),
            ModelKind::GradientBoosting => {
                Estimator::GradientBoosting(GradientBoosting::new(BoostingParams::default()))
            }
        }
    }
}

impl FromStr for ModelKind {
    type Err = YieldError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "random_forest" => Ok(ModelKind::RandomForest),
            "gradient_boosting" => Ok(ModelKind::GradientBoosting),
            other => Err(YieldError::UnknownModelType(other.to_string())),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted model state
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelState {
    feature_count: usize,
    estimator: Estimator,
}

/// Crop yield regressor
#[derive(Debug, Clone)]
pub struct YieldModel {
    estimator: Estimator,
    feature_count: usize,
    is_trained: bool,
}

impl YieldModel {
    /// Construct by strategy name with default hyperparameters
    pub fn new(model_type: &str) -> Result<Self> {
        let kind: ModelKind = model_type.parse()?;
        Ok(Self::with_estimator(kind.default_estimator()))
    }

    /// Construct around an explicitly parameterized estimator
    pub fn with_estimator(estimator: Estimator) -> Self {
        Self {
            estimator,
            feature_count: 0,
            is_trained: false,
        }
    }

    pub fn random_forest(params: ForestParams) -> Self {
        Self::with_estimator(Estimator::RandomForest(RandomForest::new(params)))
    }

    pub fn gradient_boosting(params: BoostingParams) -> Self {
        Self::with_estimator(Estimator::GradientBoosting(GradientBoosting::new(params)))
    }

    pub fn kind(&self) -> ModelKind {
        match self.estimator {
            Estimator::RandomForest(_) => ModelKind::RandomForest,
            Estimator::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.is_trained
    }

    /// Number of input columns seen at training time (0 if untrained)
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    /// Fit the estimator; returns held-out metrics when a test pair is given
    pub fn train(
        &mut self,
        x_train: &[Vec<f64>],
        y_train: &[f64],
        test: Option<(&[Vec<f64>], &[f64])>,
    ) -> Result<Option<Metrics>> {
        let width = check_training_data(x_train, y_train)?;

        info!(
            model_type = %self.kind(),
            samples = x_train.len(),
            features = width,
            "Training model"
        );

        self.estimator.fit(x_train, y_train)?;
        self.feature_count = width;
        self.is_trained = true;

        match test {
            Some((x_test, y_test)) => {
                let metrics = self.evaluate(x_test, y_test)?;
                info!(
                    rmse = metrics.rmse,
                    mae = metrics.mae,
                    r2 = metrics.r2_score,
                    mape = metrics.mape,
                    "Held-out evaluation"
                );
                Ok(Some(metrics))
            }
            None => Ok(None),
        }
    }

    /// One prediction per row, in order
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        if !self.is_trained {
            return Err(YieldError::NotTrained);
        }
        features
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                if row.len() != self.feature_count {
                    return Err(YieldError::InvalidInput(format!(
                        "row {idx}: expected {} features, got {}",
                        self.feature_count,
                        row.len()
                    )));
                }
                Ok(self.estimator.predict_row(row))
            })
            .collect()
    }

    /// RMSE, MAE, R² and MAPE against known targets
    pub fn evaluate(&self, features: &[Vec<f64>], targets: &[f64]) -> Result<Metrics> {
        let predictions = self.predict(features)?;
        if targets.is_empty() || targets.len() != predictions.len() {
            return Err(YieldError::InvalidInput(format!(
                "{} predictions but {} targets",
                predictions.len(),
                targets.len()
            )));
        }
        Ok(Metrics::compute(targets, &predictions))
    }

    /// Contiguous k-fold cross-validation on fresh estimators.
    ///
    /// Leaves this model's own trained state untouched.
    pub fn cross_validate(&self, features: &[Vec<f64>], targets: &[f64], folds: usize) -> Result<CvMetrics> {
        check_training_data(features, targets)?;
        let n = features.len();
        if folds < 2 || folds > n {
            return Err(YieldError::InvalidInput(format!(
                "folds must be between 2 and {n}, got {folds}"
            )));
        }

        let fold_rmse = fold_bounds(n, folds)
            .into_par_iter()
            .map(|(start, end)| {
                let x_train: Vec<Vec<f64>> = features[..start].iter().chain(&features[end..]).cloned().collect();
                let y_train: Vec<f64> = targets[..start].iter().chain(&targets[end..]).copied().collect();

                let mut estimator = self.estimator.fresh();
                estimator.fit(&x_train, &y_train)?;

                let predictions: Vec<f64> = features[start..end]
                    .iter()
                    .map(|row| estimator.predict_row(row))
                    .collect();
                Ok(Metrics::compute(&targets[start..end], &predictions).rmse)
            })
            .collect::<Result<Vec<f64>>>()?;

        let cv = CvMetrics::from_fold_rmse(&fold_rmse);
        info!(
            folds,
            cv_rmse_mean = cv.cv_rmse_mean,
            cv_rmse_std = cv.cv_rmse_std,
            "Cross-validation complete"
        );
        Ok(cv)
    }

    /// Normalized importances in input column order, `None` before training
    pub fn feature_importance(&self) -> Option<Vec<f64>> {
        if !self.is_trained {
            return None;
        }
        self.estimator.feature_importance()
    }

    /// Persist the trained state; returns the artifact checksum
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        if !self.is_trained {
            return Err(YieldError::NotTrained);
        }
        let state = ModelState {
            feature_count: self.feature_count,
            estimator: self.estimator.clone(),
        };
        let checksum = artifact::write(path.as_ref(), ArtifactKind::Model, &state)?;
        info!(path = %path.as_ref().display(), checksum = %checksum, "Model saved");
        Ok(checksum)
    }

    /// Restore a trained model from an artifact
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let state: ModelState = artifact::read(path.as_ref(), ArtifactKind::Model)?;
        validate_state(&state).map_err(YieldError::ModelLoad)?;

        let model = Self {
            estimator: state.estimator,
            feature_count: state.feature_count,
            is_trained: true,
        };
        info!(path = %path.as_ref().display(), model_type = %model.kind(), "Model loaded");
        Ok(model)
    }
}

/// `[start, end)` of each contiguous fold; the first `n % folds` get one extra row
fn fold_bounds(n: usize, folds: usize) -> Vec<(usize, usize)> {
    let base = n / folds;
    let extra = n % folds;
    let mut start = 0;
    (0..folds)
        .map(|fold| {
            let size = base + usize::from(fold < extra);
            let bounds = (start, start + size);
            start += size;
            bounds
        })
        .collect()
}

fn validate_state(state: &ModelState) -> std::result::Result<(), String> {
    if state.feature_count == 0 {
        return Err("model has no input features".into());
    }
    let trees: &[Tree] = match &state.estimator {
        Estimator::RandomForest(m) => m.trees(),
        Estimator::GradientBoosting(m) => m.trees(),
    };
    if trees.is_empty() {
        return Err("model has no trees".into());
    }
    for (idx, tree) in trees.iter().enumerate() {
        tree.validate(state.feature_count)
            .map_err(|e| format!("tree {idx}: {e}"))?;
    }
    Ok(())
}
