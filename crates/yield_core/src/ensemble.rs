//! Tree ensembles: bagged random forest and least-squares gradient boosting

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cart::{CartBuilder, FittedTree, TreeConfig};
use crate::deterministic::LcgRng;
use crate::errors::{Result, YieldError};
use crate::tree::Tree;

/// Common interface of the concrete estimators
pub trait Regressor: Send + Sync {
    /// Fit on a feature matrix and targets, replacing any previous state
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()>;

    /// Predict a single row
    fn predict_row(&self, row: &[f64]) -> f64;

    /// Normalized per-feature importances, `None` before fitting
    fn feature_importance(&self) -> Option<Vec<f64>>;
}

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 15,
            min_samples_split: 5,
            min_samples_leaf: 2,
            seed: 42,
        }
    }
}

impl ForestParams {
    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// Gradient boosting hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.1,
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

impl BoostingParams {
    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// Bagging of CART trees fitted on bootstrap samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<Tree>,
    importances: Option<Vec<f64>>,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            importances: None,
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()> {
        let width = check_training_data(features, targets)?;
        if self.params.n_estimators == 0 {
            return Err(YieldError::InvalidInput("n_estimators must be positive".into()));
        }

        // Unit hessians make every leaf the mean of its targets
        let gradients: Vec<f64> = targets.iter().map(|y| -y).collect();
        let hessians = vec![1.0; targets.len()];
        let builder = CartBuilder::new(features, &gradients, &hessians, self.params.tree_config());
        let n = features.len();
        let seed = self.params.seed;

        let fitted: Vec<FittedTree> = (0..self.params.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = LcgRng::derive(seed, tree_idx as u64);
                builder.build_on(&rng.bootstrap(n))
            })
            .collect();

        let mut importances = vec![0.0; width];
        for tree in &fitted {
            for (acc, share) in importances.iter_mut().zip(normalize(&tree.gains)) {
                *acc += share;
            }
        }

        debug!(
            trees = fitted.len(),
            max_depth = fitted.iter().map(|t| t.tree.depth()).max().unwrap_or(0),
            "random forest fitted"
        );

        self.trees = fitted.into_iter().map(|t| t.tree).collect();
        self.importances = Some(normalize(&importances));
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.evaluate(row)).sum();
        sum / self.trees.len() as f64
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        self.importances.clone()
    }
}

/// Sequential least-squares boosting of shallow trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    params: BoostingParams,
    init: f64,
    trees: Vec<Tree>,
    importances: Option<Vec<f64>>,
}

impl GradientBoosting {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            init: 0.0,
            trees: Vec::new(),
            importances: None,
        }
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    /// Initial prediction (training target mean)
    pub fn init(&self) -> f64 {
        self.init
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()> {
        let width = check_training_data(features, targets)?;
        if self.params.n_estimators == 0 {
            return Err(YieldError::InvalidInput("n_estimators must be positive".into()));
        }
        if !(self.params.learning_rate > 0.0) {
            return Err(YieldError::InvalidInput("learning_rate must be positive".into()));
        }

        let init = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut predictions = vec![init; targets.len()];
        let hessians = vec![1.0; targets.len()];
        let mut importances = vec![0.0; width];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for stage in 0..self.params.n_estimators {
            let gradients: Vec<f64> = predictions
                .iter()
                .zip(targets)
                .map(|(pred, target)| pred - target)
                .collect();

            let fitted = CartBuilder::new(features, &gradients, &hessians, self.params.tree_config()).build();

            for (pred, row) in predictions.iter_mut().zip(features) {
                *pred += self.params.learning_rate * fitted.tree.evaluate(row);
            }
            for (acc, gain) in importances.iter_mut().zip(&fitted.gains) {
                *acc += gain;
            }

            if (stage + 1) % 50 == 0 {
                debug!(stage = stage + 1, train_rmse = rmse(&predictions, targets), "boosting progress");
            }
            trees.push(fitted.tree);
        }

        self.init = init;
        self.trees = trees;
        self.importances = Some(normalize(&importances));
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.init, |acc, tree| acc + self.params.learning_rate * tree.evaluate(row))
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        self.importances.clone()
    }
}

/// Strategy selected by name at model construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Estimator {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
}

impl Regressor for Estimator {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()> {
        match self {
            Estimator::RandomForest(m) => m.fit(features, targets),
            Estimator::GradientBoosting(m) => m.fit(features, targets),
        }
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        match self {
            Estimator::RandomForest(m) => m.predict_row(row),
            Estimator::GradientBoosting(m) => m.predict_row(row),
        }
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        match self {
            Estimator::RandomForest(m) => m.feature_importance(),
            Estimator::GradientBoosting(m) => m.feature_importance(),
        }
    }
}

impl Estimator {
    /// Same strategy and parameters, no learned state
    pub fn fresh(&self) -> Self {
        match self {
            Estimator::RandomForest(m) => Estimator::RandomForest(RandomForest::new(m.params.clone())),
            Estimator::GradientBoosting(m) => {
                Estimator::GradientBoosting(GradientBoosting::new(m.params.clone()))
            }
        }
    }
}

/// Validate a training matrix, returning its width
pub(crate) fn check_training_data(features: &[Vec<f64>], targets: &[f64]) -> Result<usize> {
    if features.is_empty() {
        return Err(YieldError::InvalidInput("training data is empty".into()));
    }
    if features.len() != targets.len() {
        return Err(YieldError::InvalidInput(format!(
            "{} feature rows but {} targets",
            features.len(),
            targets.len()
        )));
    }
    let width = features[0].len();
    if width == 0 {
        return Err(YieldError::InvalidInput("feature rows have no columns".into()));
    }
    if let Some(idx) = features.iter().position(|row| row.len() != width) {
        return Err(YieldError::InvalidInput(format!(
            "row {idx}: expected {width} features, got {}",
            features[idx].len()
        )));
    }
    Ok(width)
}

/// Scale to sum 1; all-zero input stays zero
fn normalize(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.iter().map(|v| v / total).collect()
    } else {
        vec![0.0; values.len()]
    }
}

fn rmse(predictions: &[f64], targets: &[f64]) -> f64 {
    let mse = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / targets.len() as f64;
    mse.sqrt()
}
