//! Crop yield prediction core
//!
//! Feature engineering, scaling and tree-ensemble regression for predicting
//! yield in tons per hectare from weather, soil and farming inputs.
//!
//! Modules:
//! - `record`: Raw record schema and the fixed feature column order
//! - `dataset`: CSV table loading with missing-value support
//! - `pipeline`: Imputation, feature derivation, scaling, train/test split
//! - `scaler`: Standard scaler state
//! - `tree`, `cart`: Regression trees and the exact-greedy CART builder
//! - `ensemble`: Random forest and gradient boosting estimators
//! - `model`: Named strategy wrapper with train/evaluate/cross-validate/persist
//! - `artifact`: Tagged, versioned, checksummed on-disk envelope

pub mod artifact;
pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod ensemble;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod record;
pub mod scaler;
pub mod tree;

pub use dataset::{ColumnSummary, Table};
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use ensemble::{BoostingParams, Estimator, ForestParams, GradientBoosting, RandomForest, Regressor};
pub use errors::{Result, YieldError};
pub use metrics::{CvMetrics, Metrics};
pub use model::{ModelKind, YieldModel};
pub use pipeline::{split, FeatureMatrix, FeaturePipeline, TrainTestSplit};
pub use record::{Record, FEATURE_COLUMNS, FEATURE_COUNT, RAW_FEATURES, TARGET_COLUMN};
pub use scaler::StandardScaler;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
