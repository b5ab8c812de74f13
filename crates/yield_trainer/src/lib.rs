//! Offline tooling for the crop yield predictor
//!
//! Generates synthetic datasets, trains and persists the model and scaler,
//! and evaluates persisted artifacts on the held-out split.

pub mod plots;
pub mod synthetic;
pub mod workflow;

pub use synthetic::{generate, write_csv, SyntheticRow};
pub use workflow::{run_evaluation, run_training, EvaluationReport, TrainingReport, WorkflowOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
