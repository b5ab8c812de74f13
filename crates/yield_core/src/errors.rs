//! Error types for the yield core

use thiserror::Error;

/// Errors raised by the feature pipeline, the estimators and the artifact layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum YieldError {
    /// Dataset file missing, unreadable or malformed
    #[error("Error loading data: {0}")]
    DataAccess(String),

    /// A required raw input field is absent
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Strategy name is neither `random_forest` nor `gradient_boosting`
    #[error("Unknown model type: {0}")]
    UnknownModelType(String),

    /// Transform requested before the scaler was fitted
    #[error("Scaler has not been fitted")]
    NotFitted,

    /// Predict/evaluate requested before training
    #[error("Model not trained yet!")]
    NotTrained,

    /// Persisted artifact unreadable or incompatible
    #[error("Failed to load model artifact: {0}")]
    ModelLoad(String),

    /// Shape or parameter problem in caller-supplied input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl YieldError {
    /// Name of the absent field for [`YieldError::MissingField`]
    pub fn missing_field(&self) -> Option<&str> {
        match self {
            YieldError::MissingField(name) => Some(name),
            _ => None,
        }
    }
}

/// Result type for yield core operations
pub type Result<T> = std::result::Result<T, YieldError>;
