//! Service-level errors

use agri_yield_core::YieldError;
use thiserror::Error;

/// Errors surfaced by the prediction and data services
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Any failure inside the prediction path, with its cause kept intact
    #[error("Prediction error: {0}")]
    Prediction(#[source] YieldError),

    /// Historical data or statistics could not be produced
    #[error("{0}")]
    Data(String),
}

impl ServiceError {
    /// Name of the absent input field, if that is what failed
    pub fn missing_field(&self) -> Option<&str> {
        match self {
            ServiceError::Prediction(cause) => cause.missing_field(),
            ServiceError::Data(_) => None,
        }
    }
}

impl From<YieldError> for ServiceError {
    fn from(cause: YieldError) -> Self {
        ServiceError::Prediction(cause)
    }
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
