//! Crop yield services
//!
//! [`PredictionService`] turns a raw record into a [`PredictionResult`] with a
//! confidence band and recommendations. [`DataService`] serves the historical
//! dataset and its yield statistics.

pub mod data;
pub mod errors;
pub mod prediction;

pub use data::{DataService, HistoricalRecord, YieldStatistics};
pub use errors::{Result, ServiceError};
pub use prediction::{
    confidence_interval, confidence_score, recommendations, ConfidenceInterval, PredictionResult,
    PredictionService, Priority, Recommendation, RecommendationKind, YIELD_UNIT,
};
