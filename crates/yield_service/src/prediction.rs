//! Prediction service: model output plus confidence and agronomic advice

use agri_yield_core::{FeaturePipeline, ForestParams, Record, YieldError, YieldModel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::errors::Result;

/// Unit reported alongside every prediction
pub const YIELD_UNIT: &str = "tons per hectare";

const LOW_RAINFALL_MM: f64 = 500.0;
const LOW_NPK_TOTAL: f64 = 50.0;
const PH_MIN: f64 = 6.0;
const PH_MAX: f64 = 7.5;
const LOW_YIELD: f64 = 3.0;

/// ±10% band around the prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Irrigation,
    Fertilizer,
    SoilManagement,
    YieldOptimization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub message: String,
}

/// Response payload of a yield prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_yield: f64,
    pub unit: String,
    pub confidence_interval: ConfidenceInterval,
    pub confidence_score: f64,
    pub recommendations: Vec<Recommendation>,
}

/// Serves predictions from an immutable pipeline and model
#[derive(Debug, Clone)]
pub struct PredictionService {
    pipeline: FeaturePipeline,
    model: YieldModel,
}

impl PredictionService {
    pub fn new(pipeline: FeaturePipeline, model: YieldModel) -> Self {
        Self { pipeline, model }
    }

    /// Load model and scaler artifacts that exist on disk.
    ///
    /// Missing or unreadable artifacts are logged and leave the component
    /// unfitted, so predictions fail until the files are provided.
    pub fn from_paths<P: AsRef<Path>, Q: AsRef<Path>>(model_path: P, scaler_path: Q) -> Self {
        let model_path = model_path.as_ref();
        let scaler_path = scaler_path.as_ref();

        let model = if model_path.exists() {
            match YieldModel::load(model_path) {
                Ok(model) => {
                    info!("Model loaded from {}", model_path.display());
                    Some(model)
                }
                Err(e) => {
                    warn!("Could not load model from {}: {}", model_path.display(), e);
                    None
                }
            }
        } else {
            warn!("Model file {} not found, predictions disabled", model_path.display());
            None
        };

        let mut pipeline = FeaturePipeline::new();
        if scaler_path.exists() {
            match pipeline.load_scaler(scaler_path) {
                Ok(()) => info!("Scaler loaded from {}", scaler_path.display()),
                Err(e) => warn!("Could not load scaler from {}: {}", scaler_path.display(), e),
            }
        } else {
            warn!("Scaler file {} not found, predictions disabled", scaler_path.display());
        }

        // Without an artifact keep an untrained default so requests fail cleanly
        let model = model.unwrap_or_else(|| YieldModel::random_forest(ForestParams::default()));

        Self { pipeline, model }
    }

    /// Whether both a fitted scaler and a trained model are present
    pub fn is_ready(&self) -> bool {
        self.pipeline.is_fitted() && self.model.is_trained()
    }

    /// Predict yield for a field-name -> value mapping
    pub fn predict_yield(&self, input: &HashMap<String, f64>) -> Result<PredictionResult> {
        let record = Record::from_map(input)?;
        self.predict_record(&record)
    }

    /// Predict yield for a typed record
    pub fn predict_record(&self, record: &Record) -> Result<PredictionResult> {
        let features = self.pipeline.prepare_record(record)?;
        let prediction = self
            .model
            .predict(&[features])?
            .first()
            .copied()
            .ok_or_else(|| YieldError::InvalidInput("model returned no prediction".into()))?;

        Ok(PredictionResult {
            predicted_yield: round2(prediction),
            unit: YIELD_UNIT.to_string(),
            confidence_interval: confidence_interval(prediction),
            confidence_score: confidence_score(prediction),
            recommendations: recommendations(record, prediction),
        })
    }
}

/// `min(round2(75 + min(|p| / 10, 10)), 95)`
pub fn confidence_score(prediction: f64) -> f64 {
    let variability = (prediction.abs() / 10.0).min(10.0);
    round2(75.0 + variability).min(95.0)
}

pub fn confidence_interval(prediction: f64) -> ConfidenceInterval {
    ConfidenceInterval {
        lower: round2(prediction * 0.9),
        upper: round2(prediction * 1.1),
    }
}

/// Every applicable rule, in fixed order
pub fn recommendations(record: &Record, predicted_yield: f64) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if record.rainfall_mm < LOW_RAINFALL_MM {
        out.push(Recommendation {
            kind: RecommendationKind::Irrigation,
            priority: Priority::High,
            message: "Low rainfall detected. Increase irrigation to maintain optimal soil moisture.".into(),
        });
    }

    if record.npk_total() < LOW_NPK_TOTAL {
        out.push(Recommendation {
            kind: RecommendationKind::Fertilizer,
            priority: Priority::High,
            message: "Soil nutrient levels are low. Consider applying balanced NPK fertilizer.".into(),
        });
    }

    if record.soil_ph < PH_MIN || record.soil_ph > PH_MAX {
        out.push(Recommendation {
            kind: RecommendationKind::SoilManagement,
            priority: Priority::Medium,
            message: format!(
                "Soil pH ({:?}) is outside optimal range (6.0-7.5). Consider soil amendment.",
                record.soil_ph
            ),
        });
    }

    if predicted_yield < LOW_YIELD {
        out.push(Recommendation {
            kind: RecommendationKind::YieldOptimization,
            priority: Priority::Medium,
            message: "Predicted yield is below average. Review crop management practices and consider soil testing."
                .into(),
        });
    }

    out
}

/// Two decimals, exact ties to even
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;

    fn scenario() -> Record {
        Record::from_values([25.0, 400.0, 60.0, 5.0, 10.0, 10.0, 10.0, 100.0, 200.0, 5.0])
    }

    fn healthy() -> Record {
        Record::from_values([25.0, 900.0, 60.0, 6.5, 30.0, 20.0, 20.0, 100.0, 200.0, 5.0])
    }

    fn kinds(recs: &[Recommendation]) -> Vec<RecommendationKind> {
        recs.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn test_confidence_score_bounds() {
        assert_eq!(confidence_score(0.0), 75.0);
        assert_eq!(confidence_score(4.56), 75.46);
        assert_eq!(confidence_score(-50.0), 80.0);
        assert_eq!(confidence_score(1_000.0), 85.0);
    }

    #[test]
    fn test_round2_ties_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(-0.125), -0.12);
        assert_eq!(round2(4.5678), 4.57);
    }

    #[test]
    fn test_confidence_interval() {
        let interval = confidence_interval(5.0);
        assert_eq!(interval.lower, 4.5);
        assert_eq!(interval.upper, 5.5);
    }

    #[test]
    fn test_rules_fire_independently() {
        let mut low_rain = healthy();
        low_rain.rainfall_mm = 400.0;
        let recs = recommendations(&low_rain, 5.0);
        assert_eq!(kinds(&recs), vec![RecommendationKind::Irrigation]);
        assert_eq!(recs[0].priority, Priority::High);

        let mut low_npk = healthy();
        low_npk.soil_nitrogen = 10.0;
        low_npk.soil_phosphorus = 10.0;
        low_npk.soil_potassium = 10.0;
        let recs = recommendations(&low_npk, 5.0);
        assert_eq!(kinds(&recs), vec![RecommendationKind::Fertilizer]);
        assert_eq!(recs[0].priority, Priority::High);

        let mut acidic = healthy();
        acidic.soil_ph = 5.0;
        let recs = recommendations(&acidic, 5.0);
        assert_eq!(kinds(&recs), vec![RecommendationKind::SoilManagement]);
        assert_eq!(recs[0].priority, Priority::Medium);
        assert!(recs[0].message.contains("5.0"));

        let recs = recommendations(&healthy(), 2.0);
        assert_eq!(kinds(&recs), vec![RecommendationKind::YieldOptimization]);

        assert!(recommendations(&healthy(), 5.0).is_empty());
    }

    #[test]
    fn test_rule_order_for_scenario() {
        let recs = recommendations(&scenario(), 2.5);
        assert_eq!(
            kinds(&recs),
            vec![
                RecommendationKind::Irrigation,
                RecommendationKind::Fertilizer,
                RecommendationKind::SoilManagement,
                RecommendationKind::YieldOptimization,
            ]
        );
        assert_eq!(
            recs[2].message,
            "Soil pH (5.0) is outside optimal range (6.0-7.5). Consider soil amendment."
        );
    }

    #[test]
    fn test_boundaries_do_not_fire() {
        let mut record = healthy();
        record.rainfall_mm = 500.0;
        record.soil_ph = 7.5;
        record.soil_nitrogen = 20.0;
        record.soil_phosphorus = 15.0;
        record.soil_potassium = 15.0;
        assert!(recommendations(&record, 3.0).is_empty());
    }

    #[test]
    fn test_untrained_service_wraps_cause() {
        let service = PredictionService::new(
            FeaturePipeline::new(),
            YieldModel::new("gradient_boosting").unwrap(),
        );
        assert!(!service.is_ready());

        let err = service.predict_record(&scenario()).unwrap_err();
        assert_eq!(err, ServiceError::Prediction(YieldError::NotFitted));
        assert!(err.to_string().starts_with("Prediction error: "));
    }

    #[test]
    fn test_missing_field_is_inspectable() {
        let service = PredictionService::new(
            FeaturePipeline::new(),
            YieldModel::new("random_forest").unwrap(),
        );
        let input: HashMap<String, f64> = HashMap::from([("temperature_avg".to_string(), 25.0)]);

        let err = service.predict_yield(&input).unwrap_err();
        assert_eq!(err.missing_field(), Some("rainfall_mm"));
        assert_eq!(
            err.to_string(),
            "Prediction error: Missing required field: rainfall_mm"
        );
    }

    #[test]
    fn test_recommendation_json_shape() {
        let recs = recommendations(&scenario(), 5.0);
        let json = serde_json::to_value(&recs[0]).unwrap();
        assert_eq!(json["type"], "irrigation");
        assert_eq!(json["priority"], "high");

        let json = serde_json::to_value(&recs[2]).unwrap();
        assert_eq!(json["type"], "soil_management");
        assert_eq!(json["priority"], "medium");
    }
}
