//! Record schema and feature derivation
//!
//! The feature order is fixed at compile time: the ten raw agronomic inputs in
//! [`RAW_FEATURES`] order followed by the two derived interaction features.
//! Fit time and inference time both go through [`derive_features`], so the
//! column layout seen by the scaler and the estimators never drifts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{Result, YieldError};

/// Number of raw input fields in a record
pub const RAW_FEATURE_COUNT: usize = 10;

/// Number of columns in a feature vector (raw + derived)
pub const FEATURE_COUNT: usize = 12;

/// Raw input fields, in feature order
pub const RAW_FEATURES: [&str; RAW_FEATURE_COUNT] = [
    "temperature_avg",
    "rainfall_mm",
    "humidity_percent",
    "soil_ph",
    "soil_nitrogen",
    "soil_phosphorus",
    "soil_potassium",
    "fertilizer_used_kg",
    "irrigation_hours",
    "area_hectares",
];

/// Full feature column order used by the scaler and the estimators
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "temperature_avg",
    "rainfall_mm",
    "humidity_percent",
    "soil_ph",
    "soil_nitrogen",
    "soil_phosphorus",
    "soil_potassium",
    "fertilizer_used_kg",
    "irrigation_hours",
    "area_hectares",
    "temp_rainfall_interaction",
    "npk_total",
];

/// Label column of training data
pub const TARGET_COLUMN: &str = "yield_tons_per_hectare";

const TEMPERATURE: usize = 0;
const RAINFALL: usize = 1;
const NITROGEN: usize = 4;
const PHOSPHORUS: usize = 5;
const POTASSIUM: usize = 6;

/// One observation of the ten raw agronomic inputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub temperature_avg: f64,
    pub rainfall_mm: f64,
    pub humidity_percent: f64,
    pub soil_ph: f64,
    pub soil_nitrogen: f64,
    pub soil_phosphorus: f64,
    pub soil_potassium: f64,
    pub fertilizer_used_kg: f64,
    pub irrigation_hours: f64,
    pub area_hectares: f64,
}

impl Record {
    /// Build a record from a field-name mapping.
    ///
    /// Fails with [`YieldError::MissingField`] naming the first absent field
    /// in [`RAW_FEATURES`] order. Extra keys are ignored.
    pub fn from_map(input: &HashMap<String, f64>) -> Result<Self> {
        let mut values = [0.0; RAW_FEATURE_COUNT];
        for (slot, name) in values.iter_mut().zip(RAW_FEATURES.iter()) {
            *slot = *input
                .get(*name)
                .ok_or_else(|| YieldError::MissingField((*name).to_string()))?;
        }
        Ok(Self::from_values(values))
    }

    /// Build a record from values in [`RAW_FEATURES`] order
    pub fn from_values(values: [f64; RAW_FEATURE_COUNT]) -> Self {
        Self {
            temperature_avg: values[0],
            rainfall_mm: values[1],
            humidity_percent: values[2],
            soil_ph: values[3],
            soil_nitrogen: values[4],
            soil_phosphorus: values[5],
            soil_potassium: values[6],
            fertilizer_used_kg: values[7],
            irrigation_hours: values[8],
            area_hectares: values[9],
        }
    }

    /// Raw values in [`RAW_FEATURES`] order
    pub fn values(&self) -> [f64; RAW_FEATURE_COUNT] {
        [
            self.temperature_avg,
            self.rainfall_mm,
            self.humidity_percent,
            self.soil_ph,
            self.soil_nitrogen,
            self.soil_phosphorus,
            self.soil_potassium,
            self.fertilizer_used_kg,
            self.irrigation_hours,
            self.area_hectares,
        ]
    }

    /// Sum of soil nitrogen, phosphorus and potassium
    pub fn npk_total(&self) -> f64 {
        self.soil_nitrogen + self.soil_phosphorus + self.soil_potassium
    }

    /// Unscaled twelve-column feature vector
    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        derive_features(&self.values())
    }
}

/// Append the derived columns to a raw row
pub fn derive_features(raw: &[f64; RAW_FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
    let mut out = [0.0; FEATURE_COUNT];
    out[..RAW_FEATURE_COUNT].copy_from_slice(raw);
    out[RAW_FEATURE_COUNT] = raw[TEMPERATURE] * raw[RAINFALL];
    out[RAW_FEATURE_COUNT + 1] = raw[NITROGEN] + raw[PHOSPHORUS] + raw[POTASSIUM];
    out
}
