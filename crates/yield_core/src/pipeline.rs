//! Feature pipeline: imputation, feature derivation, scaling and splitting
//!
//! Training calls [`FeaturePipeline::preprocess`] with `fit = true` exactly once
//! per dataset; every later transform (evaluation, serving) reuses the stored
//! [`StandardScaler`]. Request handlers only ever reach
//! [`FeaturePipeline::prepare_single`], which never fits.

use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::dataset::Table;
use crate::deterministic::LcgRng;
use crate::errors::{Result, YieldError};
use crate::record::{derive_features, Record, FEATURE_COLUMNS, RAW_FEATURES, RAW_FEATURE_COUNT, TARGET_COLUMN};
use crate::scaler::StandardScaler;

/// Standardized feature matrix
pub type FeatureMatrix = Vec<Vec<f64>>;

/// Output of [`split`]
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub x_train: FeatureMatrix,
    pub x_test: FeatureMatrix,
    pub y_train: Vec<f64>,
    pub y_test: Vec<f64>,
}

/// Turns raw tables and records into scaled feature vectors
#[derive(Debug, Clone, Default)]
pub struct FeaturePipeline {
    scaler: Option<StandardScaler>,
}

impl FeaturePipeline {
    /// Pipeline with no scaler; only `preprocess(.., true)` can be used
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline around an already fitted scaler
    pub fn with_scaler(scaler: StandardScaler) -> Self {
        Self { scaler: Some(scaler) }
    }

    pub fn is_fitted(&self) -> bool {
        self.scaler.is_some()
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }

    /// Read a CSV dataset
    pub fn load_data<P: AsRef<Path>>(path: P) -> Result<Table> {
        let table = Table::from_csv(path.as_ref())?;
        info!(
            path = %path.as_ref().display(),
            rows = table.len(),
            columns = table.columns().len(),
            "Loaded dataset"
        );
        Ok(table)
    }

    /// Impute, derive, select and scale every row of `table`.
    ///
    /// With `fit = true` the scaling statistics are (re)estimated from this
    /// table; otherwise the stored scaler is used. The target column is
    /// returned when present.
    pub fn preprocess(&mut self, table: &Table, fit: bool) -> Result<(FeatureMatrix, Option<Vec<f64>>)> {
        if table.is_empty() {
            return Err(YieldError::DataAccess("dataset has no rows".into()));
        }
        let filled = table.fill_missing_with_means();

        let raw_indices = RAW_FEATURES
            .iter()
            .map(|name| {
                filled
                    .column_index(name)
                    .ok_or_else(|| YieldError::DataAccess(format!("missing column '{name}'")))
            })
            .collect::<Result<Vec<usize>>>()?;

        let unscaled = filled
            .rows()
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                let mut raw = [0.0; RAW_FEATURE_COUNT];
                for ((slot, &col), name) in raw.iter_mut().zip(&raw_indices).zip(RAW_FEATURES.iter()) {
                    *slot = row[col].ok_or_else(|| {
                        YieldError::DataAccess(format!("row {}: column '{name}' has no values", row_idx + 1))
                    })?;
                }
                Ok(derive_features(&raw).to_vec())
            })
            .collect::<Result<FeatureMatrix>>()?;

        if fit {
            let scaler = StandardScaler::fit(&FEATURE_COLUMNS, &unscaled)?;
            info!(samples = scaler.samples_seen(), "Fitted feature scaler");
            self.scaler = Some(scaler);
        }
        let scaler = self.scaler.as_ref().ok_or(YieldError::NotFitted)?;
        let features = scaler.transform(&unscaled)?;

        let target = match filled.column(TARGET_COLUMN) {
            Some(cells) => Some(
                cells
                    .into_iter()
                    .map(|cell| {
                        cell.ok_or_else(|| {
                            YieldError::DataAccess(format!("column '{TARGET_COLUMN}' has no values"))
                        })
                    })
                    .collect::<Result<Vec<f64>>>()?,
            ),
            None => None,
        };

        Ok((features, target))
    }

    /// Scaled feature vector for one record given as field -> value
    pub fn prepare_single(&self, input: &HashMap<String, f64>) -> Result<Vec<f64>> {
        let record = Record::from_map(input)?;
        self.prepare_record(&record)
    }

    /// Scaled feature vector for one typed record
    pub fn prepare_record(&self, record: &Record) -> Result<Vec<f64>> {
        let scaler = self.scaler.as_ref().ok_or(YieldError::NotFitted)?;
        scaler.transform_row(&record.features())
    }

    /// Persist the fitted scaler; returns the artifact checksum
    pub fn save_scaler<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        let scaler = self.scaler.as_ref().ok_or(YieldError::NotFitted)?;
        let checksum = scaler.save(path.as_ref())?;
        info!(path = %path.as_ref().display(), checksum = %checksum, "Scaler saved");
        Ok(checksum)
    }

    /// Replace the scaler with one loaded from disk
    pub fn load_scaler<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let scaler = StandardScaler::load(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Scaler loaded");
        self.scaler = Some(scaler);
        Ok(())
    }
}

/// Seeded shuffle split; `ceil(test_fraction * n)` rows go to the test side
pub fn split(features: &[Vec<f64>], targets: &[f64], test_fraction: f64, seed: u64) -> Result<TrainTestSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(YieldError::InvalidInput(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    if features.len() != targets.len() {
        return Err(YieldError::InvalidInput(format!(
            "{} feature rows but {} targets",
            features.len(),
            targets.len()
        )));
    }

    let n = features.len();
    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(YieldError::InvalidInput(format!(
            "cannot split {n} rows with test fraction {test_fraction}"
        )));
    }

    let order = LcgRng::new(seed).permutation(n);
    let (test_idx, train_idx) = order.split_at(n_test);

    Ok(TrainTestSplit {
        x_train: train_idx.iter().map(|&i| features[i].clone()).collect(),
        x_test: test_idx.iter().map(|&i| features[i].clone()).collect(),
        y_train: train_idx.iter().map(|&i| targets[i]).collect(),
        y_test: test_idx.iter().map(|&i| targets[i]).collect(),
    })
}
