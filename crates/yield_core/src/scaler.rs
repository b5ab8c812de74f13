//! Standard scaler (zero mean, unit variance)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::artifact::{self, ArtifactKind};
use crate::errors::{Result, YieldError};
use crate::record::FEATURE_COLUMNS;

/// Per-feature mean and standard deviation learned from one fit pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    feature_names: Vec<String>,
    means: Vec<f64>,
    std_devs: Vec<f64>,
    samples_seen: usize,
}

impl StandardScaler {
    /// Fit on the columns of `rows`.
    ///
    /// Uses the population standard deviation. A zero deviation is stored as
    /// 1.0 so constant columns transform to 0.
    pub fn fit(feature_names: &[&str], rows: &[Vec<f64>]) -> Result<Self> {
        let width = feature_names.len();
        if rows.is_empty() {
            return Err(YieldError::InvalidInput("cannot fit scaler on empty data".into()));
        }
        check_width(rows, width)?;

        let n = rows.len() as f64;
        let mut means = vec![0.0; width];
        for row in rows {
            for (acc, v) in means.iter_mut().zip(row) {
                *acc += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut variances = vec![0.0; width];
        for row in rows {
            for ((acc, v), mean) in variances.iter_mut().zip(row).zip(&means) {
                *acc += (v - mean).powi(2);
            }
        }

        let std_devs = variances
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std > 0.0 && std.is_finite() {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self {
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
            means,
            std_devs,
            samples_seen: rows.len(),
        })
    }

    /// Standardize one row
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.means.len() {
            return Err(YieldError::InvalidInput(format!(
                "expected {} features, got {}",
                self.means.len(),
                row.len()
            )));
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.std_devs))
            .map(|(v, (mean, std))| (v - mean) / std)
            .collect())
    }

    /// Standardize every row
    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn std_devs(&self) -> &[f64] {
        &self.std_devs
    }

    pub fn samples_seen(&self) -> usize {
        self.samples_seen
    }

    /// Persist as a scaler artifact; returns the payload checksum
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        artifact::write(path, ArtifactKind::Scaler, self)
    }

    /// Load a scaler artifact fitted on the current feature layout
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let scaler: StandardScaler = artifact::read(path, ArtifactKind::Scaler)?;
        if scaler.feature_names != FEATURE_COLUMNS
            || scaler.means.len() != scaler.feature_names.len()
            || scaler.std_devs.len() != scaler.feature_names.len()
        {
            return Err(YieldError::ModelLoad(format!(
                "scaler feature layout {:?} does not match {:?}",
                scaler.feature_names, FEATURE_COLUMNS
            )));
        }
        Ok(scaler)
    }
}

fn check_width(rows: &[Vec<f64>], width: usize) -> Result<()> {
    match rows.iter().position(|row| row.len() != width) {
        Some(idx) => Err(YieldError::InvalidInput(format!(
            "row {idx}: expected {width} features, got {}",
            rows[idx].len()
        ))),
        None => Ok(()),
    }
}
