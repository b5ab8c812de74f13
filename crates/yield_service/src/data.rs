//! Historical data service
//!
//! Re-reads the dataset file on every call.

use agri_yield_core::{Table, RAW_FEATURES, TARGET_COLUMN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{Result, ServiceError};
use crate::prediction::round2;

/// One dataset row; cells absent from the file are `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub temperature_avg: Option<f64>,
    pub rainfall_mm: Option<f64>,
    pub humidity_percent: Option<f64>,
    pub soil_ph: Option<f64>,
    pub soil_nitrogen: Option<f64>,
    pub soil_phosphorus: Option<f64>,
    pub soil_potassium: Option<f64>,
    pub fertilizer_used_kg: Option<f64>,
    pub irrigation_hours: Option<f64>,
    pub area_hectares: Option<f64>,
    pub yield_tons_per_hectare: Option<f64>,
}

impl HistoricalRecord {
    fn from_row(table: &Table, row: &[Option<f64>]) -> Self {
        let cell = |name: &str| table.column_index(name).and_then(|idx| row[idx]);
        let raw: Vec<Option<f64>> = RAW_FEATURES.iter().map(|&name| cell(name)).collect();

        Self {
            temperature_avg: raw[0],
            rainfall_mm: raw[1],
            humidity_percent: raw[2],
            soil_ph: raw[3],
            soil_nitrogen: raw[4],
            soil_phosphorus: raw[5],
            soil_potassium: raw[6],
            fertilizer_used_kg: raw[7],
            irrigation_hours: raw[8],
            area_hectares: raw[9],
            yield_tons_per_hectare: cell(TARGET_COLUMN),
        }
    }
}

/// Summary of the yield column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldStatistics {
    pub total_records: usize,
    pub average_yield: f64,
    pub max_yield: f64,
    pub min_yield: f64,
    /// Sample standard deviation (n - 1)
    pub std_yield: f64,
}

impl YieldStatistics {
    /// Statistics over present yield values; `None` when there are none
    pub fn from_values(total_records: usize, values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let std = if values.len() < 2 {
            0.0
        } else {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        };

        Some(Self {
            total_records,
            average_yield: round2(mean),
            max_yield: round2(max),
            min_yield: round2(min),
            std_yield: round2(std),
        })
    }
}

/// Reads historical records from the dataset file
#[derive(Debug, Clone)]
pub struct DataService {
    dataset_path: PathBuf,
}

impl DataService {
    pub fn new<P: Into<PathBuf>>(dataset_path: P) -> Self {
        Self {
            dataset_path: dataset_path.into(),
        }
    }

    /// Service over `<data_dir>/raw/sample_data.csv`
    pub fn from_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self::new(data_dir.as_ref().join("raw").join("sample_data.csv"))
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    /// Last `limit` rows in file order; empty when the file does not exist
    pub fn get_historical(&self, limit: usize) -> Result<Vec<HistoricalRecord>> {
        let Some(table) = self
            .read_table()
            .map_err(|e| ServiceError::Data(format!("Error fetching historical data: {e}")))?
        else {
            return Ok(Vec::new());
        };

        Ok(table
            .tail(limit)
            .iter()
            .map(|row| HistoricalRecord::from_row(&table, row))
            .collect())
    }

    /// Yield statistics over the whole file.
    ///
    /// `None` when the file is absent, has no rows, or has no yield values.
    pub fn get_statistics(&self) -> Result<Option<YieldStatistics>> {
        let Some(table) = self
            .read_table()
            .map_err(|e| ServiceError::Data(format!("Error calculating statistics: {e}")))?
        else {
            return Ok(None);
        };

        let Some(values) = table.column_values(TARGET_COLUMN) else {
            return Ok(None);
        };
        Ok(YieldStatistics::from_values(table.len(), &values))
    }

    fn read_table(&self) -> agri_yield_core::Result<Option<Table>> {
        if !self.dataset_path.exists() {
            debug!(path = %self.dataset_path.display(), "dataset file not found");
            return Ok(None);
        }
        let empty = std::fs::metadata(&self.dataset_path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(false);
        if empty {
            return Ok(None);
        }
        Table::from_csv(&self.dataset_path).map(Some)
    }
}
