//! Synthetic crop dataset generator
//!
//! Draws every raw input uniformly from an agronomically plausible range and
//! derives the yield from a fixed linear response plus Gaussian noise. The
//! same seed always produces the same rows.

use agri_yield_core::record::RAW_FEATURE_COUNT;
use agri_yield_core::{Table, RAW_FEATURES, TARGET_COLUMN};
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tracing::info;

/// Sampling range per raw column, in `RAW_FEATURES` order
pub const FEATURE_RANGES: [(f64, f64); RAW_FEATURE_COUNT] = [
    (15.0, 35.0),    // temperature_avg
    (300.0, 1500.0), // rainfall_mm
    (40.0, 90.0),    // humidity_percent
    (5.5, 8.0),      // soil_ph
    (10.0, 40.0),    // soil_nitrogen
    (5.0, 30.0),     // soil_phosphorus
    (10.0, 35.0),    // soil_potassium
    (50.0, 200.0),   // fertilizer_used_kg
    (100.0, 400.0),  // irrigation_hours
    (1.0, 20.0),     // area_hectares
];

/// Linear yield response per raw column; area does not contribute
const YIELD_WEIGHTS: [f64; RAW_FEATURE_COUNT] =
    [0.05, 0.002, 0.01, 0.3, 0.08, 0.06, 0.05, 0.01, 0.005, 0.0];

/// Standard deviation of the additive yield noise
pub const NOISE_STD: f64 = 0.5;

/// Yield floor in tons per hectare
pub const MIN_YIELD: f64 = 0.5;

/// One generated observation
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticRow {
    pub features: [f64; RAW_FEATURE_COUNT],
    pub yield_tons_per_hectare: f64,
}

/// Generate `samples` rows from `seed`
pub fn generate(samples: usize, seed: u64) -> Vec<SyntheticRow> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..samples)
        .map(|_| {
            let mut features = [0.0; RAW_FEATURE_COUNT];
            for (value, (lo, hi)) in features.iter_mut().zip(FEATURE_RANGES) {
                *value = rng.gen_range(lo..hi);
            }
            let signal: f64 = features.iter().zip(YIELD_WEIGHTS).map(|(v, w)| v * w).sum();
            let noise = gaussian(&mut rng) * NOISE_STD;
            SyntheticRow {
                features,
                yield_tons_per_hectare: (signal + noise).max(MIN_YIELD),
            }
        })
        .collect()
}

/// Standard normal draw (Box-Muller)
fn gaussian<R: Rng>(rng: &mut R) -> f64 {
    // gen::<f64>() is in [0, 1); shift away from zero before the log
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Write rows as a CSV dataset with the canonical header
pub fn write_csv(rows: &[SyntheticRow], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header: Vec<&str> = RAW_FEATURES.to_vec();
    header.push(TARGET_COLUMN);
    writer.write_record(&header)?;

    for row in rows {
        let mut cells: Vec<String> = row.features.iter().map(|v| v.to_string()).collect();
        cells.push(row.yield_tons_per_hectare.to_string());
        writer.write_record(&cells)?;
    }
    writer.flush().context("Failed to flush dataset")?;
    Ok(())
}

/// Log per-column statistics of a written dataset
pub fn log_summary(path: &Path) -> Result<()> {
    let table = Table::from_csv(path).context("Failed to re-read generated dataset")?;
    info!("Shape: {} rows x {} columns", table.len(), table.columns().len());
    info!("Basic statistics:");
    for column in table.summary() {
        info!(
            "  {:<24} min={:>10.3} mean={:>10.3} max={:>10.3}",
            column.name, column.min, column.mean, column.max
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_rows() {
        assert_eq!(generate(50, 7), generate(50, 7));
        assert_ne!(generate(50, 7), generate(50, 8));
    }

    #[test]
    fn test_values_within_ranges() {
        for row in generate(500, 42) {
            for (value, (lo, hi)) in row.features.iter().zip(FEATURE_RANGES) {
                assert!(*value >= lo && *value < hi, "{value} outside [{lo}, {hi})");
            }
            assert!(row.yield_tons_per_hectare >= MIN_YIELD);
        }
    }

    #[test]
    fn test_yield_tracks_signal() {
        // Expected signal is about 12.4 t/ha; zero-mean noise leaves that in place
        let rows = generate(1000, 42);
        let mean = rows.iter().map(|r| r.yield_tons_per_hectare).sum::<f64>() / rows.len() as f64;
        assert!((11.5..13.5).contains(&mean), "mean yield {mean}");
    }

    #[test]
    fn test_gaussian_moments() {
        let mut rng = StdRng::seed_from_u64(3);
        let draws: Vec<f64> = (0..20_000).map(|_| gaussian(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / draws.len() as f64;
        assert!(mean.abs() < 0.05);
        assert!((var - 1.0).abs() < 0.05);
    }
}
