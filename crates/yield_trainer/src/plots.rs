//! Evaluation charts
//!
//! Rendered only when built with `--features plots`.

use std::path::Path;

use crate::workflow::EvaluationReport;

pub const ACTUAL_VS_PREDICTED: &str = "evaluation_actual_vs_predicted.png";
pub const RESIDUALS: &str = "evaluation_residuals.png";
pub const RESIDUALS_DIST: &str = "evaluation_residuals_dist.png";

/// Draw the three evaluation charts into `output_dir`, returning what was written
#[cfg(feature = "plots")]
pub fn render(report: &EvaluationReport, output_dir: &Path) -> Vec<std::path::PathBuf> {
    let residuals = report.residuals();
    let mut written = Vec::new();

    attempt(output_dir, ACTUAL_VS_PREDICTED, &mut written, |path| {
        chart::actual_vs_predicted(path, &report.actual, &report.predicted)
    });
    attempt(output_dir, RESIDUALS, &mut written, |path| {
        chart::residuals(path, &report.predicted, &residuals)
    });
    attempt(output_dir, RESIDUALS_DIST, &mut written, |path| {
        chart::residual_distribution(path, &residuals)
    });
    written
}

#[cfg(feature = "plots")]
fn attempt<F>(output_dir: &Path, name: &str, written: &mut Vec<std::path::PathBuf>, draw: F)
where
    F: FnOnce(&Path) -> chart::DrawResult,
{
    use tracing::{info, warn};

    let path = output_dir.join(name);
    // The bitmap backend can panic on font lookup; treat that like any other failure
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| draw(&path))) {
        Ok(Ok(())) => {
            info!("Saved: {}", path.display());
            written.push(path);
        }
        Ok(Err(err)) => warn!("Chart {} failed: {}", name, err),
        Err(_) => warn!("Chart {} failed (renderer panicked)", name),
    }
}

#[cfg(not(feature = "plots"))]
pub fn render(_report: &EvaluationReport, _output_dir: &Path) -> Vec<std::path::PathBuf> {
    tracing::info!("Plot skipped; rebuild with `--features plots` to generate PNG charts");
    Vec::new()
}

#[cfg(feature = "plots")]
mod chart {
    use plotters::prelude::*;
    use std::path::Path;

    pub(super) type DrawResult = Result<(), Box<dyn std::error::Error>>;

    const WIDTH: u32 = 1000;
    const HEIGHT: u32 = 600;
    const BINS: usize = 30;

    fn bounds(values: &[f64]) -> (f64, f64) {
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !lo.is_finite() || !hi.is_finite() {
            return (0.0, 1.0);
        }
        let pad = ((hi - lo) * 0.05).max(1e-6);
        (lo - pad, hi + pad)
    }

    fn save(path: &Path, buf: &[u8]) -> DrawResult {
        image::save_buffer(path, buf, WIDTH, HEIGHT, image::ColorType::Rgb8)?;
        Ok(())
    }

    pub(super) fn actual_vs_predicted(path: &Path, actual: &[f64], predicted: &[f64]) -> DrawResult {
        let mut buf = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut buf, (WIDTH, HEIGHT)).into_drawing_area();
            root.fill(&WHITE)?;

            let all: Vec<f64> = actual.iter().chain(predicted).copied().collect();
            let (lo, hi) = bounds(&all);
            let mut chart = ChartBuilder::on(&root)
                .caption("Actual vs Predicted Yield", ("sans-serif", 24))
                .margin(20)
                .x_label_area_size(40)
                .y_label_area_size(60)
                .build_cartesian_2d(lo..hi, lo..hi)?;

            chart
                .configure_mesh()
                .x_desc("Actual Yield (tons/hectare)")
                .y_desc("Predicted Yield (tons/hectare)")
                .draw()?;
            chart.draw_series(
                actual
                    .iter()
                    .zip(predicted)
                    .map(|(&a, &p)| Circle::new((a, p), 3, BLUE.mix(0.5).filled())),
            )?;
            chart.draw_series(LineSeries::new(vec![(lo, lo), (hi, hi)], RED.stroke_width(2)))?;
            root.present()?;
        }
        save(path, &buf)
    }

    pub(super) fn residuals(path: &Path, predicted: &[f64], residuals: &[f64]) -> DrawResult {
        let mut buf = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut buf, (WIDTH, HEIGHT)).into_drawing_area();
            root.fill(&WHITE)?;

            let (x_lo, x_hi) = bounds(predicted);
            let (y_lo, y_hi) = bounds(residuals);
            let mut chart = ChartBuilder::on(&root)
                .caption("Residual Plot", ("sans-serif", 24))
                .margin(20)
                .x_label_area_size(40)
                .y_label_area_size(60)
                .build_cartesian_2d(x_lo..x_hi, y_lo.min(0.0)..y_hi.max(0.0))?;

            chart
                .configure_mesh()
                .x_desc("Predicted Yield (tons/hectare)")
                .y_desc("Residuals")
                .draw()?;
            chart.draw_series(
                predicted
                    .iter()
                    .zip(residuals)
                    .map(|(&p, &r)| Circle::new((p, r), 3, BLUE.mix(0.5).filled())),
            )?;
            chart.draw_series(LineSeries::new(vec![(x_lo, 0.0), (x_hi, 0.0)], RED.stroke_width(1)))?;
            root.present()?;
        }
        save(path, &buf)
    }

    pub(super) fn residual_distribution(path: &Path, residuals: &[f64]) -> DrawResult {
        let mut buf = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut buf, (WIDTH, HEIGHT)).into_drawing_area();
            root.fill(&WHITE)?;

            let (lo, hi) = bounds(residuals);
            let width = (hi - lo) / BINS as f64;
            let mut counts = [0usize; BINS];
            for r in residuals {
                let bin = (((r - lo) / width) as usize).min(BINS - 1);
                counts[bin] += 1;
            }
            let peak = counts.iter().copied().max().unwrap_or(0).max(1);

            let mut chart = ChartBuilder::on(&root)
                .caption("Distribution of Residuals", ("sans-serif", 24))
                .margin(20)
                .x_label_area_size(40)
                .y_label_area_size(60)
                .build_cartesian_2d(lo..hi, 0f64..(peak as f64 * 1.1))?;

            chart.configure_mesh().x_desc("Residuals").y_desc("Frequency").draw()?;
            chart.draw_series(counts.iter().enumerate().map(|(i, &count)| {
                let left = lo + i as f64 * width;
                Rectangle::new([(left, 0.0), (left + width, count as f64)], BLUE.mix(0.6).filled())
            }))?;
            root.present()?;
        }
        save(path, &buf)
    }
}
