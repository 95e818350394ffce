//! Evaluation reporting for the test split.
//!
//! Pairs surviving test rows with their predictions, aggregates error
//! statistics per sensor and per slice, and persists the flattened results
//! table that the report viewer and plotting tool read.

use std::collections::HashMap;
use std::path::Path;

use chrono::Timelike;
use ndarray::Array1;
use serde::Serialize;
use tracing::info;

use crate::error::{ForecastError, Result};
use crate::features::FeatureFrame;
use crate::model::EvaluationMetrics;
use crate::models::PredictionRecord;
use crate::storage;

// ---

/// Temperature bands (°C, lower bound inclusive) used for slice metrics.
const TEMPERATURE_RANGES: [(f64, f64, &str); 5] = [
    (f64::NEG_INFINITY, 20.0, "cold (<20°C)"),
    (20.0, 22.0, "mild (20-22°C)"),
    (22.0, 24.0, "ideal (22-24°C)"),
    (24.0, 26.0, "warm (24-26°C)"),
    (26.0, f64::INFINITY, "hot (>=26°C)"),
];

/// Hour-of-day periods `[start, end)` used for slice metrics.
const HOUR_PERIODS: [(u32, u32, &str); 4] = [
    (0, 6, "night (00-06h)"),
    (6, 12, "morning (06-12h)"),
    (12, 18, "afternoon (12-18h)"),
    (18, 24, "evening (18-24h)"),
];

const ERROR_PERCENTILES: [f64; 7] = [10.0, 25.0, 50.0, 75.0, 90.0, 95.0, 99.0];

/// Metrics for one sensor's test rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorError {
    pub sensor_id: String,
    pub rows: usize,
    pub metrics: EvaluationMetrics,
}

/// Metrics for a labelled subset of the test rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceError {
    pub label: String,
    pub rows: usize,
    /// Fraction of all test rows that fall in this slice
    pub share: f64,
    pub metrics: EvaluationMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Percentile {
    pub percentile: f64,
    pub value: f64,
}

/// Shape of the absolute-error distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDistribution {
    pub max: f64,
    pub min: f64,
    /// Sample standard deviation; NaN below two rows
    pub std: f64,
    pub percentiles: Vec<Percentile>,
}

/// Aggregated test-split evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub rows: usize,
    pub overall: EvaluationMetrics,
    /// In order of each sensor's first appearance
    pub per_sensor: Vec<SensorError>,
    pub per_temperature_range: Vec<SliceError>,
    pub per_hour_period: Vec<SliceError>,
    pub error_distribution: ErrorDistribution,
    /// Pearson correlation of temperature and humidity; NaN if either is constant
    pub temperature_humidity_correlation: f64,
}

/// Turns predicted test rows into the results table and its summary.
pub struct EvaluationReporter;

impl EvaluationReporter {
    /// Pair each test record with its prediction and absolute error.
    pub fn attach_predictions(
        test: &FeatureFrame,
        predictions: &Array1<f64>,
    ) -> Result<Vec<PredictionRecord>> {
        // ---
        if test.len() != predictions.len() {
            return Err(ForecastError::Shape {
                expected: format!("{} predictions", test.len()),
                actual: format!("{} predictions", predictions.len()),
            });
        }

        Ok(test
            .records()
            .iter()
            .zip(predictions.iter())
            .map(|(record, &prediction)| PredictionRecord::from_reading(&record.reading, prediction))
            .collect())
    }

    /// Global, per-sensor and per-slice error statistics.
    pub fn summarize(records: &[PredictionRecord]) -> Result<EvaluationReport> {
        // ---
        if records.is_empty() {
            return Err(ForecastError::Input(
                "no predictions to summarize".to_string(),
            ));
        }

        let overall = slice_metrics(records.iter())?;

        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<&PredictionRecord>> = HashMap::new();
        for record in records {
            groups
                .entry(record.sensor_id.as_str())
                .or_insert_with(|| {
                    order.push(record.sensor_id.as_str());
                    Vec::new()
                })
                .push(record);
        }

        let per_sensor = order
            .iter()
            .map(|sensor_id| {
                let rows = &groups[sensor_id];
                Ok(SensorError {
                    sensor_id: sensor_id.to_string(),
                    rows: rows.len(),
                    metrics: slice_metrics(rows.iter().copied())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let per_temperature_range = TEMPERATURE_RANGES
            .iter()
            .map(|&(lo, hi, label)| {
                slice(records, label, |r| r.temperature >= lo && r.temperature < hi)
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();

        let per_hour_period = HOUR_PERIODS
            .iter()
            .map(|&(start, end, label)| {
                slice(records, label, |r| {
                    let hour = r.timestamp.hour();
                    hour >= start && hour < end
                })
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();

        let errors: Vec<f64> = records.iter().map(|r| r.error).collect();
        let temps: Vec<f64> = records.iter().map(|r| r.temperature).collect();
        let hums: Vec<f64> = records.iter().map(|r| r.humidity).collect();

        Ok(EvaluationReport {
            rows: records.len(),
            overall,
            per_sensor,
            per_temperature_range,
            per_hour_period,
            error_distribution: distribution(&errors),
            temperature_humidity_correlation: pearson(&temps, &hums),
        })
    }

    /// Write the results table handed to the external viewers.
    pub fn persist(records: &[PredictionRecord], path: &Path) -> Result<()> {
        // ---
        storage::write_results(path, records)?;
        info!("Results saved to: {}", path.display());
        Ok(())
    }

    pub fn log_summary(report: &EvaluationReport) {
        // ---
        report.overall.log("Test");

        info!("Per-Sensor Error Analysis:");
        for sensor in &report.per_sensor {
            info!(
                "  Sensor {}...: MAE = {:.4}°C ({} rows)",
                sensor.sensor_id.chars().take(8).collect::<String>(),
                sensor.metrics.mae,
                sensor.rows
            );
        }

        info!("Errors by temperature range:");
        for range in &report.per_temperature_range {
            info!(
                "  {:16}: MAE = {:.3}°C ({:.1}% of rows)",
                range.label,
                range.metrics.mae,
                range.share * 100.0
            );
        }

        info!("Errors by hour of day:");
        for period in &report.per_hour_period {
            info!("  {:18}: MAE = {:.4}°C", period.label, period.metrics.mae);
        }

        if let Some(p90) = report
            .error_distribution
            .percentiles
            .iter()
            .find(|p| p.percentile == 90.0)
        {
            info!("  90% of predictions are within {:.3}°C", p90.value);
        }
    }
}

fn slice_metrics<'a>(records: impl Iterator<Item = &'a PredictionRecord>) -> Result<EvaluationMetrics> {
    let (y_true, y_pred): (Vec<f64>, Vec<f64>) =
        records.map(|r| (r.temperature, r.prediction)).unzip();
    EvaluationMetrics::compute(&y_true, &y_pred)
}

/// Metrics for the records matching `predicate`; `None` when the slice is empty.
fn slice(
    records: &[PredictionRecord],
    label: &str,
    predicate: impl Fn(&PredictionRecord) -> bool,
) -> Result<Option<SliceError>> {
    // ---
    let matching: Vec<&PredictionRecord> = records.iter().filter(|r| predicate(*r)).collect();
    if matching.is_empty() {
        return Ok(None);
    }

    Ok(Some(SliceError {
        label: label.to_string(),
        rows: matching.len(),
        share: matching.len() as f64 / records.len() as f64,
        metrics: slice_metrics(matching.into_iter())?,
    }))
}

fn distribution(errors: &[f64]) -> ErrorDistribution {
    // ---
    let mut sorted = errors.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let std = if n < 2 {
        f64::NAN
    } else {
        (sorted.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    };

    ErrorDistribution {
        max: sorted.last().copied().unwrap_or(f64::NAN),
        min: sorted.first().copied().unwrap_or(f64::NAN),
        std,
        percentiles: ERROR_PERCENTILES
            .iter()
            .map(|&p| Percentile {
                percentile: p,
                value: percentile(&sorted, p),
            })
            .collect(),
    }
}

/// Linear-interpolation percentile of an ascending slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    // ---
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    // ---
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (da, db) = (x - mean_a, y - mean_b);
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a <= 0.0 || var_b <= 0.0 {
        return f64::NAN;
    }
    cov / (var_a * var_b).sqrt()
}
