//! Builds the train and test feature frames from raw readings.
//!
//! Readings are partitioned by sensor, and each sensor's train and test
//! splits are feature-engineered in isolation on the rayon pool. The test
//! split never sees the tail of the training history, so its first
//! `max_lag` rows are always lost to warm-up.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::frame::{FeatureFrame, FeatureRecord};
use super::series::{FeatureRow, SensorSeriesFeatureBuilder};
use crate::error::{ForecastError, Result};
use crate::models::SensorReading;

// ---

/// Outcome of the warm-up filtering pass for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmUpOutcome {
    pub records: Vec<FeatureRecord>,
    pub rows_in: usize,
    pub dropped: usize,
}

/// Drop rows whose features or target are undefined or non-finite.
///
/// For a series without missing raw values exactly the first `max_lag` rows
/// are dropped: `rows_out == rows_in.saturating_sub(max_lag)`.
pub fn drop_warm_up(rows: Vec<FeatureRow>) -> WarmUpOutcome {
    // ---
    let rows_in = rows.len();
    let records: Vec<FeatureRecord> = rows
        .into_iter()
        .filter_map(|row| {
            let features = row.values()?;
            let complete =
                row.reading.temperature.is_finite() && features.iter().all(|v| v.is_finite());
            complete.then(|| FeatureRecord {
                reading: row.reading,
                features,
            })
        })
        .collect();

    WarmUpOutcome {
        dropped: rows_in - records.len(),
        rows_in,
        records,
    }
}

/// Split readings into per-sensor series, in order of first appearance.
pub fn partition_by_sensor(readings: &[SensorReading]) -> Vec<(String, Vec<SensorReading>)> {
    // ---
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut parts: Vec<(String, Vec<SensorReading>)> = Vec::new();

    for reading in readings {
        let slot = *index.entry(reading.sensor_id.as_str()).or_insert_with(|| {
            parts.push((reading.sensor_id.clone(), Vec::new()));
            parts.len() - 1
        });
        parts[slot].1.push(reading.clone());
    }
    parts
}

/// Train and test frames ready for the model pipeline.
#[derive(Debug, Clone)]
pub struct AssembledDataset {
    pub train: FeatureFrame,
    pub test: FeatureFrame,
    /// Sensors excluded because their training history was too short
    pub skipped_sensors: Vec<String>,
    /// Sensors present only in the test table, never feature-engineered
    pub test_only_sensors: Vec<String>,
}

struct SensorFrames {
    train: Vec<FeatureRecord>,
    test: Vec<FeatureRecord>,
}

/// Merges per-sensor feature frames and applies the warm-up filter.
#[derive(Debug, Clone, Default)]
pub struct DatasetAssembler {
    builder: SensorSeriesFeatureBuilder,
}

impl DatasetAssembler {
    pub fn new(builder: SensorSeriesFeatureBuilder) -> Self {
        Self { builder }
    }

    pub fn builder(&self) -> &SensorSeriesFeatureBuilder {
        &self.builder
    }

    /// Canonical ordered feature columns of every assembled frame.
    pub fn feature_columns(&self) -> Vec<String> {
        self.builder.feature_columns()
    }

    /// Feature-engineer every sensor present in the train table.
    ///
    /// A sensor whose training split has no rows left after warm-up is logged
    /// and excluded from both frames; the rest of the run is unaffected.
    pub fn assemble(&self, train: &[SensorReading], test: &[SensorReading]) -> Result<AssembledDataset> {
        // ---
        info!("Engineering features...");

        let mut test_parts: HashMap<String, Vec<SensorReading>> =
            partition_by_sensor(test).into_iter().collect();

        let jobs: Vec<(String, Vec<SensorReading>, Option<Vec<SensorReading>>)> =
            partition_by_sensor(train)
                .into_iter()
                .map(|(sensor_id, rows)| {
                    let test_rows = test_parts.remove(&sensor_id);
                    (sensor_id, rows, test_rows)
                })
                .collect();

        let mut test_only_sensors: Vec<String> = test_parts.into_keys().collect();
        test_only_sensors.sort();
        if !test_only_sensors.is_empty() {
            warn!(
                "Ignoring {} sensor(s) with no training data: {:?}",
                test_only_sensors.len(),
                test_only_sensors
            );
        }

        // Each job owns its sensor's rows; collect keeps first-appearance order
        let outcomes: Vec<(String, Result<SensorFrames>)> = jobs
            .into_par_iter()
            .map(|(sensor_id, train_rows, test_rows)| {
                let frames = self.assemble_sensor(&sensor_id, &train_rows, test_rows.as_deref());
                (sensor_id, frames)
            })
            .collect();

        let columns = self.feature_columns();
        let mut train_frame = FeatureFrame::new(columns.clone());
        let mut test_frame = FeatureFrame::new(columns);
        let mut skipped_sensors = Vec::new();

        for (sensor_id, outcome) in outcomes {
            match outcome {
                Ok(frames) => {
                    train_frame.extend(frames.train)?;
                    test_frame.extend(frames.test)?;
                }
                Err(e @ ForecastError::InsufficientHistory { .. }) => {
                    warn!("{}; skipping sensor", e);
                    skipped_sensors.push(sensor_id);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Features created - Training: {}, Test: {} records",
            train_frame.len(),
            test_frame.len()
        );

        Ok(AssembledDataset {
            train: train_frame,
            test: test_frame,
            skipped_sensors,
            test_only_sensors,
        })
    }

    fn assemble_sensor(
        &self,
        sensor_id: &str,
        train_rows: &[SensorReading],
        test_rows: Option<&[SensorReading]>,
    ) -> Result<SensorFrames> {
        // ---
        debug!("Processing sensor {}...", short_id(sensor_id));

        let train = self.filtered(sensor_id, "train", train_rows);
        if train.records.is_empty() {
            return Err(ForecastError::InsufficientHistory {
                sensor_id: sensor_id.to_string(),
                rows_in: train.rows_in,
            });
        }

        let test = match test_rows {
            Some(rows) => {
                let test = self.filtered(sensor_id, "test", rows);
                if test.records.is_empty() {
                    warn!(
                        "Sensor {} has no test rows left after warm-up ({} raw rows)",
                        sensor_id, test.rows_in
                    );
                }
                test.records
            }
            None => Vec::new(),
        };

        Ok(SensorFrames {
            train: train.records,
            test,
        })
    }

    fn filtered(&self, sensor_id: &str, split: &str, rows: &[SensorReading]) -> WarmUpOutcome {
        // ---
        let outcome = drop_warm_up(self.builder.build(rows));
        let expected = outcome.rows_in.min(self.builder.max_lag());
        if outcome.dropped > expected {
            debug!(
                "Sensor {} ({}): {} rows dropped beyond the {}-row warm-up (missing raw values)",
                short_id(sensor_id),
                split,
                outcome.dropped - expected,
                expected
            );
        }
        outcome
    }
}

/// First eight characters of a sensor id, for log lines.
fn short_id(sensor_id: &str) -> &str {
    sensor_id
        .char_indices()
        .nth(8)
        .map_or(sensor_id, |(i, _)| &sensor_id[..i])
}
