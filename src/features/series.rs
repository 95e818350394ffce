//! Per-sensor lag and rolling-window features.
//!
//! Every value derived for position `i` of a series reads only positions
//! `0..=i` of that same series. Positions without enough history carry `None`
//! and are removed later by the assembler's warm-up pass.

use serde::{Deserialize, Serialize};

use super::temporal::{self, CalendarFeatures, CALENDAR_COLUMNS};
use crate::models::SensorReading;

// ---

/// Lag and rolling-window settings for [`SensorSeriesFeatureBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    // ---
    /// Lag periods, in observations
    pub lags: Vec<usize>,
    /// Short rolling window (mean only)
    pub short_window: usize,
    /// Long rolling window (mean and standard deviation)
    pub long_window: usize,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            lags: vec![1, 2, 3, 6, 12, 24],
            short_window: 6,
            long_window: 24,
        }
    }
}

/// A reading augmented with calendar, lag and rolling fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    // ---
    pub reading: SensorReading,
    pub calendar: CalendarFeatures,
    /// `temp_lag_k` for each configured lag, in config order
    pub temp_lags: Vec<Option<f64>>,
    /// `humidity_lag_k` for each configured lag, in config order
    pub humidity_lags: Vec<Option<f64>>,
    pub temp_ma_short: f64,
    pub temp_ma_long: f64,
    pub humidity_ma_short: f64,
    pub humidity_ma_long: f64,
    pub temp_std_long: Option<f64>,
    pub humidity_std_long: Option<f64>,
}

impl FeatureRow {
    /// Feature values in [`SensorSeriesFeatureBuilder::feature_columns`] order.
    ///
    /// Returns `None` while any lag or rolling field is still undefined.
    pub fn values(&self) -> Option<Vec<f64>> {
        // ---
        let mut values = Vec::with_capacity(
            2 + CALENDAR_COLUMNS.len() + 1 + 2 * self.temp_lags.len() + 6,
        );

        values.push(self.reading.latitude);
        values.push(self.reading.longitude);
        values.extend_from_slice(&self.calendar.values());
        values.push(self.reading.humidity);

        for lag in self.temp_lags.iter().chain(self.humidity_lags.iter()) {
            values.push((*lag)?);
        }

        values.push(self.temp_ma_short);
        values.push(self.temp_ma_long);
        values.push(self.humidity_ma_short);
        values.push(self.humidity_ma_long);
        values.push(self.temp_std_long?);
        values.push(self.humidity_std_long?);

        Some(values)
    }
}

/// Builds lag and rolling-statistic features for one sensor's readings.
#[derive(Debug, Clone, Default)]
pub struct SensorSeriesFeatureBuilder {
    config: SeriesConfig,
}

impl SensorSeriesFeatureBuilder {
    pub fn new(config: SeriesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SeriesConfig {
        &self.config
    }

    /// Longest configured lag; the warm-up length of every series.
    pub fn max_lag(&self) -> usize {
        self.config.lags.iter().copied().max().unwrap_or(0)
    }

    /// Canonical ordered feature columns produced by [`FeatureRow::values`].
    pub fn feature_columns(&self) -> Vec<String> {
        // ---
        let SeriesConfig {
            lags,
            short_window: short,
            long_window: long,
        } = &self.config;

        let mut columns: Vec<String> = vec!["latitude".into(), "longitude".into()];
        columns.extend(CALENDAR_COLUMNS.iter().map(|c| c.to_string()));
        columns.push("humidity".into());
        columns.extend(lags.iter().map(|k| format!("temp_lag_{k}")));
        columns.extend(lags.iter().map(|k| format!("humidity_lag_{k}")));
        columns.extend([
            format!("temp_ma_{short}"),
            format!("temp_ma_{long}"),
            format!("humidity_ma_{short}"),
            format!("humidity_ma_{long}"),
            format!("temp_std_{long}"),
            format!("humidity_std_{long}"),
        ]);
        columns
    }

    /// Derive feature rows for a single sensor's readings.
    ///
    /// Works on a timestamp-sorted copy; the input slice is left untouched.
    pub fn build(&self, readings: &[SensorReading]) -> Vec<FeatureRow> {
        // ---
        debug_assert!(
            readings
                .windows(2)
                .all(|pair| pair[0].sensor_id == pair[1].sensor_id),
            "series builder received readings from more than one sensor"
        );

        let mut series = readings.to_vec();
        if !series.windows(2).all(|p| p[0].timestamp <= p[1].timestamp) {
            tracing::debug!(
                "Re-sorting {} unsorted readings for sensor {}",
                series.len(),
                series[0].sensor_id
            );
            // Stable, so duplicate timestamps keep their input order
            series.sort_by_key(|r| r.timestamp);
        }

        let temps: Vec<f64> = series.iter().map(|r| r.temperature).collect();
        let hums: Vec<f64> = series.iter().map(|r| r.humidity).collect();
        let short = self.config.short_window;
        let long = self.config.long_window;

        series
            .into_iter()
            .enumerate()
            .map(|(i, reading)| {
                let lagged = |values: &[f64]| -> Vec<Option<f64>> {
                    self.config
                        .lags
                        .iter()
                        .map(|&k| i.checked_sub(k).map(|j| values[j]))
                        .collect()
                };

                FeatureRow {
                    calendar: temporal::extract(&reading.timestamp),
                    temp_lags: lagged(&temps),
                    humidity_lags: lagged(&hums),
                    temp_ma_short: trailing_mean(trailing(&temps, i, short)),
                    temp_ma_long: trailing_mean(trailing(&temps, i, long)),
                    humidity_ma_short: trailing_mean(trailing(&hums, i, short)),
                    humidity_ma_long: trailing_mean(trailing(&hums, i, long)),
                    temp_std_long: trailing_std(trailing(&temps, i, long)),
                    humidity_std_long: trailing_std(trailing(&hums, i, long)),
                    reading,
                }
            })
            .collect()
    }
}

/// Up to `window` observations ending at (and including) position `i`.
fn trailing(values: &[f64], i: usize, window: usize) -> &[f64] {
    let start = (i + 1).saturating_sub(window.max(1));
    &values[start..=i]
}

/// Mean over the finite observations; NaN when there are none.
fn trailing_mean(window: &[f64]) -> f64 {
    let (sum, n) = window
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        return f64::NAN;
    }
    sum / n as f64
}

/// Sample standard deviation over the finite observations; undefined below
/// two of them.
fn trailing_std(window: &[f64]) -> Option<f64> {
    // ---
    let finite: Vec<f64> = window.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return None;
    }
    let mean = trailing_mean(&finite);
    let ss: f64 = finite.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (finite.len() - 1) as f64).sqrt())
}
