//! Simple data models for the forecasting pipeline.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

// ---

/// Naive timestamp layouts accepted besides RFC 3339. Interpreted as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Raw sensor record as it appears in the input tables.
///
/// Numeric cells may be empty; they become NaN in the validated reading and
/// the affected rows are removed by the warm-up filter.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSensorRecord {
    // ---
    pub sensor_id: String,
    pub timestamp: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
}

/// Validated sensor reading, the immutable input fact of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    // ---
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Relative humidity in percent
    pub humidity: f64,
    /// Temperature in °C
    pub temperature: f64,
}

/// One row of the results table handed to the report viewer and plotting tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    // ---
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub humidity: f64,
    pub temperature: f64,
    pub prediction: f64,
    pub error: f64,
}

impl RawSensorRecord {
    /// Validate the record and parse its timestamp.
    ///
    /// `record` is the 1-based data row number, used in error messages.
    pub fn to_reading(&self, record: usize) -> Result<SensorReading> {
        // ---
        if self.sensor_id.trim().is_empty() {
            return Err(ForecastError::Input(format!(
                "record {record} has an empty sensor_id"
            )));
        }

        let timestamp =
            parse_timestamp(&self.timestamp).ok_or_else(|| ForecastError::InvalidTimestamp {
                record,
                value: self.timestamp.clone(),
            })?;

        Ok(SensorReading {
            sensor_id: self.sensor_id.clone(),
            timestamp,
            latitude: self.latitude.unwrap_or(f64::NAN),
            longitude: self.longitude.unwrap_or(f64::NAN),
            humidity: self.humidity.unwrap_or(f64::NAN),
            temperature: self.temperature.unwrap_or(f64::NAN),
        })
    }
}

impl PredictionRecord {
    /// Pair a reading with its prediction; `error` is the absolute residual.
    pub fn from_reading(reading: &SensorReading, prediction: f64) -> Self {
        // ---
        PredictionRecord {
            sensor_id: reading.sensor_id.clone(),
            timestamp: reading.timestamp,
            latitude: reading.latitude,
            longitude: reading.longitude,
            humidity: reading.humidity,
            temperature: reading.temperature,
            prediction,
            error: (reading.temperature - prediction).abs(),
        }
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 (offsets are converted to UTC), naive date-times with a
/// `T` or space separator (taken as UTC) and bare dates (midnight UTC).
///
/// The local wall clock of an offset input is not kept: calendar features and
/// hour-of-day slices read the UTC hour, so `08:00+05:00` counts as hour 3.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    // ---
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}
