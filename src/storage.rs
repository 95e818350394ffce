//! Reading the input tables and writing the pipeline's artifacts.

use std::fs::{self, File};
use std::path::Path;

use serde::Serialize;

use crate::error::{ForecastError, Result};
use crate::models::{PredictionRecord, RawSensorRecord, SensorReading};

// ---

/// Header columns every readings table must carry.
const READING_COLUMNS: [&str; 6] = [
    "sensor_id",
    "timestamp",
    "latitude",
    "longitude",
    "humidity",
    "temperature",
];

/// Load and validate a readings table.
///
/// A missing column, a non-numeric value or a bad timestamp aborts the load.
/// Empty numeric cells are kept as NaN for the warm-up filter to drop.
pub fn load_readings(path: &Path) -> Result<Vec<SensorReading>> {
    // ---
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| ForecastError::Input(format!("cannot open {}: {}", path.display(), e)))?;

    let headers = reader.headers()?.clone();
    if let Some(missing) = READING_COLUMNS
        .iter()
        .find(|column| !headers.iter().any(|h| h == **column))
    {
        return Err(ForecastError::Input(format!(
            "{} is missing the '{}' column",
            path.display(),
            missing
        )));
    }

    let mut readings = Vec::new();
    for (i, result) in reader.deserialize::<RawSensorRecord>().enumerate() {
        let raw = result?;
        readings.push(raw.to_reading(i + 1)?);
    }

    if readings.is_empty() {
        return Err(ForecastError::Input(format!(
            "{} contains no readings",
            path.display()
        )));
    }

    tracing::debug!("Loaded {} readings from {}", readings.len(), path.display());
    Ok(readings)
}

/// Write the results table, one row per prediction.
pub fn write_results(path: &Path, records: &[PredictionRecord]) -> Result<()> {
    // ---
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a results table back, as the external viewers do.
pub fn load_results(path: &Path) -> Result<Vec<PredictionRecord>> {
    // ---
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize()
        .map(|r| r.map_err(ForecastError::from))
        .collect()
}

/// Pretty-printed JSON document.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    // ---
    ensure_parent(path)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}
