//! Error types for the forecasting pipeline.
//!
//! Input and model-state failures are fatal to the run. Insufficient sensor
//! history is reported through [`ForecastError::InsufficientHistory`] but the
//! assembler recovers from it by skipping the sensor.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Main error type for the forecasting pipeline
#[derive(Error, Debug)]
pub enum ForecastError {
    // ---
    #[error("Input error: {0}")]
    Input(String),

    #[error("Invalid timestamp '{value}' at record {record}")]
    InvalidTimestamp { record: usize, value: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempt to transform or predict with a feature set that differs from
    /// the one the scaler and ensemble were fitted on.
    #[error("Feature set mismatch: fitted on {expected:?}, got {actual:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Sensor {sensor_id} has no rows left after warm-up filtering ({rows_in} raw rows)")]
    InsufficientHistory { sensor_id: String, rows_in: usize },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Training error: {0}")]
    Training(String),

    #[error("Model not fitted")]
    ModelNotFitted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForecastError::Input("empty table".to_string());
        assert_eq!(err.to_string(), "Input error: empty table");

        let err = ForecastError::InvalidTimestamp {
            record: 3,
            value: "yesterday".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid timestamp 'yesterday' at record 3");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ForecastError = io_err.into();
        assert!(matches!(err, ForecastError::Io(_)));
    }
}
