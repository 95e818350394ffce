//! Assembled feature tables and the numeric matrix handed to the model.

use ndarray::{Array1, Array2};

use crate::error::{ForecastError, Result};
use crate::models::SensorReading;

// ---

/// A reading that survived warm-up filtering, with its ordered feature values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub reading: SensorReading,
    pub features: Vec<f64>,
}

/// Concatenated per-sensor feature records sharing one column list.
///
/// Rows are grouped by sensor; no ordering across sensors is implied.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<String>,
    records: Vec<FeatureRecord>,
}

impl FeatureFrame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append one sensor's records. Every record must match the column count.
    pub fn extend(&mut self, records: Vec<FeatureRecord>) -> Result<()> {
        // ---
        if let Some(bad) = records.iter().find(|r| r.features.len() != self.columns.len()) {
            return Err(ForecastError::Shape {
                expected: format!("{} feature values", self.columns.len()),
                actual: format!(
                    "{} values for sensor {}",
                    bad.features.len(),
                    bad.reading.sensor_id
                ),
            });
        }
        self.records.extend(records);
        Ok(())
    }

    /// Row-major feature matrix with this frame's column names.
    pub fn feature_matrix(&self) -> FeatureMatrix {
        // ---
        let n_cols = self.columns.len();
        let flat: Vec<f64> = self
            .records
            .iter()
            .flat_map(|r| r.features.iter().copied())
            .collect();

        // `extend` guarantees every row has `n_cols` values
        let values = Array2::from_shape_vec((self.records.len(), n_cols), flat)
            .unwrap_or_else(|_| Array2::zeros((0, n_cols)));

        FeatureMatrix {
            columns: self.columns.clone(),
            values,
        }
    }

    /// Temperature target, aligned with [`FeatureFrame::feature_matrix`].
    pub fn target(&self) -> Array1<f64> {
        self.records.iter().map(|r| r.reading.temperature).collect()
    }
}

/// Numeric feature matrix together with its ordered column names.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        // ---
        if columns.len() != values.ncols() {
            return Err(ForecastError::Shape {
                expected: format!("{} columns", columns.len()),
                actual: format!("{} columns", values.ncols()),
            });
        }
        Ok(Self { columns, values })
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(temp: f64, features: Vec<f64>) -> FeatureRecord {
        FeatureRecord {
            reading: SensorReading {
                sensor_id: "s1".into(),
                timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                latitude: 0.0,
                longitude: 0.0,
                humidity: 40.0,
                temperature: temp,
            },
            features,
        }
    }

    #[test]
    fn test_matrix_and_target_align() {
        // ---
        let mut frame = FeatureFrame::new(vec!["a".into(), "b".into()]);
        frame
            .extend(vec![record(20.0, vec![1.0, 2.0]), record(21.0, vec![3.0, 4.0])])
            .unwrap();

        let matrix = frame.feature_matrix();
        assert_eq!(matrix.values.shape(), &[2, 2]);
        assert_eq!(matrix.values[[1, 0]], 3.0);
        assert_eq!(frame.target().to_vec(), vec![20.0, 21.0]);
    }

    #[test]
    fn test_extend_rejects_wrong_width() {
        // ---
        let mut frame = FeatureFrame::new(vec!["a".into(), "b".into()]);
        let err = frame.extend(vec![record(20.0, vec![1.0])]).unwrap_err();
        assert!(matches!(err, ForecastError::Shape { .. }));
        assert!(frame.is_empty());
    }

    #[test]
    fn test_empty_frame_matrix() {
        // ---
        let frame = FeatureFrame::new(vec!["a".into()]);
        let matrix = frame.feature_matrix();
        assert_eq!(matrix.nrows(), 0);
        assert_eq!(matrix.values.ncols(), 1);
    }
}
