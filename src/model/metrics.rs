//! Regression error metrics

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// MAE / RMSE / R² summary for one slice of predictions.
///
/// `r2` is NaN when the true values have zero variance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

impl EvaluationMetrics {
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Result<Self> {
        // ---
        if y_true.len() != y_pred.len() {
            return Err(ForecastError::Shape {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(ForecastError::Input(
                "cannot evaluate an empty prediction set".to_string(),
            ));
        }

        let n = y_true.len() as f64;
        let (abs_sum, sq_sum) = y_true
            .iter()
            .zip(y_pred)
            .fold((0.0, 0.0), |(a, s), (t, p)| {
                let d = t - p;
                (a + d.abs(), s + d * d)
            });

        let mean = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - sq_sum / ss_tot
        } else {
            tracing::debug!("Target has zero variance over {} rows; R² is undefined", y_true.len());
            f64::NAN
        };

        Ok(Self {
            mae: abs_sum / n,
            rmse: (sq_sum / n).sqrt(),
            r2,
        })
    }

    /// Log the metrics the way every pipeline stage reports them.
    pub fn log(&self, dataset_name: &str) {
        tracing::info!("{} Set Metrics:", dataset_name);
        tracing::info!("  MAE: {:.4}°C", self.mae);
        tracing::info!("  RMSE: {:.4}°C", self.rmse);
        tracing::info!("  R² Score: {:.4}", self.r2);
        if self.r2.is_nan() {
            tracing::warn!("{} target has zero variance; R² reported as NaN", dataset_name);
        }
    }
}
