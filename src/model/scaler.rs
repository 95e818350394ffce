//! Standard (z-score) feature scaling

use ndarray::{Array1, Array2, Axis};

use crate::error::{ForecastError, Result};
use crate::features::FeatureMatrix;

/// Per-feature `(x - mean) / scale`, fitted once on the training matrix.
///
/// `scale` is the population standard deviation, replaced by 1 for constant
/// columns. Transforming a matrix whose columns differ from the fitted ones
/// is refused rather than coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    columns: Vec<String>,
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit on a training matrix. Nothing else ever contributes statistics.
    pub fn fit(x: &FeatureMatrix) -> Result<Self> {
        // ---
        if x.nrows() == 0 {
            return Err(ForecastError::Input(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let mean = x
            .values
            .mean_axis(Axis(0))
            .ok_or_else(|| ForecastError::Input("cannot fit scaler on an empty matrix".into()))?;
        let scale = x
            .values
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() && s > 0.0 { s } else { 1.0 });

        Ok(Self {
            columns: x.columns.clone(),
            mean,
            scale,
        })
    }

    /// Scale `x` with the fitted statistics.
    pub fn transform(&self, x: &FeatureMatrix) -> Result<Array2<f64>> {
        // ---
        if x.columns != self.columns {
            return Err(ForecastError::FeatureMismatch {
                expected: self.columns.clone(),
                actual: x.columns.clone(),
            });
        }
        Ok((&x.values - &self.mean) / &self.scale)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use ndarray::array;

    fn matrix(values: Array2<f64>) -> FeatureMatrix {
        let columns = (0..values.ncols()).map(|i| format!("f{i}")).collect();
        FeatureMatrix::new(columns, values).unwrap()
    }

    #[test]
    fn test_fit_transform() {
        // ---
        let x = matrix(array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]]);
        let scaler = StandardScaler::fit(&x).unwrap();

        assert_eq!(scaler.mean().to_vec(), vec![3.0, 10.0]);
        // Constant column keeps unit scale
        assert_eq!(scaler.scale()[1], 1.0);

        let scaled = scaler.transform(&x).unwrap();
        let col_mean: f64 = scaled.column(0).sum() / 3.0;
        assert!(col_mean.abs() < 1e-12);
        assert_eq!(scaled.column(1).to_vec(), vec![0.0, 0.0, 0.0]);

        // Population std of [1, 3, 5] is sqrt(8/3)
        assert!((scaler.scale()[0] - (8.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_transform_rejects_other_columns() {
        // ---
        let x = matrix(array![[1.0, 2.0], [3.0, 4.0]]);
        let scaler = StandardScaler::fit(&x).unwrap();

        let swapped = FeatureMatrix::new(vec!["f1".into(), "f0".into()], x.values.clone()).unwrap();
        let err = scaler.transform(&swapped).unwrap_err();
        assert!(matches!(err, ForecastError::FeatureMismatch { .. }));
    }

    #[test]
    fn test_fit_rejects_empty() {
        // ---
        let x = matrix(Array2::zeros((0, 3)));
        assert!(StandardScaler::fit(&x).is_err());
    }
}
