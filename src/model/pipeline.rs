//! Scaler + forest pipeline with an explicit Unfit → Fit lifecycle.

use ndarray::Array1;
use serde::Serialize;
use tracing::info;

use super::forest::{ForestConfig, RandomForest};
use super::metrics::EvaluationMetrics;
use super::scaler::StandardScaler;
use crate::error::{ForecastError, Result};
use crate::features::FeatureMatrix;

// ---

/// Scaler, ensemble and feature names produced by one `fit` call.
///
/// Immutable once built; the three parts always share one column order.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    scaler: StandardScaler,
    forest: RandomForest,
    feature_names: Vec<String>,
}

impl TrainedModel {
    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

/// A feature name paired with its normalized importance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone)]
enum PipelineState {
    Unfit,
    Fit(Box<TrainedModel>),
}

/// Owns a feature scaler and a regression forest.
///
/// `predict` and `feature_importance` are read-only queries once fitted. A
/// fit that fails (or never finishes) leaves the pipeline `Unfit`.
#[derive(Debug, Clone)]
pub struct ModelPipeline {
    config: ForestConfig,
    state: PipelineState,
}

impl Default for ModelPipeline {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl ModelPipeline {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            state: PipelineState::Unfit,
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, PipelineState::Fit(_))
    }

    pub fn trained(&self) -> Option<&TrainedModel> {
        match &self.state {
            PipelineState::Fit(model) => Some(model.as_ref()),
            PipelineState::Unfit => None,
        }
    }

    /// Fit scaler statistics on `x_train` only, then the forest on the scaled
    /// matrix.
    pub fn fit(&mut self, x_train: &FeatureMatrix, y_train: &Array1<f64>) -> Result<&TrainedModel> {
        // ---
        self.state = PipelineState::Unfit;

        if x_train.nrows() == 0 {
            return Err(ForecastError::Input("training matrix is empty".to_string()));
        }
        if x_train.nrows() != y_train.len() {
            return Err(ForecastError::Shape {
                expected: format!("y length = {}", x_train.nrows()),
                actual: format!("y length = {}", y_train.len()),
            });
        }
        if let Some(column) = first_non_finite_column(x_train) {
            return Err(ForecastError::Input(format!(
                "training column '{column}' contains non-numeric values"
            )));
        }
        if y_train.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::Input(
                "training target contains non-numeric values".to_string(),
            ));
        }

        info!(
            "Training Random Forest model ({} trees, {} rows x {} features)...",
            self.config.n_estimators,
            x_train.nrows(),
            x_train.columns.len()
        );

        let scaler = StandardScaler::fit(x_train)?;
        let scaled = scaler.transform(x_train)?;
        let forest = RandomForest::fit(&self.config, scaled.view(), y_train.view())?;

        info!(
            "Model training completed ({} trees over {} features)",
            forest.n_trees(),
            forest.n_features()
        );

        let model = TrainedModel {
            scaler,
            forest,
            feature_names: x_train.columns.clone(),
        };
        self.state = PipelineState::Fit(Box::new(model));

        self.trained().ok_or(ForecastError::ModelNotFitted)
    }

    /// Predict with the already-fitted scaler and forest.
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Array1<f64>> {
        // ---
        let model = self.trained().ok_or(ForecastError::ModelNotFitted)?;
        let scaled = model.scaler.transform(x)?;
        model.forest.predict(scaled.view())
    }

    /// MAE / RMSE / R² of `y_pred` against `y_true`.
    pub fn evaluate(&self, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<EvaluationMetrics> {
        EvaluationMetrics::compute(&y_true.to_vec(), &y_pred.to_vec())
    }

    /// Top `top_n` features by importance, highest first.
    pub fn feature_importance(&self, top_n: usize) -> Result<Vec<FeatureImportance>> {
        // ---
        let model = self.trained().ok_or(ForecastError::ModelNotFitted)?;
        let scores = model.forest.feature_importances();

        assert_eq!(
            scores.len(),
            model.feature_names.len(),
            "importance scores and feature names come from different fits"
        );

        let mut ranked: Vec<FeatureImportance> = model
            .feature_names
            .iter()
            .zip(scores.iter())
            .map(|(feature, &importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();

        // Stable, so ties keep feature order
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked.truncate(top_n);
        Ok(ranked)
    }
}

fn first_non_finite_column(x: &FeatureMatrix) -> Option<&str> {
    x.values
        .columns()
        .into_iter()
        .zip(&x.columns)
        .find(|(values, _)| values.iter().any(|v| !v.is_finite()))
        .map(|(_, name)| name.as_str())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use ndarray::{array, Array2};

    fn matrix(values: Array2<f64>) -> FeatureMatrix {
        let columns = (0..values.ncols()).map(|i| format!("f{i}")).collect();
        FeatureMatrix::new(columns, values).unwrap()
    }

    fn small_pipeline() -> ModelPipeline {
        ModelPipeline::new(ForestConfig {
            n_estimators: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            ..ForestConfig::default()
        })
    }

    fn training_data() -> (FeatureMatrix, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 3), |(i, j)| match j {
            0 => i as f64,
            1 => (i % 4) as f64,
            _ => 7.0,
        });
        let y: Array1<f64> = (0..30).map(|i| 15.0 + i as f64 * 0.3).collect();
        (matrix(x), y)
    }

    #[test]
    fn test_predict_before_fit() {
        // ---
        let pipeline = small_pipeline();
        let (x, _) = training_data();

        assert!(!pipeline.is_fitted());
        assert!(matches!(pipeline.predict(&x), Err(ForecastError::ModelNotFitted)));
        assert!(matches!(
            pipeline.feature_importance(5),
            Err(ForecastError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_fit_then_predict() {
        // ---
        let mut pipeline = small_pipeline();
        let (x, y) = training_data();

        pipeline.fit(&x, &y).unwrap();
        assert!(pipeline.is_fitted());

        let forest = pipeline.trained().unwrap().forest();
        assert_eq!(forest.n_trees(), 10);
        assert_eq!(forest.n_features(), 3);

        let preds = pipeline.predict(&x).unwrap();
        assert_eq!(preds.len(), 30);

        let metrics = pipeline.evaluate(&y, &preds).unwrap();
        assert!(metrics.mae < 0.5, "MAE too high: {}", metrics.mae);
    }

    #[test]
    fn test_predict_rejects_reordered_columns() {
        // ---
        let mut pipeline = small_pipeline();
        let (x, y) = training_data();
        pipeline.fit(&x, &y).unwrap();

        let mut columns = x.columns.clone();
        columns.swap(0, 1);
        let reordered = FeatureMatrix::new(columns, x.values.clone()).unwrap();

        assert!(matches!(
            pipeline.predict(&reordered),
            Err(ForecastError::FeatureMismatch { .. })
        ));
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        // ---
        let mut pipeline = small_pipeline();

        let empty = matrix(Array2::zeros((0, 2)));
        assert!(pipeline.fit(&empty, &Array1::zeros(0)).is_err());

        let x = matrix(array![[1.0, f64::NAN], [2.0, 3.0]]);
        let err = pipeline.fit(&x, &array![1.0, 2.0]).unwrap_err();
        assert!(err.to_string().contains("f1"));
        assert!(!pipeline.is_fitted());
    }

    #[test]
    fn test_failed_refit_returns_to_unfit() {
        // ---
        let mut pipeline = small_pipeline();
        let (x, y) = training_data();
        pipeline.fit(&x, &y).unwrap();

        let empty = matrix(Array2::zeros((0, 3)));
        assert!(pipeline.fit(&empty, &Array1::zeros(0)).is_err());
        assert!(!pipeline.is_fitted());
    }

    #[test]
    fn test_feature_importance_ranked() {
        // ---
        let mut pipeline = small_pipeline();
        let (x, y) = training_data();
        pipeline.fit(&x, &y).unwrap();

        let all = pipeline.feature_importance(usize::MAX).unwrap();
        assert_eq!(all.len(), 3);
        let total: f64 = all.iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(all.windows(2).all(|w| w[0].importance >= w[1].importance));
        assert_eq!(all[0].feature, "f0");

        let top = pipeline.feature_importance(2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0], all[0]);
    }
}
