//! Batch run orchestration: readings in, results table and summary out.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ForecastError, Result};
use crate::features::{DatasetAssembler, SensorSeriesFeatureBuilder, SeriesConfig};
use crate::model::{EvaluationMetrics, FeatureImportance, ForestConfig, ModelPipeline};
use crate::models::{PredictionRecord, SensorReading};
use crate::report::{EvaluationReport, EvaluationReporter};
use crate::storage;

// ---

/// Feature and model settings for one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub series: SeriesConfig,
    pub forest: ForestConfig,
    pub importance_top_n: usize,
}

/// Everything a run reports, written as the JSON metrics summary.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Option<Uuid>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub feature_count: usize,
    pub train_metrics: EvaluationMetrics,
    pub test_report: EvaluationReport,
    pub top_features: Vec<FeatureImportance>,
    pub skipped_sensors: Vec<String>,
    pub test_only_sensors: Vec<String>,
}

/// Predicted test rows plus the run summary.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: Vec<PredictionRecord>,
    pub summary: RunSummary,
}

/// Feature-engineer, fit on train, predict and evaluate on test.
///
/// Pure with respect to the filesystem; [`run`] adds loading and persistence.
pub fn run_pipeline(
    train: &[SensorReading],
    test: &[SensorReading],
    options: &PipelineOptions,
) -> Result<PipelineOutput> {
    // ---
    let assembler = DatasetAssembler::new(SensorSeriesFeatureBuilder::new(options.series.clone()));
    let dataset = assembler.assemble(train, test)?;

    if dataset.train.is_empty() {
        return Err(ForecastError::Input(
            "no training rows left after warm-up filtering".to_string(),
        ));
    }
    if dataset.test.is_empty() {
        return Err(ForecastError::Input(
            "no test rows left after warm-up filtering".to_string(),
        ));
    }

    let x_train = dataset.train.feature_matrix();
    let y_train = dataset.train.target();
    let x_test = dataset.test.feature_matrix();

    let mut pipeline = ModelPipeline::new(options.forest.clone());
    pipeline.fit(&x_train, &y_train)?;

    let train_pred = pipeline.predict(&x_train)?;
    let train_metrics = pipeline.evaluate(&y_train, &train_pred)?;
    train_metrics.log("Training");

    info!("Evaluating on test set...");
    let test_pred = pipeline.predict(&x_test)?;
    let records = EvaluationReporter::attach_predictions(&dataset.test, &test_pred)?;
    let test_report = EvaluationReporter::summarize(&records)?;
    EvaluationReporter::log_summary(&test_report);

    let top_features = pipeline.feature_importance(options.importance_top_n)?;
    info!("Top {} Most Important Features:", top_features.len());
    for f in &top_features {
        info!("  {:<20} {:.4}", f.feature, f.importance);
    }

    let summary = RunSummary {
        run_id: None,
        train_rows: x_train.nrows(),
        test_rows: x_test.nrows(),
        feature_count: x_train.columns.len(),
        train_metrics,
        test_report,
        top_features,
        skipped_sensors: dataset.skipped_sensors,
        test_only_sensors: dataset.test_only_sensors,
    };

    Ok(PipelineOutput { records, summary })
}

/// Full batch run: load both tables, run the pipeline, write the results
/// table and the JSON summary.
pub fn run(config: &Config, run_id: Uuid) -> Result<RunSummary> {
    // ---
    info!("Loading data...");
    let train = storage::load_readings(&config.train_path)?;
    let test = storage::load_readings(&config.test_path)?;
    info!("Training data: {} records", train.len());
    info!("Test data: {} records", test.len());

    let PipelineOutput {
        records,
        mut summary,
    } = run_pipeline(&train, &test, &config.pipeline_options())?;
    summary.run_id = Some(run_id);

    EvaluationReporter::persist(&records, &config.results_path)?;
    storage::write_json(&config.metrics_path, &summary)?;
    info!("Metrics summary saved to {}", config.metrics_path.display());

    if !summary.skipped_sensors.is_empty() {
        warn!(
            "{} sensor(s) skipped for insufficient history",
            summary.skipped_sensors.len()
        );
    }

    Ok(summary)
}
