use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use approx::assert_abs_diff_eq;
use chrono::{Duration, TimeZone, Utc};
use tempfile::tempdir;

use sensorflow_forecast::config;
use sensorflow_forecast::features::{DatasetAssembler, SensorSeriesFeatureBuilder, SeriesConfig};
use sensorflow_forecast::model::{ForestConfig, ModelPipeline};
use sensorflow_forecast::{run_pipeline, runner, storage, PipelineOptions, SensorReading};

const SENSORS: [(&str, f64, f64); 2] = [
    ("a1b2c3d4-0000-4000-8000-000000000001", -23.55, 20.0),
    ("a1b2c3d4-0000-4000-8000-000000000002", -22.90, 25.0),
];

/// `n` hourly readings per sensor with a gentle linear warming trend.
fn hourly_fleet(n: usize) -> Vec<SensorReading> {
    // ---
    let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    SENSORS
        .iter()
        .flat_map(|&(id, lat, base)| {
            (0..n).map(move |i| SensorReading {
                sensor_id: id.to_string(),
                timestamp: t0 + Duration::hours(i as i64),
                latitude: lat,
                longitude: -46.63,
                humidity: 50.0 + 0.1 * i as f64,
                temperature: base + 0.05 * i as f64,
            })
        })
        .collect()
}

fn options() -> PipelineOptions {
    PipelineOptions {
        series: SeriesConfig::default(),
        forest: ForestConfig {
            n_estimators: 20,
            min_samples_split: 2,
            min_samples_leaf: 1,
            ..ForestConfig::default()
        },
        importance_top_n: 10,
    }
}

fn write_readings_csv(path: &Path, readings: &[SensorReading]) {
    // ---
    let mut text = String::from("sensor_id,timestamp,latitude,longitude,humidity,temperature\n");
    for r in readings {
        text.push_str(&format!(
            "{},{},{},{},{},{}\n",
            r.sensor_id,
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.latitude,
            r.longitude,
            r.humidity,
            r.temperature
        ));
    }
    fs::write(path, text).unwrap();
}

#[test]
fn end_to_end_two_sensors() -> Result<()> {
    // ---
    let readings = hourly_fleet(30);

    let out = run_pipeline(&readings, &readings, &options())?;

    // 30 readings minus the 24-row warm-up, per sensor
    assert_eq!(out.records.len(), 2 * (30 - 24));
    assert_eq!(out.summary.feature_count, 30);
    assert!(out.records.iter().all(|r| r.error >= 0.0));
    for r in &out.records {
        assert_abs_diff_eq!(r.error, (r.temperature - r.prediction).abs(), epsilon = 1e-12);
    }

    assert!(
        out.summary.test_report.overall.mae < 0.25,
        "MAE too high: {}",
        out.summary.test_report.overall.mae
    );
    assert_eq!(out.summary.test_report.per_sensor.len(), 2);
    assert_eq!(out.summary.test_report.per_sensor[0].sensor_id, SENSORS[0].0);
    assert!(out.summary.test_report.per_sensor.iter().all(|s| s.rows == 6));

    Ok(())
}

#[test]
fn permuting_one_sensor_leaves_the_other_untouched() -> Result<()> {
    // ---
    let readings = hourly_fleet(40);
    let mut permuted = readings.clone();

    // Reverse sensor B's values in place, keeping its timestamps
    let b: Vec<usize> = (0..permuted.len())
        .filter(|&i| permuted[i].sensor_id == SENSORS[1].0)
        .collect();
    let values: Vec<(f64, f64)> = b
        .iter()
        .rev()
        .map(|&i| (readings[i].temperature, readings[i].humidity))
        .collect();
    for (&i, (t, h)) in b.iter().zip(values) {
        permuted[i].temperature = t;
        permuted[i].humidity = h;
    }

    let assembler = DatasetAssembler::default();
    let original = assembler.assemble(&readings, &readings)?;
    let shuffled = assembler.assemble(&permuted, &permuted)?;

    let sensor_a = |frame: &sensorflow_forecast::features::FeatureFrame| {
        frame
            .records()
            .iter()
            .filter(|r| r.reading.sensor_id == SENSORS[0].0)
            .cloned()
            .collect::<Vec<_>>()
    };

    assert_eq!(sensor_a(&original.train), sensor_a(&shuffled.train));
    assert_eq!(sensor_a(&original.test), sensor_a(&shuffled.test));
    assert_ne!(original.train, shuffled.train);

    Ok(())
}

#[test]
fn scaler_statistics_ignore_the_test_split() -> Result<()> {
    // ---
    let train = hourly_fleet(40);
    let mut hot_test = hourly_fleet(40);
    for r in &mut hot_test {
        r.temperature += 15.0;
        r.humidity -= 20.0;
    }

    let assembler = DatasetAssembler::default();
    let mut means = Vec::new();
    for test in [&train, &hot_test] {
        let dataset = assembler.assemble(&train, test)?;
        let mut pipeline = ModelPipeline::new(options().forest);
        let model = pipeline.fit(&dataset.train.feature_matrix(), &dataset.train.target())?;
        means.push((model.scaler().mean().clone(), model.scaler().scale().clone()));
    }

    assert_eq!(means[0], means[1]);
    Ok(())
}

#[test]
fn same_seed_gives_identical_predictions() -> Result<()> {
    // ---
    let readings = hourly_fleet(36);

    let first = run_pipeline(&readings, &readings, &options())?;
    let second = run_pipeline(&readings, &readings, &options())?;

    assert_eq!(first.records, second.records);
    assert_eq!(first.summary.top_features, second.summary.top_features);
    Ok(())
}

#[test]
fn importances_are_normalized_and_ranked() -> Result<()> {
    // ---
    let readings = hourly_fleet(40);
    let assembler = DatasetAssembler::new(SensorSeriesFeatureBuilder::new(SeriesConfig::default()));
    let dataset = assembler.assemble(&readings, &readings)?;

    let mut pipeline = ModelPipeline::new(options().forest);
    pipeline.fit(&dataset.train.feature_matrix(), &dataset.train.target())?;

    let all = pipeline.feature_importance(usize::MAX)?;
    assert_eq!(all.len(), assembler.feature_columns().len());
    assert_abs_diff_eq!(all.iter().map(|f| f.importance).sum::<f64>(), 1.0, epsilon = 1e-6);

    let top = pipeline.feature_importance(5)?;
    assert_eq!(top.len(), 5);
    assert!(top.windows(2).all(|w| w[0].importance >= w[1].importance));
    Ok(())
}

#[tokio::test]
async fn batch_run_writes_results_and_summary() -> Result<()> {
    // ---
    let dir = tempdir()?;
    let train_path = dir.path().join("train.csv");
    let test_path = dir.path().join("test.csv");
    let results_path = dir.path().join("out").join("predictions_results.csv");
    let metrics_path = dir.path().join("out").join("predictions_metrics.json");

    let readings = hourly_fleet(30);
    write_readings_csv(&train_path, &readings);
    write_readings_csv(&test_path, &readings);

    let vars: HashMap<&str, String> = HashMap::from([
        ("TRAIN_DATA_PATH", train_path.display().to_string()),
        ("TEST_DATA_PATH", test_path.display().to_string()),
        ("RESULTS_PATH", results_path.display().to_string()),
        ("METRICS_PATH", metrics_path.display().to_string()),
        ("FOREST_TREES", "10".to_string()),
        ("FOREST_MIN_SAMPLES_SPLIT", "2".to_string()),
        ("FOREST_MIN_SAMPLES_LEAF", "1".to_string()),
        ("IMPORTANCE_TOP_N", "3".to_string()),
    ]);
    let cfg = config::load_from(|name| vars.get(name).cloned())?;

    let run_id = uuid::Uuid::new_v4();
    let summary = tokio::task::spawn_blocking(move || runner::run(&cfg, run_id)).await??;

    assert_eq!(summary.run_id, Some(run_id));
    assert_eq!(summary.test_rows, 12);

    let text = fs::read_to_string(&results_path)?;
    assert_eq!(
        text.lines().next(),
        Some("sensor_id,timestamp,latitude,longitude,humidity,temperature,prediction,error")
    );
    let results = storage::load_results(&results_path)?;
    assert_eq!(results.len(), 12);
    assert_eq!(results[0].sensor_id, SENSORS[0].0);
    assert_eq!(results[0].timestamp, readings[24].timestamp);

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&metrics_path)?)?;
    assert_eq!(json["run_id"], serde_json::json!(run_id.to_string()));
    assert_eq!(json["top_features"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["test_report"]["per_sensor"].as_array().map(Vec::len), Some(2));

    Ok(())
}
