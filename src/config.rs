//! Configuration loader for the `sensorflow-forecast` batch job.
//!
//! All runtime settings (input and output paths, feature windows and forest
//! hyperparameters) are read here from environment variables, with optional
//! `.env` support provided by the caller. Nothing else in the crate calls
//! `env::var` for configuration.
//!
use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::features::SeriesConfig;
use crate::model::ForestConfig;
use crate::runner::PipelineOptions;

/// Parse an optional environment variable into `$ty`, falling back to a default.
macro_rules! parse_env {
    ($lookup:expr, $var_name:expr, $ty:ty, $default:expr) => {
        $lookup($var_name)
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

const DEFAULT_LAGS: &str = "1,2,3,6,12,24";

/// Strongly typed run configuration.
///
/// Immutable after loading; one snapshot drives the whole run.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Training readings table.
    pub train_path: PathBuf,

    /// Test readings table.
    pub test_path: PathBuf,

    /// Output results table (one row per prediction).
    pub results_path: PathBuf,

    /// Output JSON metrics summary.
    pub metrics_path: PathBuf,

    /// Lag periods, in observations.
    pub feature_lags: Vec<usize>,

    pub forest_trees: usize,

    /// `None` grows trees until the leaf constraints stop them.
    pub forest_max_depth: Option<usize>,

    pub min_samples_split: usize,

    pub min_samples_leaf: usize,

    /// Base seed for bootstrap sampling.
    pub seed: u64,

    /// Number of features listed in the importance ranking.
    pub importance_top_n: usize,
}

/// Load configuration from the process environment.
///
/// Required:
/// - `TRAIN_DATA_PATH` – training readings CSV
/// - `TEST_DATA_PATH` – test readings CSV
///
/// Optional:
/// - `RESULTS_PATH` – results CSV (default: `predictions_results.csv`)
/// - `METRICS_PATH` – metrics JSON (default: `predictions_metrics.json`)
/// - `FEATURE_LAGS` – comma-separated lags (default: `1,2,3,6,12,24`)
/// - `FOREST_TREES` (default: 100)
/// - `FOREST_MAX_DEPTH` – 0 for unlimited (default: 20)
/// - `FOREST_MIN_SAMPLES_SPLIT` (default: 5)
/// - `FOREST_MIN_SAMPLES_LEAF` (default: 2)
/// - `FOREST_SEED` (default: 42)
/// - `IMPORTANCE_TOP_N` (default: 10)
///
/// Returns an error if any required variable is missing or any value is invalid.
pub fn load_from_env() -> Result<Config> {
    load_from(|name| env::var(name).ok())
}

/// Same as [`load_from_env`], reading variables through `lookup`.
pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    // ---
    let train_path = PathBuf::from(require_env!(lookup, "TRAIN_DATA_PATH"));
    let test_path = PathBuf::from(require_env!(lookup, "TEST_DATA_PATH"));
    let results_path = PathBuf::from(parse_env!(
        lookup,
        "RESULTS_PATH",
        String,
        "predictions_results.csv".to_string()
    ));
    let metrics_path = PathBuf::from(parse_env!(
        lookup,
        "METRICS_PATH",
        String,
        "predictions_metrics.json".to_string()
    ));

    let feature_lags = parse_lags(&lookup("FEATURE_LAGS").unwrap_or_else(|| DEFAULT_LAGS.into()))?;

    let forest_trees = parse_env!(lookup, "FOREST_TREES", usize, 100);
    let max_depth = parse_env!(lookup, "FOREST_MAX_DEPTH", usize, 20);
    let min_samples_split = parse_env!(lookup, "FOREST_MIN_SAMPLES_SPLIT", usize, 5);
    let min_samples_leaf = parse_env!(lookup, "FOREST_MIN_SAMPLES_LEAF", usize, 2);
    let seed = parse_env!(lookup, "FOREST_SEED", u64, 42);
    let importance_top_n = parse_env!(lookup, "IMPORTANCE_TOP_N", usize, 10);

    if forest_trees == 0 {
        return Err(anyhow!("Invalid FOREST_TREES: must be at least 1"));
    }
    if min_samples_split < 2 {
        return Err(anyhow!("Invalid FOREST_MIN_SAMPLES_SPLIT: must be at least 2"));
    }
    if min_samples_leaf == 0 {
        return Err(anyhow!("Invalid FOREST_MIN_SAMPLES_LEAF: must be at least 1"));
    }

    Ok(Config {
        train_path,
        test_path,
        results_path,
        metrics_path,
        feature_lags,
        forest_trees,
        forest_max_depth: (max_depth > 0).then_some(max_depth),
        min_samples_split,
        min_samples_leaf,
        seed,
        importance_top_n,
    })
}

/// Parse a comma-separated list of positive lags, e.g. `1,2,3,6,12,24`.
///
/// Duplicates are removed; order is kept.
fn parse_lags(raw: &str) -> Result<Vec<usize>> {
    // ---
    let mut lags: Vec<usize> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let lag: usize = part
            .parse()
            .map_err(|e| anyhow!("Invalid FEATURE_LAGS entry '{}': {}", part, e))?;
        if lag == 0 {
            // A zero lag is the target itself
            return Err(anyhow!("Invalid FEATURE_LAGS entry '0': lags must be positive"));
        }
        if !lags.contains(&lag) {
            lags.push(lag);
        }
    }

    if lags.is_empty() {
        return Err(anyhow!("FEATURE_LAGS must list at least one lag"));
    }
    Ok(lags)
}

impl Config {
    /// Log the loaded configuration.
    pub fn log_config(&self) {
        // ---
        let max_depth = self
            .forest_max_depth
            .map_or_else(|| "unlimited".to_string(), |d| d.to_string());

        tracing::info!("Configuration loaded:");
        tracing::info!("  TRAIN_DATA_PATH          : {}", self.train_path.display());
        tracing::info!("  TEST_DATA_PATH           : {}", self.test_path.display());
        tracing::info!("  RESULTS_PATH             : {}", self.results_path.display());
        tracing::info!("  METRICS_PATH             : {}", self.metrics_path.display());
        tracing::info!("  FEATURE_LAGS             : {:?}", self.feature_lags);
        tracing::info!("  FOREST_TREES             : {}", self.forest_trees);
        tracing::info!("  FOREST_MAX_DEPTH         : {}", max_depth);
        tracing::info!("  FOREST_MIN_SAMPLES_SPLIT : {}", self.min_samples_split);
        tracing::info!("  FOREST_MIN_SAMPLES_LEAF  : {}", self.min_samples_leaf);
        tracing::info!("  FOREST_SEED              : {}", self.seed);
        tracing::info!("  IMPORTANCE_TOP_N         : {}", self.importance_top_n);
    }

    /// Feature and model settings for [`crate::runner::run_pipeline`].
    pub fn pipeline_options(&self) -> PipelineOptions {
        // ---
        PipelineOptions {
            series: SeriesConfig {
                lags: self.feature_lags.clone(),
                ..SeriesConfig::default()
            },
            forest: ForestConfig {
                n_estimators: self.forest_trees,
                max_depth: self.forest_max_depth,
                min_samples_split: self.min_samples_split,
                min_samples_leaf: self.min_samples_leaf,
                random_state: self.seed,
                ..ForestConfig::default()
            },
            importance_top_n: self.importance_top_n,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_from(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("TRAIN_DATA_PATH", "data/train.csv"),
        ("TEST_DATA_PATH", "data/test.csv"),
    ];

    #[test]
    fn test_defaults() {
        // ---
        let cfg = load(&REQUIRED).unwrap();

        assert_eq!(cfg.train_path, PathBuf::from("data/train.csv"));
        assert_eq!(cfg.results_path, PathBuf::from("predictions_results.csv"));
        assert_eq!(cfg.metrics_path, PathBuf::from("predictions_metrics.json"));
        assert_eq!(cfg.feature_lags, vec![1, 2, 3, 6, 12, 24]);
        assert_eq!(cfg.forest_trees, 100);
        assert_eq!(cfg.forest_max_depth, Some(20));
        assert_eq!(cfg.min_samples_split, 5);
        assert_eq!(cfg.min_samples_leaf, 2);
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.importance_top_n, 10);

        let options = cfg.pipeline_options();
        assert_eq!(options.series, SeriesConfig::default());
        assert_eq!(options.forest, ForestConfig::default());
    }

    #[test]
    fn test_missing_required() {
        // ---
        let err = load(&[("TRAIN_DATA_PATH", "train.csv")]).unwrap_err();
        assert!(err.to_string().contains("TEST_DATA_PATH"));

        let err = load(&[("TRAIN_DATA_PATH", " "), ("TEST_DATA_PATH", "t.csv")]).unwrap_err();
        assert!(err.to_string().contains("TRAIN_DATA_PATH"));
    }

    #[test]
    fn test_overrides() {
        // ---
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("FEATURE_LAGS", " 1, 3,3 ,6"),
            ("FOREST_TREES", "12"),
            ("FOREST_MAX_DEPTH", "0"),
            ("FOREST_SEED", "7"),
        ]);
        let cfg = load(&vars).unwrap();

        assert_eq!(cfg.feature_lags, vec![1, 3, 6]);
        assert_eq!(cfg.forest_trees, 12);
        assert_eq!(cfg.forest_max_depth, None);
        assert_eq!(cfg.pipeline_options().forest.random_state, 7);
    }

    #[test]
    fn test_invalid_values() {
        // ---
        for (name, value) in [
            ("FOREST_TREES", "many"),
            ("FOREST_TREES", "0"),
            ("FOREST_MIN_SAMPLES_SPLIT", "1"),
            ("FOREST_MIN_SAMPLES_LEAF", "0"),
            ("FEATURE_LAGS", "1,0,2"),
            ("FEATURE_LAGS", ","),
            ("FEATURE_LAGS", "1,x"),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.push((name, value));
            let err = load(&vars).unwrap_err();
            assert!(err.to_string().contains(name), "{name}={value}: {err}");
        }
    }
}
