//! Random forest regressor: bagged regression trees fitted in parallel

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use crate::error::{ForecastError, Result};

/// Ensemble hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Base seed; tree `i` draws from `random_state + i`
    pub random_state: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(20),
            min_samples_split: 5,
            min_samples_leaf: 2,
            bootstrap: true,
            random_state: 42,
        }
    }
}

impl ForestConfig {
    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// Fitted random forest
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
    feature_importances: Array1<f64>,
}

impl RandomForest {
    /// Fit `config.n_estimators` trees, one bootstrap resample each.
    ///
    /// Every tree owns its own seeded RNG, so the fitted forest does not
    /// depend on how rayon schedules the work.
    pub fn fit(config: &ForestConfig, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<Self> {
        // ---
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(ForecastError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(ForecastError::Training(format!(
                "cannot fit a forest on a {n_samples}x{n_features} matrix"
            )));
        }
        if config.n_estimators == 0 {
            return Err(ForecastError::Training(
                "n_estimators must be at least 1".to_string(),
            ));
        }

        let params = config.tree_params();

        // Build trees in parallel
        let trees: Vec<RegressionTree> = (0..config.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = config.random_state.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample: Vec<usize> = if config.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                RegressionTree::fit(x, y, sample, &params)
            })
            .collect::<Result<_>>()?;

        let feature_importances = mean_importances(&trees, n_features);

        Ok(Self {
            trees,
            n_features,
            feature_importances,
        })
    }

    /// Mean of all tree predictions, aggregated once every tree has answered.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        // ---
        if x.ncols() != self.n_features {
            return Err(ForecastError::Shape {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let per_tree: Vec<Array1<f64>> = self.trees.par_iter().map(|t| t.predict(x)).collect();

        // Summed in tree order so results are bit-for-bit repeatable
        let mut total = Array1::<f64>::zeros(x.nrows());
        for preds in &per_tree {
            total += preds;
        }
        Ok(total / self.trees.len() as f64)
    }

    /// Impurity-based importances, summing to 1 across all features.
    pub fn feature_importances(&self) -> &Array1<f64> {
        &self.feature_importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Average the per-tree importances and renormalize. When no tree ever split
/// (constant target) every feature gets the same share.
fn mean_importances(trees: &[RegressionTree], n_features: usize) -> Array1<f64> {
    // ---
    let mut total = Array1::<f64>::zeros(n_features);
    for tree in trees {
        total += &Array1::from_vec(tree.feature_importances());
    }

    let sum = total.sum();
    if sum > 0.0 {
        total / sum
    } else {
        Array1::from_elem(n_features, 1.0 / n_features as f64)
    }
}
