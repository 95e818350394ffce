//! CART regression tree, the base learner of the forest

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::error::{ForecastError, Result};

/// Splits whose impurity decrease falls at or below this are ignored.
const MIN_DECREASE: f64 = 1e-12;

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// Maximum depth (`None` grows until another limit stops it)
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples in each child of a split
    pub min_samples_leaf: usize,
}

/// Decision tree node
#[derive(Debug, Clone)]
enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64 },
    /// Internal node; rows with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Regression tree minimizing squared error.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    root: TreeNode,
    /// Total weighted impurity decrease per feature
    impurity_decrease: Vec<f64>,
}

struct Grower<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    params: &'a TreeParams,
    impurity_decrease: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

impl RegressionTree {
    /// Fit on the rows listed in `sample`. Repeated indices (bootstrap draws)
    /// count once per occurrence.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        sample: Vec<usize>,
        params: &TreeParams,
    ) -> Result<Self> {
        // ---
        if sample.is_empty() {
            return Err(ForecastError::Training(
                "cannot grow a tree from an empty sample".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(ForecastError::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let mut grower = Grower {
            x: x.view(),
            y: y.view(),
            params,
            impurity_decrease: vec![0.0; x.ncols()],
        };
        let root = grower.grow(sample, 0);

        Ok(Self {
            root,
            impurity_decrease: grower.impurity_decrease,
        })
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        // ---
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.outer_iter().map(|row| self.predict_row(row)).collect()
    }

    /// Impurity-based importances normalized to sum to 1, or all zeros when
    /// the tree never split.
    pub fn feature_importances(&self) -> Vec<f64> {
        // ---
        let total: f64 = self.impurity_decrease.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.impurity_decrease.len()];
        }
        self.impurity_decrease.iter().map(|v| v / total).collect()
    }

    #[cfg(test)]
    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}

impl Grower<'_> {
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        // ---
        let n = indices.len();
        let value = indices.iter().map(|&i| self.y[i]).sum::<f64>() / n as f64;
        let node_sse: f64 = indices.iter().map(|&i| (self.y[i] - value).powi(2)).sum();

        let should_stop = n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || self.params.max_depth.map_or(false, |d| depth >= d)
            || node_sse <= MIN_DECREASE;
        if should_stop {
            return TreeNode::Leaf { value };
        }

        let Some(best) = self.find_best_split(&indices, value, node_sse) else {
            return TreeNode::Leaf { value };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[[i, best.feature]] <= best.threshold);
        if left.is_empty() || right.is_empty() {
            return TreeNode::Leaf { value };
        }

        self.impurity_decrease[best.feature] += best.decrease;

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.grow(left, depth + 1)),
            right: Box::new(self.grow(right, depth + 1)),
        }
    }

    /// Exhaustive scan over every feature, sweeping sorted values with running
    /// sums so each candidate threshold is evaluated in constant time. Targets
    /// are centered on the node mean to keep the running sums small.
    fn find_best_split(&self, indices: &[usize], mean: f64, parent_sse: f64) -> Option<BestSplit> {
        // ---
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let centered = |i: usize| self.y[i] - mean;
        let total_sum: f64 = indices.iter().map(|&i| centered(i)).sum();
        let total_sq: f64 = indices.iter().map(|&i| centered(i).powi(2)).sum();

        let mut best: Option<BestSplit> = None;
        let mut order = indices.to_vec();

        for feature in 0..self.x.ncols() {
            order.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 1..n {
                let yi = centered(order[k - 1]);
                left_sum += yi;
                left_sq += yi * yi;

                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let lo = self.x[[order[k - 1], feature]];
                let hi = self.x[[order[k], feature]];
                if lo >= hi {
                    continue;
                }

                let children = sse(k, left_sum, left_sq)
                    + sse(n - k, total_sum - left_sum, total_sq - left_sq);
                let decrease = parent_sse - children;

                if decrease > MIN_DECREASE && best.as_ref().map_or(true, |b| decrease > b.decrease) {
                    best = Some(BestSplit {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        decrease,
                    });
                }
            }
        }
        best
    }
}

/// Sum of squared deviations from the mean, from running sums.
fn sse(n: usize, sum: f64, sq_sum: f64) -> f64 {
    (sq_sum - sum * sum / n as f64).max(0.0)
}
