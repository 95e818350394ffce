//! Model gateway (EMBP).
//!
//! `pipeline` is the only entry point callers need; `scaler`, `tree` and
//! `forest` are its internals and stay private apart from the types the
//! pipeline hands back.

mod forest;
mod metrics;
mod pipeline;
mod scaler;
mod tree;

pub use forest::{ForestConfig, RandomForest};
pub use metrics::EvaluationMetrics;
pub use pipeline::{FeatureImportance, ModelPipeline, TrainedModel};
pub use scaler::StandardScaler;
