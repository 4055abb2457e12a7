//! Pre-trained classifier artifacts.
//!
//! The pipeline only sees the `Classifier` capability (predict, probabilities,
//! per-class baselines). `TreeEnsemble` is the concrete gradient-boosted tree
//! implementation loaded from a JSON dump.

pub mod ensemble;

pub use ensemble::*;

use crate::error::PipelineError;

/// Minimal interface the inference pipeline needs from a trained model.
pub trait Classifier {
    /// Number of input features the model was trained on.
    fn n_features(&self) -> usize;

    /// Number of output classes (2 for binary models).
    fn n_classes(&self) -> usize;

    /// Training-time feature names, when the artifact records them.
    fn feature_names(&self) -> Option<&[String]>;

    /// Discrete predicted class for one input row.
    fn predict(&self, x: &[f64]) -> Result<usize, PipelineError>;

    /// Probability distribution over all classes for one input row.
    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, PipelineError>;

    /// Per-class expected output (margin space) over the training distribution.
    fn expected_values(&self) -> Vec<f64>;
}
