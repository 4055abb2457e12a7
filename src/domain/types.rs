//! Shared domain types.
//!
//! These types are transient: each Predict action builds them fresh and drops
//! them once displayed or exported.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::PipelineError;
use crate::explain::ExplanationResult;
use crate::input::InputVector;

/// Predicted class and the probability the model assigns to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub class_id: usize,
    /// Probability at index `class_id` of `probabilities`, in `[0, 1]`.
    pub probability: f64,
    /// Full distribution over classes.
    pub probabilities: Vec<f64>,
}

impl PredictionResult {
    /// Probability as a percentage, the way it is displayed.
    pub fn percent(&self) -> f64 {
        self.probability * 100.0
    }
}

/// Everything one Predict action produced.
///
/// A failed explanation does not erase the prediction: `explanation` carries
/// its own error so the front-end can show the probability and report the
/// missing explanation.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub vector: InputVector,
    pub prediction: PredictionResult,
    pub explanation: Result<ExplanationResult, PipelineError>,
}

/// JSON export of one Predict action.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionExport<'a> {
    pub tool: &'static str,
    pub generated: DateTime<Local>,
    pub model: String,
    pub features: Vec<ExportedFeature<'a>>,
    pub prediction: &'a PredictionResult,
    pub explanation: Option<&'a ExplanationResult>,
    pub explanation_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedFeature<'a> {
    pub name: &'a str,
    pub value: f64,
}

/// A run's configuration as understood by the pipeline and front-ends.
///
/// This is derived from CLI flags, `.env` and defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model_path: PathBuf,
    /// Alternative feature table; `None` uses the built-in AKI schema.
    pub schema_path: Option<PathBuf>,
    /// Directory receiving `prediction_text.png` and `shap_force_plot.png`.
    pub out_dir: PathBuf,
    pub write_artifacts: bool,
    pub export_json: Option<PathBuf>,
}
