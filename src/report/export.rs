//! Export one Predict action to JSON.
//!
//! The export carries the input vector (by feature name), the prediction and,
//! when it succeeded, the explanation. A failed explanation is recorded as its
//! error message instead.

use std::fs::File;
use std::path::Path;

use chrono::Local;

use crate::domain::{ExportedFeature, PipelineRun, PredictionExport};
use crate::error::{AppError, EXIT_RUNTIME};
use crate::schema::FeatureSchema;

/// Build the serializable view of a run.
pub fn build_export<'a>(
    run: &'a PipelineRun,
    schema: &'a FeatureSchema,
    model_path: &Path,
) -> PredictionExport<'a> {
    let features = schema
        .iter()
        .zip(run.vector.as_slice())
        .map(|(d, &value)| ExportedFeature {
            name: &d.name,
            value,
        })
        .collect();

    PredictionExport {
        tool: "aki",
        generated: Local::now(),
        model: model_path.display().to_string(),
        features,
        prediction: &run.prediction,
        explanation: run.explanation.as_ref().ok(),
        explanation_error: run.explanation.as_ref().err().map(ToString::to_string),
    }
}

/// Write a run to `path` as pretty-printed JSON.
pub fn write_prediction_json(
    path: &Path,
    run: &PipelineRun,
    schema: &FeatureSchema,
    model_path: &Path,
) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(
            EXIT_RUNTIME,
            format!("Failed to create export JSON '{}': {e}", path.display()),
        )
    })?;

    let export = build_export(run, schema, model_path);
    serde_json::to_writer_pretty(file, &export)
        .map_err(|e| AppError::new(EXIT_RUNTIME, format!("Failed to write export JSON: {e}")))?;

    tracing::info!(path = %path.display(), "wrote prediction export");
    Ok(())
}
