//! Error types.
//!
//! - `PipelineError`: typed failures of the schema → input → inference →
//!   explanation pipeline (library-facing)
//! - `AppError`: what the `aki` binary reports (message + process exit code)

use thiserror::Error;

/// Exit code for bad input or configuration (schema, model file, feature values).
pub const EXIT_INPUT: u8 = 2;
/// Exit code for runtime failures (inference, explanation, rendering, terminal).
pub const EXIT_RUNTIME: u8 = 4;

/// Failures raised by the prediction pipeline.
///
/// Nothing in the pipeline recovers locally. Every variant propagates to the
/// front-end, which decides how to display it.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// The feature table itself is inconsistent (duplicate names, default out of range, ...).
    #[error("invalid feature schema: {0}")]
    Schema(String),

    /// Schema order/count diverges from the model's expected input layout.
    #[error("feature schema does not match the model: {0}")]
    SchemaMismatch(String),

    /// A value outside a numerical range or a categorical option set.
    #[error("value {value} for '{feature}' is out of domain: {reason}")]
    OutOfDomain {
        feature: String,
        value: f64,
        reason: String,
    },

    /// User-supplied values that cannot form an input vector at all
    /// (malformed JSON, wrong number of values).
    #[error("invalid feature values: {0}")]
    InvalidInput(String),

    /// A named assignment that matches no feature in the schema.
    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("failed to load model artifact: {0}")]
    ModelLoad(String),

    /// `predict` / `predict_proba` could not run on the supplied vector.
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("explanation failed: {0}")]
    Explanation(String),

    #[error("rendering failed: {0}")]
    Render(String),
}

impl PipelineError {
    /// Process exit code for this failure when it reaches the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Schema(_)
            | PipelineError::SchemaMismatch(_)
            | PipelineError::OutOfDomain { .. }
            | PipelineError::InvalidInput(_)
            | PipelineError::UnknownFeature(_)
            | PipelineError::ModelLoad(_) => EXIT_INPUT,
            PipelineError::ModelInvocation(_)
            | PipelineError::Explanation(_)
            | PipelineError::Render(_) => EXIT_RUNTIME,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_exit_codes() {
        let input = PipelineError::OutOfDomain {
            feature: "CRP".to_string(),
            value: 900.0,
            reason: "above max 690".to_string(),
        };
        assert_eq!(AppError::from(input).exit_code(), EXIT_INPUT);

        let runtime = PipelineError::Explanation("non-finite attribution".to_string());
        let app = AppError::from(runtime);
        assert_eq!(app.exit_code(), EXIT_RUNTIME);
        assert_eq!(app.to_string(), "explanation failed: non-finite attribution");
    }
}
