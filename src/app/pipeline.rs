//! Shared "predict pipeline" logic used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! input vector -> inference -> explanation
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use std::sync::Arc;

use crate::domain::{AppConfig, PipelineRun, PredictionResult};
use crate::error::PipelineError;
use crate::explain::{ExplanationResult, TreeExplainer};
use crate::input::InputVector;
use crate::models::{Classifier, TreeEnsemble};
use crate::schema::FeatureSchema;

/// Loaded schema + model + explainer, ready to serve Predict actions.
///
/// The model is a concrete `TreeEnsemble` because TreeSHAP walks its trees.
/// Inference and the startup check only use the `Classifier` surface
/// (`infer_with`, `check_schema_matches`).
#[derive(Debug, Clone)]
pub struct Pipeline {
    schema: FeatureSchema,
    model: Arc<TreeEnsemble>,
    explainer: TreeExplainer,
}

impl Pipeline {
    /// Bind a schema to a model, refusing layouts that do not line up.
    pub fn new(schema: FeatureSchema, model: TreeEnsemble) -> Result<Self, PipelineError> {
        check_schema_matches(&schema, &model)?;
        let model = Arc::new(model);
        let explainer = TreeExplainer::new(Arc::clone(&model));
        Ok(Self {
            schema,
            model,
            explainer,
        })
    }

    /// Load the schema and model named by the configuration.
    pub fn load(config: &AppConfig) -> Result<Self, PipelineError> {
        let schema = match &config.schema_path {
            Some(path) => FeatureSchema::load(path)?,
            None => FeatureSchema::aki()?,
        };
        let model = TreeEnsemble::load(&config.model_path)?;
        Self::new(schema, model)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn model(&self) -> &TreeEnsemble {
        &self.model
    }

    /// Predicted class and the probability of that class.
    pub fn infer(&self, vector: &InputVector) -> Result<PredictionResult, PipelineError> {
        infer_with(self.model.as_ref(), &self.schema, vector)
    }

    /// Attribute the prediction for `class_id` across the schema's features.
    pub fn explain(
        &self,
        vector: &InputVector,
        class_id: usize,
    ) -> Result<ExplanationResult, PipelineError> {
        self.explainer.explain(&self.schema, vector, class_id)
    }

    /// One full Predict action: infer, then explain the predicted class.
    ///
    /// Inference failures abort the action. Explanation failures are kept in
    /// the returned run next to the prediction that did succeed.
    pub fn run(&self, vector: InputVector) -> Result<PipelineRun, PipelineError> {
        let prediction = self.infer(&vector)?;
        tracing::info!(
            class_id = prediction.class_id,
            probability = prediction.probability,
            "prediction"
        );

        let explanation = self.explain(&vector, prediction.class_id);
        match &explanation {
            Ok(e) => tracing::debug!(
                base_value = e.base_value,
                output = e.output_value(),
                "explanation"
            ),
            Err(err) => tracing::warn!(error = %err, "explanation failed; showing prediction only"),
        }

        Ok(PipelineRun {
            vector,
            prediction,
            explanation,
        })
    }
}

/// Run `model` on `vector` and report the probability of the *predicted* class.
///
/// The probability is read at the index `predict` returns, which is not
/// necessarily the largest entry of the distribution.
pub fn infer_with<M: Classifier + ?Sized>(
    model: &M,
    schema: &FeatureSchema,
    vector: &InputVector,
) -> Result<PredictionResult, PipelineError> {
    if vector.len() != schema.len() {
        return Err(PipelineError::ModelInvocation(format!(
            "input has {} values, schema declares {} features",
            vector.len(),
            schema.len()
        )));
    }
    let class_id = model.predict(vector.as_slice())?;
    let probabilities = model.predict_proba(vector.as_slice())?;
    let probability = *probabilities.get(class_id).ok_or_else(|| {
        PipelineError::ModelInvocation(format!(
            "predicted class {class_id} but only {} probabilities",
            probabilities.len()
        ))
    })?;
    Ok(PredictionResult {
        class_id,
        probability,
        probabilities,
    })
}

/// Startup check that the schema's count (and names, when the artifact records
/// them) match the model's input layout.
pub fn check_schema_matches<M: Classifier + ?Sized>(
    schema: &FeatureSchema,
    model: &M,
) -> Result<(), PipelineError> {
    if schema.len() != model.n_features() {
        return Err(PipelineError::SchemaMismatch(format!(
            "schema declares {} features, model expects {}",
            schema.len(),
            model.n_features()
        )));
    }
    if let Some(names) = model.feature_names() {
        for (i, (declared, trained)) in schema.iter().zip(names).enumerate() {
            if declared.name != *trained {
                return Err(PipelineError::SchemaMismatch(format!(
                    "position {i}: schema has '{}', model was trained on '{trained}'",
                    declared.name
                )));
            }
        }
    }
    Ok(())
}
