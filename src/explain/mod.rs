//! Per-instance feature attribution (SHAP values) for tree ensembles.
//!
//! `TreeExplainer` binds to a loaded `TreeEnsemble` once and caches the per-class
//! baselines; `explain` then attributes one input row for one class.

pub mod tree_shap;

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::error::PipelineError;
use crate::input::InputVector;
use crate::models::{Classifier, OutputTransform, TreeEnsemble};
use crate::schema::FeatureSchema;

pub use tree_shap::tree_shap;

/// Attribution of one feature for the explained class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureAttribution {
    pub name: String,
    /// Input value the attribution was computed for.
    pub value: f64,
    /// Contribution to the class margin (log-odds for binary models).
    pub shap: f64,
}

/// Local explanation of one prediction for one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationResult {
    pub class_id: usize,
    /// Expected model output (margin space) for `class_id`.
    pub base_value: f64,
    /// One entry per schema feature, in schema order.
    pub attributions: Vec<FeatureAttribution>,
    /// Every class margin reconstructed as `baseline + Σ shap`.
    pub class_margins: Vec<f64>,
    pub transform: OutputTransform,
}

impl ExplanationResult {
    /// `base_value + Σ shap`: the model's margin for the explained class.
    pub fn output_value(&self) -> f64 {
        self.base_value + self.attributions.iter().map(|a| a.shap).sum::<f64>()
    }

    /// Probability of the explained class rebuilt from the attributions alone.
    pub fn reconstructed_probability(&self) -> f64 {
        self.transform.apply(&self.class_margins)[self.class_id]
    }

    pub fn shap_vector(&self) -> Vec<f64> {
        self.attributions.iter().map(|a| a.shap).collect()
    }

    /// Attributions sorted by absolute contribution, largest first.
    pub fn ranked(&self) -> Vec<&FeatureAttribution> {
        let mut out: Vec<&FeatureAttribution> = self.attributions.iter().collect();
        out.sort_by(|a, b| {
            b.shap
                .abs()
                .partial_cmp(&a.shap.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }
}

/// TreeSHAP explainer bound to one model.
///
/// Baselines are computed once here and reused for every explanation, since the
/// model is immutable once loaded.
#[derive(Debug, Clone)]
pub struct TreeExplainer {
    model: Arc<TreeEnsemble>,
    expected_values: Vec<f64>,
}

impl TreeExplainer {
    pub fn new(model: Arc<TreeEnsemble>) -> Self {
        let expected_values = model.expected_values();
        Self {
            model,
            expected_values,
        }
    }

    /// Per-class baselines (margin space).
    pub fn expected_values(&self) -> &[f64] {
        &self.expected_values
    }

    /// Attributions for every class, indexed `[class][feature]`.
    pub fn shap_values(&self, x: &[f64]) -> Result<Vec<Vec<f64>>, PipelineError> {
        let n_features = self.model.n_features();
        if x.len() != n_features {
            return Err(PipelineError::Explanation(format!(
                "expected {n_features} features, got {}",
                x.len()
            )));
        }

        // Trees are explained in parallel; summing in tree order keeps results
        // bit-for-bit reproducible.
        let per_tree: Vec<(usize, Vec<f64>)> = self
            .model
            .trees
            .par_iter()
            .map(|tree| {
                let mut phi = vec![0.0; n_features];
                tree_shap(tree, x, &mut phi);
                (tree.class_id, phi)
            })
            .collect();

        let mut raw = vec![vec![0.0; n_features]; self.model.margin_count()];
        for (class_id, phi) in per_tree {
            for (acc, v) in raw[class_id].iter_mut().zip(phi) {
                *acc += v;
            }
        }

        let per_class = match self.model.objective {
            crate::models::Objective::BinaryLogistic => {
                let positive = raw.swap_remove(0);
                let negative = positive.iter().map(|v| -v).collect();
                vec![negative, positive]
            }
            crate::models::Objective::MultiSoftprob => raw,
        };

        if per_class.iter().flatten().any(|v| !v.is_finite()) {
            return Err(PipelineError::Explanation(
                "non-finite attribution".to_string(),
            ));
        }
        Ok(per_class)
    }

    /// Explain `vector` for `class_id`, naming attributions after the schema.
    pub fn explain(
        &self,
        schema: &FeatureSchema,
        vector: &InputVector,
        class_id: usize,
    ) -> Result<ExplanationResult, PipelineError> {
        if vector.len() != schema.len() {
            return Err(PipelineError::Explanation(format!(
                "vector has {} values, schema has {} features",
                vector.len(),
                schema.len()
            )));
        }
        let shap = self.shap_values(vector.as_slice())?;
        let slice = shap.get(class_id).ok_or_else(|| {
            PipelineError::Explanation(format!(
                "class {class_id} out of range for {} classes",
                shap.len()
            ))
        })?;

        let class_margins: Vec<f64> = shap
            .iter()
            .zip(&self.expected_values)
            .map(|(phi, base)| base + phi.iter().sum::<f64>())
            .collect();

        let attributions = schema
            .iter()
            .zip(vector.as_slice())
            .zip(slice)
            .map(|((descriptor, &value), &shap)| FeatureAttribution {
                name: descriptor.name.clone(),
                value,
                shap,
            })
            .collect();

        Ok(ExplanationResult {
            class_id,
            base_value: self.expected_values[class_id],
            attributions,
            class_margins,
            transform: self.model.transform(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ensemble::tests::demo_model;

    #[test]
    fn binary_classes_are_mirror_images() {
        let model = demo_model();
        let explainer = TreeExplainer::new(Arc::new(model.clone()));
        let schema = FeatureSchema::aki().unwrap();
        let x = InputVector::defaults(&schema);
        let shap = explainer.shap_values(x.as_slice()).unwrap();
        assert_eq!(shap.len(), 2);
        for (neg, pos) in shap[0].iter().zip(&shap[1]) {
            assert_eq!(*neg, -pos);
        }
    }

    #[test]
    fn attributions_reconstruct_margin_and_probability() {
        let model = demo_model();
        let explainer = TreeExplainer::new(Arc::new(model.clone()));
        let schema = FeatureSchema::aki().unwrap();
        let x = InputVector::defaults(&schema);

        for class_id in 0..2 {
            let explanation = explainer.explain(&schema, &x, class_id).unwrap();
            let margin = model.class_margins(x.as_slice()).unwrap()[class_id];
            assert!((explanation.output_value() - margin).abs() < 1e-12);
            let proba = model.predict_proba(x.as_slice()).unwrap()[class_id];
            assert!((explanation.reconstructed_probability() - proba).abs() < 1e-9);
        }
    }

    #[test]
    fn demo_attributions_at_defaults() {
        let model = demo_model();
        let explainer = TreeExplainer::new(Arc::new(model.clone()));
        let schema = FeatureSchema::aki().unwrap();
        let x = InputVector::defaults(&schema);
        let explanation = explainer.explain(&schema, &x, 1).unwrap();

        let crp = &explanation.attributions[1];
        assert_eq!(crp.name, "CRP");
        assert!((crp.shap + 0.21).abs() < 1e-12, "{crp:?}");
        assert!((explanation.attributions[2].shap + 0.03).abs() < 1e-12);
        // Features no tree splits on get nothing.
        assert_eq!(explanation.attributions[5].shap, 0.0);
        assert!((explanation.base_value + 0.005).abs() < 1e-12);
        assert!((explanation.attributions[7].shap + 0.251_730_769_230_769_2).abs() < 1e-12);
        assert_eq!(explanation.ranked()[0].name, "Urinary catheterization");
        let total: f64 = explanation.shap_vector().iter().sum();
        assert!((total + 0.895).abs() < 1e-12);
    }

    #[test]
    fn multiclass_additivity_under_softmax() {
        let json = r#"{
            "objective": "multi:softprob", "num_class": 3, "base_score": 0.5, "num_feature": 2,
            "trees": [
                {"class_id": 0, "nodes": [
                    {"type": "split", "feature": 0, "threshold": 1.0, "left": 1, "right": 2, "cover": 10.0},
                    {"type": "leaf", "value": 0.4, "cover": 6.0},
                    {"type": "leaf", "value": -0.2, "cover": 4.0}
                ]},
                {"class_id": 1, "nodes": [
                    {"type": "split", "feature": 1, "threshold": 3.0, "left": 1, "right": 2, "cover": 10.0},
                    {"type": "leaf", "value": -0.5, "cover": 3.0},
                    {"type": "leaf", "value": 0.9, "cover": 7.0}
                ]},
                {"class_id": 2, "nodes": [{"type": "leaf", "value": 0.1, "cover": 10.0}]}
            ]
        }"#;
        let model = TreeEnsemble::from_json(json).unwrap();
        let schema = FeatureSchema::from_json(
            r#"{"features": [
                {"name": "a", "type": "numerical", "min": 0.0, "max": 10.0, "default": 0.0},
                {"name": "b", "type": "numerical", "min": 0.0, "max": 10.0, "default": 0.0}
            ]}"#,
        )
        .unwrap();
        let explainer = TreeExplainer::new(Arc::new(model.clone()));
        let x = InputVector::from_values(vec![2.0, 5.0]);
        let class_id = model.predict(x.as_slice()).unwrap();
        let explanation = explainer.explain(&schema, &x, class_id).unwrap();
        let proba = model.predict_proba(x.as_slice()).unwrap();
        assert!((explanation.reconstructed_probability() - proba[class_id]).abs() < 1e-9);
    }

    #[test]
    fn wrong_shape_is_an_explanation_failure() {
        let model = demo_model();
        let explainer = TreeExplainer::new(Arc::new(model.clone()));
        let err = explainer.shap_values(&[1.0]).unwrap_err();
        assert!(matches!(err, PipelineError::Explanation(_)));
    }
}
