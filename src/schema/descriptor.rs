//! Feature descriptors and the ordered schema that holds them.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// The built-in AKI feature table, embedded at compile time.
const AKI_FEATURES_JSON: &str = include_str!("aki_features.json");

/// What kind of value a feature takes, with its domain and default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeatureKind {
    /// Continuous value bounded to `[min, max]` (inclusive).
    Numerical { min: f64, max: f64, default: f64 },
    /// Discrete code chosen from `options`.
    ///
    /// `labels` maps codes (as decimal strings, the JSON object key form) to
    /// display strings. It may contain codes that are not selectable.
    Categorical {
        options: Vec<i64>,
        default: i64,
        #[serde(default)]
        labels: BTreeMap<String, String>,
    },
}

/// One model input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub kind: FeatureKind,
}

impl FeatureDescriptor {
    /// Default value as it appears in the model input vector.
    pub fn default_value(&self) -> f64 {
        match &self.kind {
            FeatureKind::Numerical { default, .. } => *default,
            FeatureKind::Categorical { default, .. } => *default as f64,
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, FeatureKind::Categorical { .. })
    }

    /// Display label for a categorical code, if one is mapped.
    pub fn label_for(&self, code: i64) -> Option<&str> {
        match &self.kind {
            FeatureKind::Categorical { labels, .. } => {
                labels.get(&code.to_string()).map(String::as_str)
            }
            FeatureKind::Numerical { .. } => None,
        }
    }

    /// Short human-readable domain, e.g. `0 - 570` or `{0, 1}`.
    pub fn domain_label(&self) -> String {
        match &self.kind {
            FeatureKind::Numerical { min, max, .. } => format!("{min} - {max}"),
            FeatureKind::Categorical { options, .. } => {
                let parts: Vec<String> = options.iter().map(i64::to_string).collect();
                format!("{{{}}}", parts.join(", "))
            }
        }
    }

    /// Format a vector entry for display: numbers as-is, codes with their label.
    pub fn format_value(&self, value: f64) -> String {
        match &self.kind {
            FeatureKind::Numerical { .. } => format!("{value}"),
            FeatureKind::Categorical { .. } => {
                let code = value as i64;
                match self.label_for(code) {
                    Some(label) => format!("{code} ({label})"),
                    None => code.to_string(),
                }
            }
        }
    }

    fn check(&self) -> Result<(), PipelineError> {
        match &self.kind {
            FeatureKind::Numerical { min, max, default } => {
                if !(min.is_finite() && max.is_finite() && default.is_finite()) {
                    return Err(PipelineError::Schema(format!(
                        "'{}': bounds and default must be finite",
                        self.name
                    )));
                }
                if min > max {
                    return Err(PipelineError::Schema(format!(
                        "'{}': min {min} exceeds max {max}",
                        self.name
                    )));
                }
                if default < min || default > max {
                    return Err(PipelineError::Schema(format!(
                        "'{}': default {default} outside [{min}, {max}]",
                        self.name
                    )));
                }
            }
            FeatureKind::Categorical { options, default, .. } => {
                if options.is_empty() {
                    return Err(PipelineError::Schema(format!("'{}': no options", self.name)));
                }
                if !options.contains(default) {
                    return Err(PipelineError::Schema(format!(
                        "'{}': default {default} is not one of the options",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct SchemaFile {
    features: Vec<FeatureDescriptor>,
}

/// Ordered, immutable collection of feature descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    features: Vec<FeatureDescriptor>,
}

impl FeatureSchema {
    /// Build a schema from descriptors, checking each one and name uniqueness.
    pub fn new(features: Vec<FeatureDescriptor>) -> Result<Self, PipelineError> {
        if features.is_empty() {
            return Err(PipelineError::Schema("schema declares no features".to_string()));
        }
        let mut seen = HashSet::new();
        for feature in &features {
            if !seen.insert(feature.name.as_str()) {
                return Err(PipelineError::Schema(format!(
                    "duplicate feature name '{}'",
                    feature.name
                )));
            }
            feature.check()?;
        }
        Ok(Self { features })
    }

    /// The 14-feature AKI table used by the shipped model.
    pub fn aki() -> Result<Self, PipelineError> {
        Self::from_json(AKI_FEATURES_JSON)
    }

    pub fn from_json(text: &str) -> Result<Self, PipelineError> {
        let file: SchemaFile = serde_json::from_str(text)
            .map_err(|e| PipelineError::Schema(format!("invalid schema JSON: {e}")))?;
        Self::new(file.features)
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Schema(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Descriptors in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, FeatureDescriptor> {
        self.features.iter()
    }

    pub fn features(&self) -> &[FeatureDescriptor] {
        &self.features
    }

    pub fn get(&self, index: usize) -> Option<&FeatureDescriptor> {
        self.features.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    /// Default values in declaration order.
    pub fn defaults(&self) -> Vec<f64> {
        self.features.iter().map(FeatureDescriptor::default_value).collect()
    }
}

impl<'a> IntoIterator for &'a FeatureSchema {
    type Item = &'a FeatureDescriptor;
    type IntoIter = std::slice::Iter<'a, FeatureDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}
