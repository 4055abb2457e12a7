//! Gradient-boosted tree ensemble loaded from a JSON dump.
//!
//! Artifact layout (one object):
//!
//! - `objective`: `binary:logistic` or `multi:softprob`
//! - `num_class`: number of output classes (2 for binary)
//! - `base_score`: global bias (probability for binary, margin for multiclass)
//! - `num_feature` / `feature_names`: training-time input layout
//! - `trees`: list of `{ class_id, nodes }`, node 0 being the root
//!
//! Splits follow the XGBoost convention: `x < threshold` goes left, NaN follows
//! `missing_left`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::models::Classifier;

/// Training objective, which fixes how margins become probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    #[serde(rename = "binary:logistic")]
    BinaryLogistic,
    #[serde(rename = "multi:softprob")]
    MultiSoftprob,
}

impl Objective {
    pub fn transform(self) -> OutputTransform {
        match self {
            Objective::BinaryLogistic => OutputTransform::Sigmoid,
            Objective::MultiSoftprob => OutputTransform::Softmax,
        }
    }
}

/// Map from per-class margins to per-class probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputTransform {
    /// Element-wise logistic. Binary margins are stored as `[-m, m]`, so this
    /// yields `[1 - p, p]`.
    Sigmoid,
    Softmax,
}

impl OutputTransform {
    pub fn apply(self, margins: &[f64]) -> Vec<f64> {
        match self {
            OutputTransform::Sigmoid => margins.iter().map(|&m| sigmoid(m)).collect(),
            OutputTransform::Softmax => softmax(margins),
        }
    }
}

pub fn sigmoid(m: f64) -> f64 {
    1.0 / (1.0 + (-m).exp())
}

fn softmax(margins: &[f64]) -> Vec<f64> {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|&m| (m - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

fn default_missing_left() -> bool {
    true
}

/// A tree node. `cover` is the (hessian-weighted) training mass reaching it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default = "default_missing_left")]
        missing_left: bool,
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

/// One regression tree contributing to a single class margin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    #[serde(default)]
    pub class_id: usize,
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Index of the child `x` falls into at split node `index`, or `None` at a leaf.
    pub fn next_node(&self, index: usize, x: &[f64]) -> Option<usize> {
        match &self.nodes[index] {
            Node::Split {
                feature,
                threshold,
                left,
                right,
                missing_left,
                ..
            } => {
                let v = x[*feature];
                let go_left = if v.is_nan() { *missing_left } else { v < *threshold };
                Some(if go_left { *left } else { *right })
            }
            Node::Leaf { .. } => None,
        }
    }

    /// Leaf value reached by `x`.
    pub fn leaf_value(&self, x: &[f64]) -> f64 {
        let mut index = 0;
        while let Some(next) = self.next_node(index, x) {
            index = next;
        }
        match &self.nodes[index] {
            Node::Leaf { value, .. } => *value,
            Node::Split { .. } => unreachable!("traversal stops at leaves"),
        }
    }

    /// Cover-weighted mean leaf value: the tree's output with no feature known.
    pub fn expected_value(&self) -> f64 {
        self.expected_from(0)
    }

    fn expected_from(&self, index: usize) -> f64 {
        match &self.nodes[index] {
            Node::Leaf { value, .. } => *value,
            Node::Split { left, right, cover, .. } => {
                let l = &self.nodes[*left];
                let r = &self.nodes[*right];
                (l.cover() * self.expected_from(*left) + r.cover() * self.expected_from(*right))
                    / cover
            }
        }
    }

    fn validate(&self, tree_index: usize, num_feature: usize) -> Result<(), PipelineError> {
        let bad = |msg: String| PipelineError::ModelLoad(format!("tree {tree_index}: {msg}"));
        if self.nodes.is_empty() {
            return Err(bad("no nodes".to_string()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if !(node.cover().is_finite() && node.cover() > 0.0) {
                return Err(bad(format!("node {i} has non-positive cover")));
            }
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= num_feature {
                        return Err(bad(format!(
                            "node {i} splits on feature {feature}, model has {num_feature}"
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(bad(format!("node {i} has a NaN threshold")));
                    }
                    // Children must come after their parent; this also rules out cycles.
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(bad(format!("node {i} has invalid child {child}")));
                        }
                    }
                }
                Node::Leaf { value, .. } => {
                    if !value.is_finite() {
                        return Err(bad(format!("node {i} has a non-finite leaf value")));
                    }
                }
            }
        }
        Ok(())
    }
}

/// A loaded tree-ensemble classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub objective: Objective,
    pub num_class: usize,
    pub base_score: f64,
    pub num_feature: usize,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ModelLoad(format!("failed to read '{}': {e}", path.display()))
        })?;
        let model = Self::from_json(&text)?;
        tracing::info!(
            path = %path.display(),
            trees = model.trees.len(),
            classes = model.num_class,
            features = model.num_feature,
            "loaded model artifact"
        );
        Ok(model)
    }

    pub fn from_json(text: &str) -> Result<Self, PipelineError> {
        let model: TreeEnsemble = serde_json::from_str(text)
            .map_err(|e| PipelineError::ModelLoad(format!("invalid model JSON: {e}")))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.num_class < 2 {
            return Err(PipelineError::ModelLoad(format!(
                "num_class must be at least 2, got {}",
                self.num_class
            )));
        }
        if self.objective == Objective::BinaryLogistic && self.num_class != 2 {
            return Err(PipelineError::ModelLoad(
                "binary:logistic requires num_class = 2".to_string(),
            ));
        }
        if self.objective == Objective::BinaryLogistic
            && !(self.base_score > 0.0 && self.base_score < 1.0)
        {
            return Err(PipelineError::ModelLoad(format!(
                "binary base_score must be in (0, 1), got {}",
                self.base_score
            )));
        }
        if !self.base_score.is_finite() {
            return Err(PipelineError::ModelLoad("base_score must be finite".to_string()));
        }
        if let Some(names) = &self.feature_names {
            if names.len() != self.num_feature {
                return Err(PipelineError::ModelLoad(format!(
                    "{} feature names for num_feature = {}",
                    names.len(),
                    self.num_feature
                )));
            }
        }
        // Binary models have a single margin, so all trees belong to class 0.
        let margin_count = self.margin_count();
        for (i, tree) in self.trees.iter().enumerate() {
            if tree.class_id >= margin_count {
                return Err(PipelineError::ModelLoad(format!(
                    "tree {i} targets class {}, model has {margin_count} margin(s)",
                    tree.class_id
                )));
            }
            tree.validate(i, self.num_feature)?;
        }
        Ok(())
    }

    /// Number of raw margins the trees produce (1 for binary logistic).
    pub fn margin_count(&self) -> usize {
        match self.objective {
            Objective::BinaryLogistic => 1,
            Objective::MultiSoftprob => self.num_class,
        }
    }

    /// Bias added to every raw margin.
    pub fn base_margin(&self) -> f64 {
        match self.objective {
            Objective::BinaryLogistic => (self.base_score / (1.0 - self.base_score)).ln(),
            Objective::MultiSoftprob => self.base_score,
        }
    }

    pub fn transform(&self) -> OutputTransform {
        self.objective.transform()
    }

    /// Expand raw margins into one margin per class.
    ///
    /// For binary logistic the single margin `m` becomes `[-m, m]`, so class 0 and
    /// class 1 are explained symmetrically.
    pub fn class_margins_from_raw(&self, raw: &[f64]) -> Vec<f64> {
        match self.objective {
            Objective::BinaryLogistic => vec![-raw[0], raw[0]],
            Objective::MultiSoftprob => raw.to_vec(),
        }
    }

    /// Per-class margins for one row.
    pub fn class_margins(&self, x: &[f64]) -> Result<Vec<f64>, PipelineError> {
        self.check_shape(x)?;
        let mut raw = vec![self.base_margin(); self.margin_count()];
        for tree in &self.trees {
            raw[tree.class_id] += tree.leaf_value(x);
        }
        Ok(self.class_margins_from_raw(&raw))
    }

    pub fn check_shape(&self, x: &[f64]) -> Result<(), PipelineError> {
        if x.len() != self.num_feature {
            return Err(PipelineError::ModelInvocation(format!(
                "expected {} features, got {}",
                self.num_feature,
                x.len()
            )));
        }
        Ok(())
    }
}

impl Classifier for TreeEnsemble {
    fn n_features(&self) -> usize {
        self.num_feature
    }

    fn n_classes(&self) -> usize {
        self.num_class
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict(&self, x: &[f64]) -> Result<usize, PipelineError> {
        let proba = self.predict_proba(x)?;
        let class = match self.objective {
            // XGBClassifier thresholds the positive-class probability at 0.5.
            Objective::BinaryLogistic => usize::from(proba[1] > 0.5),
            Objective::MultiSoftprob => proba
                .iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (i, &p)| {
                    if p > best.1 { (i, p) } else { best }
                })
                .0,
        };
        Ok(class)
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, PipelineError> {
        let margins = self.class_margins(x)?;
        let proba = self.transform().apply(&margins);
        if proba.iter().any(|p| !p.is_finite()) {
            return Err(PipelineError::ModelInvocation(
                "non-finite probability".to_string(),
            ));
        }
        Ok(proba)
    }

    fn expected_values(&self) -> Vec<f64> {
        let mut raw = vec![self.base_margin(); self.margin_count()];
        for tree in &self.trees {
            raw[tree.class_id] += tree.expected_value();
        }
        self.class_margins_from_raw(&raw)
    }
}
