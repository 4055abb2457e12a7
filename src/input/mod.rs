//! Input collection and vectorization.
//!
//! Two ways to build an `InputVector`:
//!
//! - `FormState`: the interactive path. Controls are bounded by construction
//!   (numeric entry is clamped, categorical entry cycles through the options),
//!   so `collect()` does not re-validate.
//! - `InputVector::from_assignments` / `from_json_object`: the non-UI path.
//!   Every supplied value is checked against its descriptor and out-of-domain
//!   values are rejected.

use std::collections::BTreeMap;

use crate::error::PipelineError;
use crate::schema::{FeatureDescriptor, FeatureKind, FeatureSchema};

/// Feature values in schema declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct InputVector {
    values: Vec<f64>,
}

impl InputVector {
    /// Wrap raw values without any checks.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Every feature at its schema default.
    pub fn defaults(schema: &FeatureSchema) -> Self {
        Self {
            values: schema.defaults(),
        }
    }

    /// Check length and every value against the schema.
    pub fn validated(schema: &FeatureSchema, values: Vec<f64>) -> Result<Self, PipelineError> {
        if values.len() != schema.len() {
            return Err(PipelineError::InvalidInput(format!(
                "expected {} values, got {}",
                schema.len(),
                values.len()
            )));
        }
        for (descriptor, &value) in schema.iter().zip(&values) {
            validate_value(descriptor, value)?;
        }
        Ok(Self { values })
    }

    /// Start from the defaults and apply named assignments, validating each.
    ///
    /// Later assignments to the same feature win.
    pub fn from_assignments(
        schema: &FeatureSchema,
        assignments: &[(String, f64)],
    ) -> Result<Self, PipelineError> {
        let mut values = schema.defaults();
        for (name, value) in assignments {
            let index = schema
                .index_of(name)
                .ok_or_else(|| PipelineError::UnknownFeature(name.clone()))?;
            values[index] = *value;
        }
        Self::validated(schema, values)
    }

    /// Parse a JSON object of `{"feature name": value}` and apply it over the defaults.
    pub fn from_json_object(schema: &FeatureSchema, text: &str) -> Result<Self, PipelineError> {
        Self::from_assignments(schema, &parse_value_object(text)?)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.values
    }
}

/// Check one value against its descriptor's domain.
pub fn validate_value(descriptor: &FeatureDescriptor, value: f64) -> Result<(), PipelineError> {
    let reject = |reason: String| PipelineError::OutOfDomain {
        feature: descriptor.name.clone(),
        value,
        reason,
    };
    if !value.is_finite() {
        return Err(reject("value must be finite".to_string()));
    }
    match &descriptor.kind {
        FeatureKind::Numerical { min, max, .. } => {
            if value < *min || value > *max {
                return Err(reject(format!("outside [{min}, {max}]")));
            }
        }
        FeatureKind::Categorical { options, .. } => {
            let allowed = value.fract() == 0.0 && options.contains(&(value as i64));
            if !allowed {
                return Err(reject(format!("not one of {}", descriptor.domain_label())));
            }
        }
    }
    Ok(())
}

/// Parse a JSON object of `{"feature name": value}` into assignments.
pub fn parse_value_object(text: &str) -> Result<Vec<(String, f64)>, PipelineError> {
    let map: BTreeMap<String, f64> = serde_json::from_str(text).map_err(|e| {
        PipelineError::InvalidInput(format!("expected a JSON object of numbers: {e}"))
    })?;
    Ok(map.into_iter().collect())
}

/// Parse a `NAME=VALUE` command-line assignment.
pub fn parse_assignment(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing feature name in '{s}'"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid number in '{s}': {e}"))?;
    Ok((name.to_string(), value))
}

/// Step size for the numeric control of a `[min, max]` field.
///
/// Roughly 1% of the range, rounded down to a power of ten.
pub fn numeric_step(min: f64, max: f64) -> f64 {
    let span = max - min;
    if !(span.is_finite() && span > 0.0) {
        return 0.01;
    }
    10f64.powi((span.log10() - 2.0).floor() as i32)
}

/// Round `value` to the nearest multiple of `step`, keeping only the step's
/// decimal places so a 0.1 grid yields `0.4` rather than `0.4000000000000001`.
fn snap_to_step(value: f64, step: f64) -> f64 {
    let decimals = (-step.log10()).ceil().clamp(0.0, 15.0) as i32;
    let scale = 10f64.powi(decimals);
    ((value / step).round() * step * scale).round() / scale
}

/// Current value of every form control, seeded with the schema defaults.
///
/// The schema is passed into each call rather than stored, so the form holds no
/// hidden references.
#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    values: Vec<f64>,
}

impl FormState {
    pub fn new(schema: &FeatureSchema) -> Self {
        Self {
            values: schema.defaults(),
        }
    }

    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Reset every control to its default.
    pub fn reset(&mut self, schema: &FeatureSchema) {
        self.values = schema.defaults();
    }

    /// Nudge a control: numeric fields move by one step (clamped), categorical
    /// fields cycle through their options (wrapping).
    pub fn step(&mut self, schema: &FeatureSchema, index: usize, direction: i32) {
        let Some(descriptor) = schema.get(index) else {
            return;
        };
        let current = self.values[index];
        self.values[index] = match &descriptor.kind {
            FeatureKind::Numerical { min, max, .. } => {
                let step = numeric_step(*min, *max);
                let next = current + step * f64::from(direction.signum());
                snap_to_step(next, step).clamp(*min, *max)
            }
            FeatureKind::Categorical { options, .. } => {
                let pos = options
                    .iter()
                    .position(|&o| o as f64 == current)
                    .unwrap_or(0) as i64;
                let len = options.len() as i64;
                let next = (pos + i64::from(direction.signum())).rem_euclid(len);
                options[next as usize] as f64
            }
        };
    }

    /// Set a numeric control, clamping to its bounds like a bounded number input.
    ///
    /// Returns the value actually stored.
    pub fn set_numeric(
        &mut self,
        schema: &FeatureSchema,
        index: usize,
        value: f64,
    ) -> Result<f64, PipelineError> {
        let descriptor = schema
            .get(index)
            .ok_or_else(|| PipelineError::UnknownFeature(format!("#{index}")))?;
        match &descriptor.kind {
            FeatureKind::Numerical { min, max, .. } => {
                if value.is_nan() {
                    return Err(PipelineError::OutOfDomain {
                        feature: descriptor.name.clone(),
                        value,
                        reason: "not a number".to_string(),
                    });
                }
                let bound = value.clamp(*min, *max);
                self.values[index] = bound;
                Ok(bound)
            }
            FeatureKind::Categorical { .. } => self
                .select_option(schema, index, value as i64)
                .map(|code| code as f64),
        }
    }

    /// Choose a categorical option by code.
    pub fn select_option(
        &mut self,
        schema: &FeatureSchema,
        index: usize,
        code: i64,
    ) -> Result<i64, PipelineError> {
        let descriptor = schema
            .get(index)
            .ok_or_else(|| PipelineError::UnknownFeature(format!("#{index}")))?;
        validate_value(descriptor, code as f64)?;
        self.values[index] = code as f64;
        Ok(code)
    }

    /// Assemble the model input in schema order.
    pub fn collect(&self) -> InputVector {
        InputVector::from_values(self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::aki().unwrap()
    }

    #[test]
    fn form_collects_defaults_in_schema_order() {
        let schema = schema();
        let form = FormState::new(&schema);
        let vector = form.collect();
        assert_eq!(vector.len(), 14);
        assert_eq!(vector, InputVector::defaults(&schema));
        assert_eq!(vector.as_slice()[3], 0.05);
    }

    #[test]
    fn numeric_entry_is_clamped() {
        let schema = schema();
        let mut form = FormState::new(&schema);
        assert_eq!(form.set_numeric(&schema, 1, 1_000.0).unwrap(), 690.0);
        assert_eq!(form.set_numeric(&schema, 1, -3.0).unwrap(), 0.0);
        assert!(form.set_numeric(&schema, 1, f64::NAN).is_err());
    }

    #[test]
    fn numeric_step_stays_in_bounds() {
        let schema = schema();
        let mut form = FormState::new(&schema);
        // WBC: [0, 570], step 1.
        form.step(&schema, 0, 1);
        assert_eq!(form.value(0), 6.0);
        form.set_numeric(&schema, 0, 0.0).unwrap();
        form.step(&schema, 0, -1);
        assert_eq!(form.value(0), 0.0);
    }

    #[test]
    fn categorical_step_cycles_options() {
        let schema = schema();
        let mut form = FormState::new(&schema);
        form.step(&schema, 13, 1);
        assert_eq!(form.value(13), 2.0);
        form.step(&schema, 13, 1);
        form.step(&schema, 13, 1);
        assert_eq!(form.value(13), 1.0);
        form.step(&schema, 13, -1);
        assert_eq!(form.value(13), 3.0);
    }

    #[test]
    fn select_option_rejects_unlisted_code() {
        let schema = schema();
        let mut form = FormState::new(&schema);
        // Code 17 has a label (ICU) but is not a selectable option.
        assert!(form.select_option(&schema, 13, 17).is_err());
        assert_eq!(form.value(13), 1.0);
    }

    #[test]
    fn step_sizes() {
        assert_eq!(numeric_step(0.0, 570.0), 1.0);
        assert_eq!(numeric_step(0.0, 200.0), 1.0);
        assert_eq!(numeric_step(0.0, 10.0), 0.1);
        assert_eq!(numeric_step(5.0, 5.0), 0.01);
    }

    #[test]
    fn assignments_accept_bounds_exactly() {
        let schema = schema();
        let at_min = InputVector::from_assignments(&schema, &[("CRP".to_string(), 0.0)]).unwrap();
        assert_eq!(at_min.as_slice()[1], 0.0);
        let at_max = InputVector::from_assignments(&schema, &[("CRP".to_string(), 690.0)]).unwrap();
        assert_eq!(at_max.as_slice()[1], 690.0);
    }

    #[test]
    fn assignments_reject_out_of_domain() {
        let schema = schema();
        let err =
            InputVector::from_assignments(&schema, &[("CRP".to_string(), 690.5)]).unwrap_err();
        assert!(matches!(err, PipelineError::OutOfDomain { ref feature, .. } if feature == "CRP"));

        let err = InputVector::from_assignments(&schema, &[("Disease type".to_string(), 0.0)])
            .unwrap_err();
        assert!(matches!(err, PipelineError::OutOfDomain { .. }));

        let err =
            InputVector::from_assignments(&schema, &[("Elderly".to_string(), 0.5)]).unwrap_err();
        assert!(matches!(err, PipelineError::OutOfDomain { .. }));
    }

    #[test]
    fn assignments_reject_unknown_feature() {
        let schema = schema();
        let err = InputVector::from_assignments(&schema, &[("eGFR".to_string(), 1.0)]).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownFeature(_)));
    }

    #[test]
    fn validated_checks_length() {
        let schema = schema();
        let err = InputVector::validated(&schema, vec![1.0; 3]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)), "{err}");
    }

    #[test]
    fn malformed_value_json_is_an_input_error() {
        for text in ["[1, 2]", r#"{"CRP": "high"}"#, "{"] {
            let err = parse_value_object(text).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidInput(_)), "{text}: {err}");
            assert!(err.to_string().starts_with("invalid feature values"), "{err}");
        }
    }

    #[test]
    fn decimal_steps_land_on_the_grid() {
        let schema = FeatureSchema::from_json(
            r#"{"features": [
                {"name": "lactate", "type": "numerical", "min": 0.0, "max": 10.0, "default": 0.0},
                {"name": "ratio", "type": "numerical", "min": 0.0, "max": 1.0, "default": 0.3}
            ]}"#,
        )
        .unwrap();
        let mut form = FormState::new(&schema);
        for _ in 0..4 {
            form.step(&schema, 0, 1);
        }
        assert_eq!(form.value(0), 0.4);
        assert_eq!(format!("{}", form.value(0)), "0.4");

        // ratio: step 0.01 from 0.3.
        for _ in 0..7 {
            form.step(&schema, 1, 1);
        }
        assert_eq!(form.value(1), 0.37);
        form.step(&schema, 1, -1);
        assert_eq!(form.value(1), 0.36);
    }

    #[test]
    fn json_object_values() {
        let schema = schema();
        let v = InputVector::from_json_object(
            &schema,
            r#"{"WBC": 12.5, "Urinary catheterization": 1, "Disease type": 3}"#,
        )
        .unwrap();
        assert_eq!(v.as_slice()[0], 12.5);
        assert_eq!(v.as_slice()[7], 1.0);
        assert_eq!(v.as_slice()[13], 3.0);
        assert_eq!(v.as_slice()[1], 1.0);
    }

    #[test]
    fn parse_assignment_handles_names_with_spaces() {
        let (name, value) = parse_assignment("Central venous catheter (CVC)=1").unwrap();
        assert_eq!(name, "Central venous catheter (CVC)");
        assert_eq!(value, 1.0);
        assert!(parse_assignment("CRP").is_err());
        assert!(parse_assignment("CRP=abc").is_err());
    }
}
