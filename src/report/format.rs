//! Formatted terminal output for predictions, explanations and the schema.
//!
//! We keep formatting code in one place so:
//! - the pipeline stays free of presentation concerns
//! - every front-end prints the same prediction sentence

use crate::domain::{PipelineRun, PredictionResult};
use crate::explain::ExplanationResult;
use crate::schema::{FeatureKind, FeatureSchema};

/// The one-line prediction summary shown after every Predict action.
pub fn format_prediction_line(prediction: &PredictionResult) -> String {
    format!(
        "Based on feature values, predicted possibility of AKI is {:.2}%",
        prediction.percent()
    )
}

/// Prediction line followed by the attribution table, or the explanation error.
pub fn format_run(run: &PipelineRun, schema: &FeatureSchema) -> String {
    let mut out = String::new();
    out.push_str(&format_prediction_line(&run.prediction));
    out.push_str("\n\n");
    match &run.explanation {
        Ok(explanation) => out.push_str(&format_explanation(explanation, schema)),
        Err(err) => out.push_str(&format!("Explanation unavailable: {err}\n")),
    }
    out
}

/// Attribution table, largest absolute contribution first.
pub fn format_explanation(explanation: &ExplanationResult, schema: &FeatureSchema) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "SHAP attributions for class {} (margin space)\n",
        explanation.class_id
    ));
    out.push_str(&format!("base value: {:+.4}\n", explanation.base_value));

    push_row(&mut out, format!("{:<34} {:>16} {:>10}", "feature", "value", "shap"));
    push_row(&mut out, format!("{:-<34} {:-<16} {:-<10}", "", "", ""));

    for a in explanation.ranked() {
        let value = match schema.index_of(&a.name).and_then(|i| schema.get(i)) {
            Some(descriptor) => descriptor.format_value(a.value),
            None => format!("{}", a.value),
        };
        let name = truncate(&a.name, 34);
        let value = truncate(&value, 16);
        push_row(&mut out, format!("{name:<34} {value:>16} {:>+10.4}", a.shap));
    }

    out.push_str(&format!("output value: {:+.4}\n", explanation.output_value()));
    out
}

/// Schema table: order, name, kind, domain, default and labels.
pub fn format_schema(schema: &FeatureSchema) -> String {
    let mut out = String::new();
    push_row(
        &mut out,
        format!("{:>3} {:<34} {:<12} {:<12} {:>8}", "#", "name", "kind", "domain", "default"),
    );
    push_row(&mut out, format!("{:->3} {:-<34} {:-<12} {:-<12} {:->8}", "", "", "", "", ""));

    for (i, d) in schema.iter().enumerate() {
        let kind = if d.is_categorical() { "categorical" } else { "numerical" };
        let name = truncate(&d.name, 34);
        let (domain, default) = (d.domain_label(), d.default_value());
        push_row(&mut out, format!("{i:>3} {name:<34} {kind:<12} {domain:<12} {default:>8}"));

        if let FeatureKind::Categorical { options, .. } = &d.kind {
            let labels: Vec<String> = options
                .iter()
                .filter_map(|&code| d.label_for(code).map(|label| format!("{code}={label}")))
                .collect();
            if !labels.is_empty() {
                out.push_str(&format!("    {}\n", labels.join(", ")));
            }
        }
    }

    out
}

/// Append one table row without its trailing padding.
fn push_row(out: &mut String, row: String) {
    out.push_str(row.trim_end());
    out.push('\n');
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::explain::FeatureAttribution;
    use crate::input::InputVector;
    use crate::models::OutputTransform;

    fn prediction(probability: f64) -> PredictionResult {
        PredictionResult {
            class_id: 0,
            probability,
            probabilities: vec![probability, 1.0 - probability],
        }
    }

    fn explanation() -> ExplanationResult {
        ExplanationResult {
            class_id: 1,
            base_value: -0.005,
            attributions: vec![
                FeatureAttribution {
                    name: "CRP".to_string(),
                    value: 1.0,
                    shap: -0.21,
                },
                FeatureAttribution {
                    name: "Urinary catheterization".to_string(),
                    value: 0.0,
                    shap: -0.25,
                },
            ],
            class_margins: vec![0.465, -0.465],
            transform: OutputTransform::Softmax,
        }
    }

    #[test]
    fn prediction_line_is_verbatim() {
        assert_eq!(
            format_prediction_line(&prediction(0.710_949_502_625_004)),
            "Based on feature values, predicted possibility of AKI is 71.09%"
        );
        assert_eq!(
            format_prediction_line(&prediction(1.0)),
            "Based on feature values, predicted possibility of AKI is 100.00%"
        );
    }

    #[test]
    fn explanation_is_ranked_and_labelled() {
        let schema = FeatureSchema::aki().unwrap();
        let text = format_explanation(&explanation(), &schema);
        let catheter = text.find("Urinary catheterization").unwrap();
        let crp = text.find("CRP").unwrap();
        assert!(catheter < crp, "{text}");
        assert!(text.contains("0 (否)"), "{text}");
        assert!(text.contains("-0.2100"));
        assert!(text.contains("output value: -0.4650"));
    }

    #[test]
    fn run_without_explanation_reports_error() {
        let schema = FeatureSchema::aki().unwrap();
        let run = PipelineRun {
            vector: InputVector::defaults(&schema),
            prediction: prediction(0.25),
            explanation: Err(PipelineError::Explanation("non-finite attribution".to_string())),
        };
        let text = format_run(&run, &schema);
        assert!(
            text.starts_with("Based on feature values, predicted possibility of AKI is 25.00%")
        );
        assert!(
            text.contains("Explanation unavailable: explanation failed: non-finite attribution")
        );
    }

    #[test]
    fn schema_table_lists_every_feature_in_order() {
        let schema = FeatureSchema::aki().unwrap();
        let text = format_schema(&schema);
        let wbc = text.find("WBC").unwrap();
        let disease = text.find("Disease type").unwrap();
        assert!(wbc < disease);
        assert!(text.contains("0 - 570"));
        assert!(text.contains("{1, 2, 3}"));
        assert!(text.contains("0=否, 1=是"));
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("Central venous catheter (CVC)", 10), "Central v.");
        assert_eq!(truncate("WBC", 10), "WBC");
    }
}
