//! Command-line parsing for the AKI risk form.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the pipeline code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::input::parse_assignment;

/// Default location of the model artifact, relative to the working directory.
pub const DEFAULT_MODEL_PATH: &str = "assets/aki_xgboost.json";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "aki",
    version,
    about = "Acute kidney injury risk form: tree-ensemble prediction with SHAP explanation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Launch the interactive form (the default when no subcommand is given).
    Tui(RunArgs),
    /// Predict once from command-line values and print the explanation.
    ///
    /// Features not given keep their schema default. Every given value is
    /// checked against its feature's domain.
    Predict(PredictArgs),
    /// Print the feature schema (order, domains, defaults, labels).
    Schema(SchemaArgs),
}

/// Model/schema/output options shared by every prediction front-end.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Tree-ensemble JSON artifact.
    #[arg(long, env = "AKI_MODEL", default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,

    /// Alternative feature schema JSON (defaults to the built-in AKI table).
    #[arg(long, value_name = "JSON")]
    pub schema: Option<PathBuf>,

    /// Directory receiving prediction_text.png and shap_force_plot.png.
    #[arg(long, env = "AKI_OUT_DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Do not write the PNG artifacts.
    #[arg(long)]
    pub no_artifacts: bool,

    /// Also write the prediction and explanation to a JSON file.
    #[arg(long = "export-json", value_name = "PATH")]
    pub export_json: Option<PathBuf>,
}

/// Options for a one-shot prediction.
#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Set one feature, e.g. `--set CRP=120` or `--set "Disease type=2"`.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, f64)>,

    /// JSON object of feature values, e.g. `{"CRP": 120, "Elderly": 1}`.
    ///
    /// Applied before `--set`.
    #[arg(long, value_name = "JSON")]
    pub values: Option<String>,
}

/// Options for printing the schema.
#[derive(Debug, Args, Clone)]
pub struct SchemaArgs {
    /// Alternative feature schema JSON (defaults to the built-in AKI table).
    #[arg(long, value_name = "JSON")]
    pub schema: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_collects_repeated_assignments() {
        let cli = Cli::try_parse_from([
            "aki",
            "predict",
            "--set",
            "CRP=120",
            "--set",
            "Disease type=2",
            "--no-artifacts",
        ])
        .unwrap();
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(
            args.set,
            vec![("CRP".to_string(), 120.0), ("Disease type".to_string(), 2.0)]
        );
        assert!(args.run.no_artifacts);
    }

    #[test]
    fn malformed_assignment_is_a_usage_error() {
        assert!(Cli::try_parse_from(["aki", "predict", "--set", "CRP"]).is_err());
        assert!(Cli::try_parse_from(["aki", "predict", "--set", "CRP=high"]).is_err());
    }

    #[test]
    fn schema_subcommand_takes_optional_path() {
        let cli = Cli::try_parse_from(["aki", "schema", "--schema", "s.json"]).unwrap();
        let Command::Schema(args) = cli.command else {
            panic!("expected schema");
        };
        assert_eq!(args.schema, Some(PathBuf::from("s.json")));
    }
}
