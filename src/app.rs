//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs logging
//! - loads the schema + model (and checks they agree)
//! - runs the form or a one-shot prediction
//! - writes artifacts and optional exports

use std::path::Path;

use clap::Parser;

use crate::app::pipeline::Pipeline;
use crate::cli::{Command, PredictArgs, RunArgs, SchemaArgs};
use crate::domain::AppConfig;
use crate::error::AppError;
use crate::input::{parse_value_object, InputVector};
use crate::logging::{LogTarget, TUI_LOG_FILE};
use crate::schema::FeatureSchema;

pub mod pipeline;

/// Entry point for the `aki` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // We want `aki` and `aki --model m.json` to behave like `aki tui ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Tui(args) => handle_tui(args),
        Command::Predict(args) => handle_predict(args),
        Command::Schema(args) => handle_schema(args),
    }
}

fn handle_tui(args: RunArgs) -> Result<(), AppError> {
    crate::logging::init(LogTarget::File(Path::new(TUI_LOG_FILE)))?;
    let config = config_from_args(&args);
    // Load before entering the alternate screen so a bad artifact or a schema
    // mismatch is reported on the normal terminal.
    let pipeline = Pipeline::load(&config)?;
    tracing::info!(model = %config.model_path.display(), "starting form");
    crate::tui::run(pipeline, config)
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    crate::logging::init(LogTarget::Stderr)?;
    let config = config_from_args(&args.run);
    let pipeline = Pipeline::load(&config)?;
    let schema = pipeline.schema();

    let vector = InputVector::from_assignments(schema, &predict_assignments(&args)?)?;

    let run = pipeline.run(vector)?;
    println!("{}", crate::report::format_run(&run, schema));

    if config.write_artifacts {
        let written = crate::render::write_artifacts(&config.out_dir, &run, schema)?;
        for path in written {
            println!("wrote {}", path.display());
        }
    }
    if let Some(path) = &config.export_json {
        crate::report::write_prediction_json(path, &run, schema, &config.model_path)?;
    }

    Ok(())
}

fn handle_schema(args: SchemaArgs) -> Result<(), AppError> {
    crate::logging::init(LogTarget::Stderr)?;
    let schema = match &args.schema {
        Some(path) => FeatureSchema::load(path)?,
        None => FeatureSchema::aki()?,
    };
    print!("{}", crate::report::format_schema(&schema));
    Ok(())
}

/// `--values` first, then `--set`, so a `--set` for the same feature wins.
fn predict_assignments(args: &PredictArgs) -> Result<Vec<(String, f64)>, AppError> {
    let mut assignments = match &args.values {
        Some(json) => parse_value_object(json)?,
        None => Vec::new(),
    };
    assignments.extend(args.set.iter().cloned());
    Ok(assignments)
}

pub fn config_from_args(args: &RunArgs) -> AppConfig {
    AppConfig {
        model_path: args.model.clone(),
        schema_path: args.schema.clone(),
        out_dir: args.out_dir.clone(),
        write_artifacts: !args.no_artifacts,
        export_json: args.export_json.clone(),
    }
}

/// Rewrite argv so `aki` defaults to `aki tui`.
///
/// Rules:
/// - `aki`                      -> `aki tui`
/// - `aki --model m.json ...`   -> `aki tui --model m.json ...`
/// - `aki --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "tui" | "predict" | "schema");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EXIT_INPUT;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_opens_the_form() {
        assert_eq!(rewrite_args(argv(&["aki"])), argv(&["aki", "tui"]));
        assert_eq!(
            rewrite_args(argv(&["aki", "--model", "m.json"])),
            argv(&["aki", "tui", "--model", "m.json"])
        );
    }

    #[test]
    fn subcommands_and_help_pass_through() {
        for args in [
            &["aki", "predict", "--set", "CRP=1"][..],
            &["aki", "schema"][..],
            &["aki", "--help"][..],
            &["aki", "-V"][..],
        ] {
            assert_eq!(rewrite_args(argv(args)), argv(args));
        }
    }

    fn predict_args(args: &[&str]) -> PredictArgs {
        let cli = crate::cli::Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Predict(args) => args,
            other => panic!("expected predict, got {other:?}"),
        }
    }

    #[test]
    fn set_overrides_values_json() {
        let schema = FeatureSchema::aki().unwrap();
        let args = predict_args(&[
            "aki",
            "predict",
            "--values",
            r#"{"CRP": 120, "Elderly": 1}"#,
            "--set",
            "CRP=30",
        ]);
        let vector =
            InputVector::from_assignments(&schema, &predict_assignments(&args).unwrap()).unwrap();
        assert_eq!(vector.as_slice()[1], 30.0);
        assert_eq!(vector.as_slice()[4], 1.0);
    }

    #[test]
    fn bad_predict_input_exits_with_input_code() {
        let schema = FeatureSchema::aki().unwrap();
        for args in [
            &["aki", "predict", "--set", "Disease type=7"][..],
            &["aki", "predict", "--set", "Creatinine=1"][..],
            &["aki", "predict", "--set", "CRP=691"][..],
        ] {
            let assignments = predict_assignments(&predict_args(args)).unwrap();
            let err: AppError = InputVector::from_assignments(&schema, &assignments)
                .unwrap_err()
                .into();
            assert_eq!(err.exit_code(), EXIT_INPUT, "{args:?}");
        }

        let args = predict_args(&["aki", "predict", "--values", "[1, 2]"]);
        assert_eq!(predict_assignments(&args).unwrap_err().exit_code(), EXIT_INPUT);
    }

    #[test]
    fn config_follows_flags() {
        let args = RunArgs {
            model: "m.json".into(),
            schema: None,
            out_dir: "out".into(),
            no_artifacts: true,
            export_json: Some("p.json".into()),
        };
        let config = config_from_args(&args);
        assert!(!config.write_artifacts);
        assert_eq!(config.out_dir, Path::new("out"));
        assert_eq!(config.export_json.as_deref(), Some(Path::new("p.json")));
    }
}
