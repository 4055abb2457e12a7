//! Domain types shared by the pipeline and its front-ends.
//!
//! This module defines:
//!
//! - the inference output (`PredictionResult`)
//! - the outcome of one Predict action (`PipelineRun`)
//! - the JSON export record (`PredictionExport`)
//! - run configuration (`AppConfig`)

pub mod types;

pub use types::*;
