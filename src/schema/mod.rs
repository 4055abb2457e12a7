//! Declarative feature schema.
//!
//! The schema is the contract between the form and the model: its declaration
//! order *is* the model's input layout. It is pure data (see
//! `aki_features.json`) plus the code → label lookup used for display.

pub mod descriptor;

pub use descriptor::*;
