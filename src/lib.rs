//! `aki-form` library crate.
//!
//! The binary (`aki`) is a thin wrapper around this library so that:
//!
//! - the schema → input → inference → explanation pipeline is testable without
//!   spawning processes or a terminal
//! - the CLI and the TUI share one pipeline
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod explain;
pub mod input;
pub mod logging;
pub mod models;
pub mod render;
pub mod report;
pub mod schema;
pub mod tui;
