//! Reporting utilities: terminal text and JSON export.

pub mod export;
pub mod format;

pub use export::*;
pub use format::*;
