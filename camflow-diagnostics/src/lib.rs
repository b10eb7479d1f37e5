//! # camflow diagnostics
//!
//! Logging setup and human-readable failure reports for camflow.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod acquisition_report;
pub mod debug_logger;

// Re-export main types
pub use acquisition_report::{hint_for, user_message, AcquisitionReport, AttemptRecord};
pub use debug_logger::DebugLogger;
