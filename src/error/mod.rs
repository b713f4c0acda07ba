//! Error handling for export runs.
//!
//! Errors are grouped by the part of the pipeline that raised them:
//! - `RequestError`: window validation and query submit/poll calls
//! - `PageFetchError`: scan pagination failures
//! - `NormalizationError`: raw records that cannot be decoded
//! - `SinkError`: output file failures
//!
//! All of them convert into [`ExportError`], which the driver surfaces to
//! `main` unchanged.

pub mod kinds;

// Re-export commonly used types
pub use kinds::{
    ConfigError, ExportError, NormalizationError, PageFetchError, RequestError, Result, SinkError,
    Stage,
};
