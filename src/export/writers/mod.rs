//! Record sinks for export operations
//!
//! A sink owns the output file for the duration of a run. Dropping it closes
//! the file on every exit path; records handed to
//! [`RecordSink::write_records`] are flushed before the call returns.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::BufWriter;

use crate::error::{Result, SinkError};
use crate::retrieval::LogRecord;

pub mod csv;

pub use csv::CsvSink;

/// How an existing target file is treated on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    /// Truncate and start with a header row (query mode).
    Overwrite,
    /// Append rows, never a header (scan mode).
    Append,
}

/// Zone timestamps are rendered in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimestampZone {
    Local,
    Utc,
}

/// Trait for writing normalized records to an output file
#[async_trait]
pub trait RecordSink: Send {
    /// Write the header row.
    ///
    /// At most once per handle, and only in [`SinkMode::Overwrite`].
    ///
    /// # Returns
    /// * `Result<bool>` - Whether a header was written by this call
    async fn write_header(&mut self) -> Result<bool>;

    /// Append records in the given order and flush them.
    ///
    /// # Returns
    /// * `Result<usize>` - Number of records written
    async fn write_records(&mut self, records: &[LogRecord]) -> Result<usize>;

    /// Flush any remaining buffered output.
    async fn finalize(&mut self) -> Result<()>;

    /// Get the current file size in bytes
    async fn file_size(&self) -> Result<u64>;

    /// Destination path.
    fn path(&self) -> &str;
}

/// Open `path` for writing according to `mode`.
pub(crate) async fn open_writer(path: &str, mode: SinkMode) -> Result<BufWriter<File>> {
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        SinkMode::Overwrite => options.write(true).truncate(true),
        SinkMode::Append => options.append(true),
    };

    let file = options.open(path).await.map_err(|source| SinkError::Open {
        path: path.to_string(),
        source,
    })?;
    Ok(BufWriter::with_capacity(64 * 1024, file))
}

/// Check that the parent directory of `path` exists.
pub(crate) fn validate_path(path: &str) -> Result<()> {
    let path_obj = Path::new(path);

    if let Some(parent) = path_obj.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(SinkError::MissingDirectory(parent.display().to_string()).into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("output.csv").is_ok());
        assert!(validate_path("/definitely/not/here/output.csv").is_err());
    }
}
