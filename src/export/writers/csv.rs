//! CSV sink
//!
//! Rows are `Timestamp,Message`. Timestamps are ISO-8601 without an offset
//! (`2024-01-01T09:00:00`, or `2024-01-01T09:00:00.250000` when the instant has
//! a fractional second) in the configured zone. Messages are quoted when they
//! contain a comma, quote or line break.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, Timelike, Utc};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::{Result, SinkError};
use crate::retrieval::LogRecord;

use super::{RecordSink, SinkMode, TimestampZone, open_writer, validate_path};

/// Header row written in overwrite mode.
pub const HEADER: &str = "Timestamp,Message";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const TIMESTAMP_FORMAT_FRACTION: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Writer for CSV exports
pub struct CsvSink {
    /// Buffered file writer
    writer: BufWriter<File>,
    /// Path to the output file
    path: String,
    mode: SinkMode,
    zone: TimestampZone,
    header_written: bool,
    /// Number of records written
    written: u64,
}

impl CsvSink {
    /// Open a CSV sink
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `mode` - Truncate-with-header or append
    /// * `zone` - Zone timestamps are rendered in
    pub async fn open(path: &str, mode: SinkMode, zone: TimestampZone) -> Result<Self> {
        validate_path(path)?;
        let writer = open_writer(path, mode).await?;

        debug!(path, ?mode, "opened CSV sink");

        Ok(Self {
            writer,
            path: path.to_string(),
            mode,
            zone,
            header_written: false,
            written: 0,
        })
    }

    /// Render a timestamp the way it appears in the Timestamp column.
    pub fn format_timestamp(timestamp: &DateTime<Utc>, zone: TimestampZone) -> String {
        let naive = match zone {
            TimestampZone::Local => timestamp.with_timezone(&Local).naive_local(),
            TimestampZone::Utc => timestamp.naive_utc(),
        };
        Self::format_naive(&naive)
    }

    fn format_naive(naive: &NaiveDateTime) -> String {
        if naive.nanosecond() == 0 {
            naive.format(TIMESTAMP_FORMAT).to_string()
        } else {
            naive.format(TIMESTAMP_FORMAT_FRACTION).to_string()
        }
    }

    /// Escape a CSV value if necessary
    fn escape_csv_value(value: &str) -> String {
        if value.contains(',')
            || value.contains('"')
            || value.contains('\n')
            || value.contains('\r')
        {
            // Wrap in quotes and escape internal quotes by doubling them
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }

    fn render_row(&self, record: &LogRecord) -> String {
        format!(
            "{},{}\n",
            Self::format_timestamp(&record.timestamp, self.zone),
            Self::escape_csv_value(&record.message)
        )
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).await.map_err(|source| {
            SinkError::Write {
                path: self.path.clone(),
                source,
            }
            .into()
        })
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await.map_err(|source| {
            SinkError::Write {
                path: self.path.clone(),
                source,
            }
            .into()
        })
    }
}

#[async_trait]
impl RecordSink for CsvSink {
    async fn write_header(&mut self) -> Result<bool> {
        if self.header_written || self.mode == SinkMode::Append {
            return Ok(false);
        }

        self.write_bytes(format!("{HEADER}\n").as_bytes()).await?;
        self.flush().await?;
        self.header_written = true;
        debug!(path = %self.path, "wrote CSV header");
        Ok(true)
    }

    async fn write_records(&mut self, records: &[LogRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        for record in records {
            let row = self.render_row(record);
            self.write_bytes(row.as_bytes()).await?;
        }
        self.flush().await?;

        self.written += records.len() as u64;
        debug!(
            "Wrote {} records to CSV (total: {})",
            records.len(),
            self.written
        );

        Ok(records.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.flush().await?;
        debug!("Finalized CSV file: {} ({} records)", self.path, self.written);
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        Ok(metadata.len())
    }

    fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    /// Minimal RFC 4180 reader used to check what the sink wrote.
    fn parse_csv(content: &str) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            match (c, in_quotes) {
                ('"', true) if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                ('"', true) => in_quotes = false,
                ('"', false) if field.is_empty() => in_quotes = true,
                (',', false) => row.push(std::mem::take(&mut field)),
                ('\n', false) => {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                (c, _) => field.push(c),
            }
        }
        rows
    }

    fn record(millis: i64, message: &str) -> LogRecord {
        LogRecord::new(DateTime::from_timestamp_millis(millis).unwrap(), message)
    }

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_overwrite_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "query.csv");
        fs::write(&path, "stale contents\n").await.unwrap();

        let mut sink = CsvSink::open(&path, SinkMode::Overwrite, TimestampZone::Utc)
            .await
            .unwrap();
        assert!(sink.write_header().await.unwrap());
        assert!(!sink.write_header().await.unwrap());
        sink.write_records(&[record(1_704_067_200_000, "one")]).await.unwrap();
        sink.finalize().await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "Timestamp,Message\n2024-01-01T00:00:00,one\n");
    }

    #[tokio::test]
    async fn test_append_never_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "scan.csv");
        fs::write(&path, "2023-12-31T23:59:59,earlier\n").await.unwrap();

        let mut sink = CsvSink::open(&path, SinkMode::Append, TimestampZone::Utc)
            .await
            .unwrap();
        assert!(!sink.write_header().await.unwrap());
        sink.write_records(&[record(1_704_067_200_250, "later")]).await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(
            content,
            "2023-12-31T23:59:59,earlier\n2024-01-01T00:00:00.250000,later\n"
        );
        assert!(!content.contains(HEADER));
    }

    #[tokio::test]
    async fn test_records_are_flushed_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "flush.csv");

        let mut sink = CsvSink::open(&path, SinkMode::Append, TimestampZone::Utc)
            .await
            .unwrap();
        sink.write_records(&[record(0, "a"), record(1, "b")]).await.unwrap();

        // Visible on disk before finalize.
        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(sink.file_size().await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_round_trip_with_special_characters() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "roundtrip.csv");
        let records = vec![
            record(1_704_067_200_000, "plain"),
            record(1_704_067_200_001, "Hello, world!"),
            record(1_704_067_200_999, "Quote: \"test\""),
            record(1_704_067_201_000, "Newline\ntest\r\nend"),
            record(1_704_067_202_000, ""),
        ];

        let mut sink = CsvSink::open(&path, SinkMode::Overwrite, TimestampZone::Utc)
            .await
            .unwrap();
        sink.write_header().await.unwrap();
        sink.write_records(&records).await.unwrap();
        sink.finalize().await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        let rows = parse_csv(&content);
        assert_eq!(rows[0], vec!["Timestamp", "Message"]);

        let decoded: Vec<LogRecord> = rows[1..]
            .iter()
            .map(|row| {
                let naive = NaiveDateTime::parse_from_str(&row[0], "%Y-%m-%dT%H:%M:%S%.f").unwrap();
                LogRecord::new(naive.and_utc(), row[1].clone())
            })
            .collect();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_csv_escape_value() {
        assert_eq!(CsvSink::escape_csv_value("simple"), "simple");
        assert_eq!(CsvSink::escape_csv_value("with,comma"), "\"with,comma\"");
        assert_eq!(CsvSink::escape_csv_value("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(CsvSink::escape_csv_value("with\nnewline"), "\"with\nnewline\"");
    }

    #[test]
    fn test_format_timestamp() {
        let ts = DateTime::from_timestamp_millis(1_704_067_200_000).unwrap();
        assert_eq!(
            CsvSink::format_timestamp(&ts, TimestampZone::Utc),
            "2024-01-01T00:00:00"
        );
        let ts = DateTime::from_timestamp_millis(1_704_067_200_042).unwrap();
        assert_eq!(
            CsvSink::format_timestamp(&ts, TimestampZone::Utc),
            "2024-01-01T00:00:00.042000"
        );
        let local = CsvSink::format_timestamp(&ts, TimestampZone::Local);
        assert_eq!(local.len(), "2024-01-01T00:00:00.042000".len());
    }

    #[tokio::test]
    async fn test_open_fails_for_missing_directory() {
        let result = CsvSink::open(
            "/definitely/not/here/out.csv",
            SinkMode::Overwrite,
            TimestampZone::Utc,
        )
        .await;
        assert!(result.is_err());
    }
}
