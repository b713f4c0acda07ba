//! Typed decoding of raw service records into [`LogRecord`]s.
//!
//! Every accessor here fails closed with a [`NormalizationError`]; nothing
//! indexes into a raw payload without checking it first.

use chrono::{DateTime, NaiveDateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{QueryRow, RawEvent};
use crate::error::{NormalizationError, Result};

use super::{LogRecord, TimeWindow};

/// Format CloudWatch Insights uses for `@timestamp` values.
const INSIGHTS_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// What to do with a record that cannot be normalized.
///
/// The same policy applies to both retrieval modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MalformedRecordPolicy {
    /// Fail the run on the first malformed record.
    Abort,
    /// Drop the record, log a warning and continue.
    Skip,
}

/// Outcome of normalizing one batch.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizedBatch {
    pub records: Vec<LogRecord>,
    pub skipped: u64,
}

impl NormalizedBatch {
    /// Drop records outside `[start, end)`, returning how many were dropped.
    pub fn retain_within(&mut self, window: &TimeWindow) -> usize {
        let before = self.records.len();
        self.records.retain(|r| window.contains(r.timestamp));
        let dropped = before - self.records.len();
        if dropped > 0 {
            debug!(dropped, "dropped records outside the export window");
        }
        dropped
    }
}

/// Normalize `raw` in order, applying `policy` to failures.
pub fn normalize_batch<T, F>(
    raw: &[T],
    policy: MalformedRecordPolicy,
    convert: F,
) -> Result<NormalizedBatch>
where
    F: Fn(&T) -> std::result::Result<LogRecord, NormalizationError>,
{
    let mut batch = NormalizedBatch {
        records: Vec::with_capacity(raw.len()),
        skipped: 0,
    };

    for (index, item) in raw.iter().enumerate() {
        match convert(item) {
            Ok(record) => batch.records.push(record),
            Err(e) => match policy {
                MalformedRecordPolicy::Abort => return Err(e.into()),
                MalformedRecordPolicy::Skip => {
                    warn!(index, error = %e, "skipping malformed record");
                    batch.skipped += 1;
                }
            },
        }
    }

    Ok(batch)
}

/// Field 0 is the timestamp, field 1 the message.
pub fn query_row_to_record(row: &QueryRow) -> std::result::Result<LogRecord, NormalizationError> {
    let timestamp = row
        .first()
        .and_then(|f| f.value.as_deref())
        .ok_or_else(|| NormalizationError::MissingField("0 (timestamp)".to_string()))?;
    let message = row
        .get(1)
        .and_then(|f| f.value.as_deref())
        .ok_or_else(|| NormalizationError::MissingField("1 (message)".to_string()))?;

    Ok(LogRecord::new(parse_query_timestamp(timestamp)?, message))
}

/// Accepts epoch milliseconds, or the `YYYY-MM-DD HH:MM:SS.fff` UTC form the
/// Insights engine renders `@timestamp` in.
pub fn parse_query_timestamp(
    value: &str,
) -> std::result::Result<DateTime<Utc>, NormalizationError> {
    let trimmed = value.trim();

    if let Ok(millis) = trimmed.parse::<i64>() {
        return millis_to_datetime(millis);
    }

    NaiveDateTime::parse_from_str(trimmed, INSIGHTS_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| NormalizationError::InvalidTimestamp(value.to_string()))
}

fn millis_to_datetime(millis: i64) -> std::result::Result<DateTime<Utc>, NormalizationError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| NormalizationError::InvalidTimestamp(millis.to_string()))
}

/// Decode a scan event whose message is a JSON envelope.
///
/// `message_field` is a dot-separated path into the envelope. String values
/// are taken verbatim; any other non-null JSON value is re-serialized.
pub fn scan_event_to_record(
    event: &RawEvent,
    message_field: &str,
) -> std::result::Result<LogRecord, NormalizationError> {
    let millis = event
        .timestamp
        .ok_or_else(|| NormalizationError::MissingField("timestamp".to_string()))?;
    let timestamp = millis_to_datetime(millis)?;

    let payload = event
        .message
        .as_deref()
        .ok_or_else(|| NormalizationError::MissingField("message".to_string()))?;

    let envelope: Value = serde_json::from_str(payload)
        .map_err(|e| NormalizationError::MalformedEnvelope(e.to_string()))?;
    if !envelope.is_object() {
        return Err(NormalizationError::MalformedEnvelope(
            "expected a JSON object".to_string(),
        ));
    }

    let text = match lookup_path(&envelope, message_field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => {
            return Err(NormalizationError::MissingMessageField(
                message_field.to_string(),
            ));
        }
        Some(other) => other.to_string(),
    };

    Ok(LogRecord::new(timestamp, text))
}

fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ResultField;

    fn event(timestamp: i64, message: &str) -> RawEvent {
        RawEvent {
            timestamp: Some(timestamp),
            message: Some(message.to_string()),
        }
    }

    #[test]
    fn test_query_row_with_millis() {
        let row = vec![
            ResultField::new("@timestamp", "1704067200123"),
            ResultField::new("@message", "hello"),
        ];
        let record = query_row_to_record(&row).unwrap();
        assert_eq!(record.timestamp.timestamp_millis(), 1_704_067_200_123);
        assert_eq!(record.message, "hello");
    }

    #[test]
    fn test_query_row_with_insights_timestamp() {
        let row = vec![
            ResultField::new("@timestamp", "2024-01-01 00:00:00.250"),
            ResultField::new("@message", "hello"),
        ];
        let record = query_row_to_record(&row).unwrap();
        assert_eq!(record.timestamp.timestamp_millis(), 1_704_067_200_250);
    }

    #[test]
    fn test_query_row_missing_fields() {
        let row = vec![ResultField::new("@timestamp", "1704067200000")];
        assert_eq!(
            query_row_to_record(&row),
            Err(NormalizationError::MissingField("1 (message)".to_string()))
        );
        assert!(matches!(
            query_row_to_record(&vec![]),
            Err(NormalizationError::MissingField(_))
        ));
    }

    #[test]
    fn test_query_row_bad_timestamp() {
        let row = vec![
            ResultField::new("@timestamp", "not-a-time"),
            ResultField::new("@message", "hello"),
        ];
        assert_eq!(
            query_row_to_record(&row),
            Err(NormalizationError::InvalidTimestamp("not-a-time".to_string()))
        );
    }

    #[test]
    fn test_scan_event_extracts_field() {
        let record = scan_event_to_record(
            &event(1_704_067_200_000, r#"{"message":"boot ok","level":"info"}"#),
            "message",
        )
        .unwrap();
        assert_eq!(record.message, "boot ok");
        assert_eq!(record.timestamp.timestamp_millis(), 1_704_067_200_000);
    }

    #[test]
    fn test_scan_event_nested_path_and_non_string() {
        let raw = event(1, r#"{"log":{"msg":"nested","code":42}}"#);
        assert_eq!(scan_event_to_record(&raw, "log.msg").unwrap().message, "nested");
        assert_eq!(scan_event_to_record(&raw, "log.code").unwrap().message, "42");
    }

    #[test]
    fn test_scan_event_rejections() {
        assert!(matches!(
            scan_event_to_record(&event(1, "plain text line"), "message"),
            Err(NormalizationError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            scan_event_to_record(&event(1, "[1,2]"), "message"),
            Err(NormalizationError::MalformedEnvelope(_))
        ));
        assert_eq!(
            scan_event_to_record(&event(1, r#"{"msg":"x"}"#), "message"),
            Err(NormalizationError::MissingMessageField("message".to_string()))
        );
        assert_eq!(
            scan_event_to_record(&event(1, r#"{"message":null}"#), "message"),
            Err(NormalizationError::MissingMessageField("message".to_string()))
        );

        let no_timestamp = RawEvent {
            message: Some("{}".to_string()),
            ..Default::default()
        };
        assert_eq!(
            scan_event_to_record(&no_timestamp, "message"),
            Err(NormalizationError::MissingField("timestamp".to_string()))
        );
    }

    #[test]
    fn test_normalize_batch_policies() {
        let raw = vec![
            event(1, r#"{"message":"a"}"#),
            event(2, "garbage"),
            event(3, r#"{"message":"c"}"#),
        ];
        let convert = |e: &RawEvent| scan_event_to_record(e, "message");

        assert!(normalize_batch(&raw, MalformedRecordPolicy::Abort, convert).is_err());

        let batch = normalize_batch(&raw, MalformedRecordPolicy::Skip, convert).unwrap();
        assert_eq!(batch.skipped, 1);
        let messages: Vec<_> = batch.records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "c"]);
    }
}
