//! Data model shared by the retrievers, the sink and the driver.

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RequestError, Result};

/// Input format accepted for window bounds on the command line.
pub const WINDOW_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Unit in which a retriever sends window bounds to the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeResolution {
    Seconds,
    Milliseconds,
}

/// Half-open export window `[start, end)`.
///
/// Construction enforces `start <= end`; the value is immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window, rejecting `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(RequestError::InvalidWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            }
            .into());
        }
        Ok(Self { start, end })
    }

    /// Parse both bounds as local wall-clock time in [`WINDOW_INPUT_FORMAT`].
    pub fn parse_local(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_local_timestamp(start)?, parse_local_timestamp(end)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `ts` falls inside `[start, end)`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    /// Window bounds as epoch values in the requested unit.
    ///
    /// The service treats the end bound as inclusive, so retrievers drop
    /// records at or after `end` with [`TimeWindow::contains`].
    pub fn bounds(&self, resolution: TimeResolution) -> (i64, i64) {
        match resolution {
            TimeResolution::Seconds => (self.start.timestamp(), self.end.timestamp()),
            TimeResolution::Milliseconds => {
                (self.start.timestamp_millis(), self.end.timestamp_millis())
            }
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.to_rfc3339(),
            self.end.to_rfc3339()
        )
    }
}

/// Parse a local `YYYY-MM-DDTHH:MM:SS` timestamp.
///
/// Wall-clock times that occur twice (DST fall-back) resolve to the earlier
/// instant; times skipped by a DST jump are rejected.
pub fn parse_local_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, WINDOW_INPUT_FORMAT).map_err(|e| {
        RequestError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            RequestError::InvalidTimestamp {
                value: value.to_string(),
                reason: "time does not exist in the local timezone".to_string(),
            }
            .into()
        })
}

/// A single query submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub log_group: String,
    pub window: TimeWindow,
    /// `None` leaves the cap to the service.
    pub limit: Option<u32>,
}

/// Status of an asynchronous query job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Scheduled,
    Running,
    Complete,
    Failed,
    Cancelled,
    Timeout,
    Unknown,
}

impl QueryStatus {
    /// No further transition occurs from a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueryStatus::Complete
                | QueryStatus::Failed
                | QueryStatus::Cancelled
                | QueryStatus::Timeout
        )
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryStatus::Scheduled => "Scheduled",
            QueryStatus::Running => "Running",
            QueryStatus::Complete => "Complete",
            QueryStatus::Failed => "Failed",
            QueryStatus::Cancelled => "Cancelled",
            QueryStatus::Timeout => "Timeout",
            QueryStatus::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Handle to a submitted query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryJob {
    pub id: String,
    pub status: QueryStatus,
}

/// Opaque scan continuation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a service token; empty tokens mean "no cursor".
    pub fn from_token(token: Option<&str>) -> Option<Self> {
        token.filter(|t| !t.is_empty()).map(|t| Cursor(t.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Normalized, sink-facing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogRecord {
    pub fn new(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }
}
