use std::{fmt, io};

use crate::retrieval::QueryStatus;

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export runs.
///
/// Every variant renders with the stage it came from, so the message printed
/// by `main` always names where the run stopped.
#[derive(Debug)]
pub enum ExportError {
    /// The request could not be issued (bad window, unreachable service).
    Request(RequestError),

    /// A query job reached a terminal state other than `Complete`.
    JobFailed { job_id: String, status: QueryStatus },

    /// A scan page could not be fetched; remaining pages are abandoned.
    PageFetch(PageFetchError),

    /// A raw record could not be decoded into a log record.
    Normalization(NormalizationError),

    /// Writing the output file failed.
    Sink(SinkError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors outside the sink.
    Io(io::Error),
}

/// Pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submit,
    Poll,
    Fetch,
    Write,
}

/// Errors raised before or while talking to the service on the query path.
#[derive(Debug)]
pub enum RequestError {
    /// Window start lies after its end.
    InvalidWindow { start: String, end: String },

    /// A user-supplied timestamp could not be parsed.
    InvalidTimestamp { value: String, reason: String },

    /// The service rejected or failed a call.
    Service { stage: Stage, message: String },

    /// Results were requested for a job that has not completed.
    NotComplete { job_id: String, status: QueryStatus },
}

/// Mid-pagination fetch failure.
#[derive(Debug)]
pub struct PageFetchError {
    /// 1-based index of the page that failed.
    pub page: u64,
    pub message: String,
}

/// Typed decoding failures at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    /// A positional or named field is missing from a raw record.
    MissingField(String),

    /// The timestamp field is not a valid point in time.
    InvalidTimestamp(String),

    /// The message payload is not a structured envelope.
    MalformedEnvelope(String),

    /// The envelope parsed but the designated field is absent.
    MissingMessageField(String),
}

/// Output file errors.
#[derive(Debug)]
pub enum SinkError {
    /// The destination could not be opened.
    Open { path: String, source: io::Error },

    /// The destination directory does not exist.
    MissingDirectory(String),

    /// A write or flush failed.
    Write { path: String, source: io::Error },
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// Generic configuration error.
    Generic(String),
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Request(e) => write!(f, "{e}"),
            ExportError::JobFailed { job_id, status } => {
                write!(f, "poll failed: query {job_id} ended with status {status}")
            }
            ExportError::PageFetch(e) => write!(f, "{e}"),
            ExportError::Normalization(e) => write!(f, "fetch failed: {e}"),
            ExportError::Sink(e) => write!(f, "write failed: {e}"),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Submit => "submit",
            Stage::Poll => "poll",
            Stage::Fetch => "fetch",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::InvalidWindow { start, end } => {
                write!(f, "submit failed: window start {start} is after end {end}")
            }
            RequestError::InvalidTimestamp { value, reason } => {
                write!(f, "submit failed: invalid timestamp '{value}': {reason}")
            }
            RequestError::Service { stage, message } => write!(f, "{stage} failed: {message}"),
            RequestError::NotComplete { job_id, status } => write!(
                f,
                "fetch failed: results requested for query {job_id} in status {status}"
            ),
        }
    }
}

impl fmt::Display for PageFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch failed on page {}: {}", self.page, self.message)
    }
}

impl fmt::Display for NormalizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationError::MissingField(field) => {
                write!(f, "record is missing field {field}")
            }
            NormalizationError::InvalidTimestamp(value) => {
                write!(f, "record has invalid timestamp '{value}'")
            }
            NormalizationError::MalformedEnvelope(reason) => {
                write!(f, "message is not a JSON envelope: {reason}")
            }
            NormalizationError::MissingMessageField(field) => {
                write!(f, "message envelope has no '{field}' field")
            }
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Open { path, source } => write!(f, "cannot open {path}: {source}"),
            SinkError::MissingDirectory(dir) => write!(f, "directory does not exist: {dir}"),
            SinkError::Write { path, source } => write!(f, "{path}: {source}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Sink(SinkError::Open { source, .. })
            | ExportError::Sink(SinkError::Write { source, .. }) => Some(source),
            ExportError::Io(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for RequestError {}
impl std::error::Error for PageFetchError {}
impl std::error::Error for NormalizationError {}
impl std::error::Error for SinkError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<RequestError> for ExportError {
    fn from(err: RequestError) -> Self {
        ExportError::Request(err)
    }
}

impl From<PageFetchError> for ExportError {
    fn from(err: PageFetchError) -> Self {
        ExportError::PageFetch(err)
    }
}

impl From<NormalizationError> for ExportError {
    fn from(err: NormalizationError) -> Self {
        ExportError::Normalization(err)
    }
}

impl From<SinkError> for ExportError {
    fn from(err: SinkError) -> Self {
        ExportError::Sink(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_stage() {
        let err: ExportError = RequestError::Service {
            stage: Stage::Submit,
            message: "AccessDenied".into(),
        }
        .into();
        assert_eq!(err.to_string(), "submit failed: AccessDenied");

        let err = ExportError::JobFailed {
            job_id: "q-1".into(),
            status: QueryStatus::Cancelled,
        };
        assert!(err.to_string().starts_with("poll failed"));
        assert!(err.to_string().contains("Cancelled"));

        let err: ExportError = PageFetchError {
            page: 3,
            message: "throttled".into(),
        }
        .into();
        assert_eq!(err.to_string(), "fetch failed on page 3: throttled");

        let err: ExportError = SinkError::Write {
            path: "out.csv".into(),
            source: io::Error::other("disk full"),
        }
        .into();
        assert_eq!(err.to_string(), "write failed: out.csv: disk full");
    }

    #[test]
    fn test_normalization_error_display() {
        let err: ExportError = NormalizationError::MissingMessageField("log.msg".into()).into();
        assert_eq!(
            err.to_string(),
            "fetch failed: message envelope has no 'log.msg' field"
        );
    }
}
