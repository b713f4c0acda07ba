//! Cursor-paginated scan retrieval.
//!
//! Pages are fetched lazily, one per [`ScanRetriever::next_page`] call. The
//! sequence is forward-only: the first request carries no cursor, every later
//! one carries the cursor from the previous response, and it ends as soon as a
//! response has no cursor or repeats the one just sent.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::client::{LogsApi, ScanInput, ScanPage};
use crate::error::{PageFetchError, Result};

use super::normalize::{MalformedRecordPolicy, normalize_batch, scan_event_to_record};
use super::{Cursor, LogRecord, RecordSource, TimeResolution, TimeWindow};

/// Tunables for a scan run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    /// Dot-separated path of the log text inside each JSON message envelope.
    pub message_field: String,
    /// Unit the window bounds are sent in.
    pub resolution: TimeResolution,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            message_field: "message".to_string(),
            resolution: TimeResolution::Milliseconds,
        }
    }
}

/// Retriever for scan mode.
pub struct ScanRetriever {
    api: Arc<dyn LogsApi>,
    log_group: String,
    window: TimeWindow,
    settings: ScanSettings,
    policy: MalformedRecordPolicy,
    cursor: Option<Cursor>,
    pages: u64,
    events: u64,
    skipped: u64,
    exhausted: bool,
}

impl ScanRetriever {
    pub fn new(
        api: Arc<dyn LogsApi>,
        log_group: impl Into<String>,
        window: TimeWindow,
        settings: ScanSettings,
        policy: MalformedRecordPolicy,
    ) -> Self {
        Self {
            api,
            log_group: log_group.into(),
            window,
            settings,
            policy,
            cursor: None,
            pages: 0,
            events: 0,
            skipped: 0,
            exhausted: false,
        }
    }

    /// Fetch the page that starts at `cursor` (`None` for the first page).
    pub async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<ScanPage> {
        let (start_time, end_time) = self.window.bounds(self.settings.resolution);
        let input = ScanInput {
            log_group: self.log_group.clone(),
            start_time,
            end_time,
            cursor: cursor.cloned(),
        };

        self.api.scan_events(&input).await.map_err(|e| {
            PageFetchError {
                page: self.pages + 1,
                message: e.message,
            }
            .into()
        })
    }

    /// Next page of the sequence, or `None` once the service is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<ScanPage>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self.fetch_page(self.cursor.as_ref()).await?;
        self.pages += 1;
        self.events += page.events.len() as u64;

        match &page.next_cursor {
            None => {
                self.exhausted = true;
            }
            Some(next) if self.cursor.as_ref() == Some(next) => {
                debug!(page = self.pages, "service repeated the cursor, treating as end");
                self.exhausted = true;
            }
            Some(next) => {
                self.cursor = Some(next.clone());
            }
        }

        debug!(
            page = self.pages,
            events = page.events.len(),
            more = !self.exhausted,
            "fetched scan page"
        );

        if self.exhausted {
            info!(
                pages = self.pages,
                events = self.events,
                log_group = %self.log_group,
                "scan exhausted"
            );
        }

        Ok(Some(page))
    }

    /// Pages fetched so far.
    pub fn pages(&self) -> u64 {
        self.pages
    }
}

#[async_trait]
impl RecordSource for ScanRetriever {
    async fn next_batch(&mut self) -> Result<Option<Vec<LogRecord>>> {
        let Some(page) = self.next_page().await? else {
            return Ok(None);
        };

        let field = self.settings.message_field.as_str();
        let mut batch = normalize_batch(&page.events, self.policy, |event| {
            scan_event_to_record(event, field)
        })?;
        batch.retain_within(&self.window);
        self.skipped += batch.skipped;

        Ok(Some(batch.records))
    }

    async fn close(&mut self) -> Result<()> {
        // Nothing is held remotely between pages.
        self.exhausted = true;
        Ok(())
    }

    fn skipped(&self) -> u64 {
        self.skipped
    }
}
