//! Asynchronous analytic query retrieval.
//!
//! A query run is a small state machine:
//!
//! ```text
//! Submitted ──▶ Polling ──▶ Complete
//!                  │  ▲
//!                  └──┘ (sleep, non-terminal status)
//!                  │
//!                  └────▶ Failed (Failed | Cancelled | Timeout, remote or local deadline)
//! ```
//!
//! Results are fetched only from `Complete`; a failed job never yields rows.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::client::{LogsApi, QueryRow, StartQueryInput};
use crate::error::{ExportError, RequestError, Result, Stage};

use super::normalize::{MalformedRecordPolicy, normalize_batch, query_row_to_record};
use super::{
    Clock, LogRecord, QueryJob, QueryRequest, QueryStatus, RecordSource, TimeResolution,
};

/// Tunables for a query run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySettings {
    /// Query expression sent to the service.
    pub query_string: String,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Local deadline for the whole poll loop; `None` waits for the service.
    pub max_wait: Option<Duration>,
    /// Unit the window bounds are sent in.
    pub resolution: TimeResolution,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            query_string: "fields @timestamp, @message | sort @timestamp desc".to_string(),
            poll_interval: Duration::from_secs(1),
            max_wait: None,
            resolution: TimeResolution::Seconds,
        }
    }
}

/// Poll loop states.
#[derive(Debug)]
enum PollState {
    Submitted(QueryJob),
    Polling(QueryJob),
    Complete(QueryJob),
    Failed(QueryJob),
}

/// Retriever for query mode.
pub struct QueryRetriever {
    api: Arc<dyn LogsApi>,
    clock: Arc<dyn Clock>,
    settings: QuerySettings,
    policy: MalformedRecordPolicy,
    request: QueryRequest,
    /// Job submitted but not yet terminal; stopped on close.
    active_job: Option<QueryJob>,
    drained: bool,
    skipped: u64,
}

impl QueryRetriever {
    pub fn new(
        api: Arc<dyn LogsApi>,
        clock: Arc<dyn Clock>,
        request: QueryRequest,
        settings: QuerySettings,
        policy: MalformedRecordPolicy,
    ) -> Self {
        Self {
            api,
            clock,
            settings,
            policy,
            request,
            active_job: None,
            drained: false,
            skipped: 0,
        }
    }

    /// Submit `request` and return the freshly created job.
    pub async fn submit(&self, request: &QueryRequest) -> Result<QueryJob> {
        let (start_time, end_time) = request.window.bounds(self.settings.resolution);
        let input = StartQueryInput {
            log_group: request.log_group.clone(),
            start_time,
            end_time,
            query_string: self.settings.query_string.clone(),
            limit: request.limit,
        };

        let id = self
            .api
            .start_query(&input)
            .await
            .map_err(|e| RequestError::Service {
                stage: Stage::Submit,
                message: e.message,
            })?;

        info!(
            job_id = %id,
            log_group = %request.log_group,
            window = %request.window,
            limit = ?request.limit,
            "query submitted"
        );

        Ok(QueryJob {
            id,
            status: QueryStatus::Scheduled,
        })
    }

    /// Refresh the status of `job` from the service.
    pub async fn poll(&self, job: &QueryJob) -> Result<QueryJob> {
        let status = self
            .api
            .query_status(&job.id)
            .await
            .map_err(|e| RequestError::Service {
                stage: Stage::Poll,
                message: e.message,
            })?;

        debug!(job_id = %job.id, %status, "polled query status");

        Ok(QueryJob {
            id: job.id.clone(),
            status,
        })
    }

    /// Fetch the raw rows of a completed job.
    ///
    /// Fails with `RequestError::NotComplete` for any other status.
    pub async fn fetch_results(&self, job: &QueryJob) -> Result<Vec<QueryRow>> {
        if job.status != QueryStatus::Complete {
            return Err(RequestError::NotComplete {
                job_id: job.id.clone(),
                status: job.status,
            }
            .into());
        }

        let rows = self
            .api
            .query_results(&job.id)
            .await
            .map_err(|e| RequestError::Service {
                stage: Stage::Fetch,
                message: e.message,
            })?;

        debug!(job_id = %job.id, rows = rows.len(), "fetched query results");
        Ok(rows)
    }

    /// Drive `job` to a terminal state.
    ///
    /// Sleeps `poll_interval` between non-terminal polls. Once `max_wait` has
    /// elapsed the job is treated as `Timeout` without another poll.
    pub async fn wait_for_completion(&self, job: QueryJob) -> Result<QueryJob> {
        let started = self.clock.now();
        let mut polls = 0u32;
        let mut state = PollState::Submitted(job);

        loop {
            state = match state {
                PollState::Submitted(job) => PollState::Polling(job),
                PollState::Polling(job) => {
                    let job = self.poll(&job).await?;
                    polls += 1;

                    match job.status {
                        QueryStatus::Complete => PollState::Complete(job),
                        status if status.is_terminal() => PollState::Failed(job),
                        _ => {
                            self.clock.sleep(self.settings.poll_interval).await;

                            let elapsed = self.clock.now().duration_since(started);
                            match self.settings.max_wait {
                                Some(max) if elapsed >= max => {
                                    warn!(
                                        job_id = %job.id,
                                        ?elapsed,
                                        "query exceeded local deadline"
                                    );
                                    PollState::Failed(QueryJob {
                                        id: job.id,
                                        status: QueryStatus::Timeout,
                                    })
                                }
                                _ => PollState::Polling(job),
                            }
                        }
                    }
                }
                PollState::Complete(job) => {
                    info!(job_id = %job.id, polls, "query complete");
                    return Ok(job);
                }
                PollState::Failed(job) => {
                    return Err(ExportError::JobFailed {
                        job_id: job.id,
                        status: job.status,
                    });
                }
            };
        }
    }

    /// Submit, wait and return the normalized result set in service order.
    pub async fn run(&mut self) -> Result<Vec<LogRecord>> {
        let request = self.request.clone();
        let job = self.submit(&request).await?;
        self.active_job = Some(job.clone());

        let outcome = self.wait_for_completion(job).await;
        if let Err(ExportError::JobFailed {
            status: QueryStatus::Timeout,
            ..
        }) = &outcome
        {
            // A local deadline leaves the remote job running.
            self.stop_active_job().await;
        }
        self.active_job = None;
        let job = outcome?;

        let rows = self.fetch_results(&job).await?;
        let mut batch = normalize_batch(&rows, self.policy, query_row_to_record)?;
        batch.retain_within(&self.request.window);
        self.skipped += batch.skipped;

        Ok(batch.records)
    }

    async fn stop_active_job(&mut self) {
        if let Some(job) = self.active_job.take() {
            match self.api.stop_query(&job.id).await {
                Ok(()) => debug!(job_id = %job.id, "stopped query"),
                Err(e) => debug!(job_id = %job.id, error = %e, "failed to stop query"),
            }
        }
    }
}

#[async_trait]
impl RecordSource for QueryRetriever {
    async fn next_batch(&mut self) -> Result<Option<Vec<LogRecord>>> {
        if self.drained {
            return Ok(None);
        }
        self.drained = true;
        self.run().await.map(Some)
    }

    async fn close(&mut self) -> Result<()> {
        self.stop_active_job().await;
        Ok(())
    }

    fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ResultField;
    use crate::error::NormalizationError;
    use crate::retrieval::clock::manual::ManualClock;
    use crate::retrieval::mock::{Call, MockLogsApi};
    use crate::retrieval::TimeWindow;
    use chrono::DateTime;

    fn request(limit: Option<u32>) -> QueryRequest {
        QueryRequest {
            log_group: "/app/api".to_string(),
            window: TimeWindow::new(
                DateTime::from_timestamp(1_704_067_200, 0).unwrap(),
                DateTime::from_timestamp(1_704_070_800, 0).unwrap(),
            )
            .unwrap(),
            limit,
        }
    }

    fn row(millis: i64, message: &str) -> QueryRow {
        vec![
            ResultField::new("@timestamp", &millis.to_string()),
            ResultField::new("@message", message),
        ]
    }

    fn retriever(
        api: Arc<MockLogsApi>,
        clock: Arc<ManualClock>,
        limit: Option<u32>,
        settings: QuerySettings,
    ) -> QueryRetriever {
        QueryRetriever::new(api, clock, request(limit), settings, MalformedRecordPolicy::Abort)
    }

    #[tokio::test]
    async fn test_polls_until_complete_then_fetches() {
        let api = Arc::new(MockLogsApi::with_statuses(
            vec![
                QueryStatus::Scheduled,
                QueryStatus::Running,
                QueryStatus::Running,
                QueryStatus::Complete,
            ],
            vec![row(1_704_070_000_000, "second"), row(1_704_067_300_000, "first")],
        ));
        let clock = Arc::new(ManualClock::new());
        let mut retriever =
            retriever(api.clone(), clock.clone(), Some(2), QuerySettings::default());

        let records = retriever.run().await.unwrap();

        let messages: Vec<_> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "first"]);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1); 3]);

        let calls = api.calls();
        assert!(matches!(calls.first(), Some(Call::StartQuery(_))));
        // Results are requested exactly once, after the Complete poll.
        let results_at = calls.iter().position(|c| matches!(c, Call::Results(_))).unwrap();
        assert_eq!(results_at, calls.len() - 1);
        assert_eq!(
            calls.iter().filter(|c| matches!(c, Call::Status(_))).count(),
            4
        );
    }

    #[tokio::test]
    async fn test_submit_passes_seconds_and_limit() {
        let api = Arc::new(MockLogsApi::with_statuses(vec![QueryStatus::Complete], vec![]));
        let clock = Arc::new(ManualClock::new());
        let mut retriever = retriever(api.clone(), clock, None, QuerySettings::default());

        retriever.run().await.unwrap();

        match &api.calls()[0] {
            Call::StartQuery(input) => {
                assert_eq!(input.start_time, 1_704_067_200);
                assert_eq!(input.end_time, 1_704_070_800);
                assert_eq!(input.limit, None);
                assert_eq!(input.log_group, "/app/api");
                assert!(input.query_string.contains("sort @timestamp desc"));
            }
            other => panic!("unexpected first call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_immediately_complete_with_no_rows() {
        let api = Arc::new(MockLogsApi::with_statuses(vec![QueryStatus::Complete], vec![]));
        let clock = Arc::new(ManualClock::new());
        let mut retriever = retriever(api, clock.clone(), Some(10), QuerySettings::default());

        let batch = retriever.next_batch().await.unwrap();
        assert_eq!(batch, Some(vec![]));
        assert!(clock.sleeps().is_empty());
        assert_eq!(retriever.next_batch().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_terminal_failures_never_fetch() {
        for status in [QueryStatus::Failed, QueryStatus::Cancelled, QueryStatus::Timeout] {
            let api = Arc::new(MockLogsApi::with_statuses(
                vec![QueryStatus::Running, status],
                vec![row(1, "never")],
            ));
            let clock = Arc::new(ManualClock::new());
            let mut retriever = retriever(api.clone(), clock, None, QuerySettings::default());

            match retriever.run().await {
                Err(ExportError::JobFailed { job_id, status: got }) => {
                    assert_eq!(job_id, "query-1");
                    assert_eq!(got, status);
                }
                other => panic!("expected JobFailed, got {other:?}"),
            }
            assert!(!api.calls().iter().any(|c| matches!(c, Call::Results(_))));
        }
    }

    #[tokio::test]
    async fn test_local_deadline_times_out_and_stops_query() {
        // Status script is empty: the mock reports Running forever.
        let api = Arc::new(MockLogsApi::default());
        let clock = Arc::new(ManualClock::new());
        let settings = QuerySettings {
            poll_interval: Duration::from_secs(2),
            max_wait: Some(Duration::from_secs(5)),
            ..QuerySettings::default()
        };
        let mut retriever = retriever(api.clone(), clock.clone(), None, settings);

        let err = retriever.run().await.unwrap_err();
        assert!(matches!(
            err,
            ExportError::JobFailed { status: QueryStatus::Timeout, .. }
        ));
        // Polls at t=0, 2, 4; the deadline trips after the third sleep.
        assert_eq!(clock.sleeps().len(), 3);
        let calls = api.calls();
        assert_eq!(calls.last(), Some(&Call::Stop("query-1".to_string())));
        assert!(!calls.iter().any(|c| matches!(c, Call::Results(_))));
    }

    #[tokio::test]
    async fn test_fetch_results_rejects_incomplete_job() {
        let api = Arc::new(MockLogsApi::default());
        let retriever = retriever(
            api.clone(),
            Arc::new(ManualClock::new()),
            None,
            QuerySettings::default(),
        );

        let job = QueryJob {
            id: "query-1".to_string(),
            status: QueryStatus::Running,
        };
        let err = retriever.fetch_results(&job).await.unwrap_err();
        assert!(matches!(err, ExportError::Request(RequestError::NotComplete { .. })));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_submit_error_names_stage() {
        let api = Arc::new(MockLogsApi {
            start_error: Some("ResourceNotFoundException: log group".to_string()),
            ..Default::default()
        });
        let mut retriever =
            retriever(api, Arc::new(ManualClock::new()), None, QuerySettings::default());

        let err = retriever.run().await.unwrap_err();
        assert!(err.to_string().starts_with("submit failed"));
    }

    #[tokio::test]
    async fn test_malformed_row_follows_policy() {
        let rows = vec![
            row(1_704_067_201_000, "good"),
            vec![ResultField::new("@timestamp", "1704067201000")],
        ];

        let api = Arc::new(MockLogsApi::with_statuses(vec![QueryStatus::Complete], rows.clone()));
        let mut abort =
            retriever(api, Arc::new(ManualClock::new()), None, QuerySettings::default());
        assert!(matches!(
            abort.run().await,
            Err(ExportError::Normalization(NormalizationError::MissingField(_)))
        ));

        let api = Arc::new(MockLogsApi::with_statuses(vec![QueryStatus::Complete], rows));
        let mut skip = QueryRetriever::new(
            api,
            Arc::new(ManualClock::new()),
            request(None),
            QuerySettings::default(),
            MalformedRecordPolicy::Skip,
        );
        let records = skip.run().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(skip.skipped(), 1);
    }

    #[tokio::test]
    async fn test_rows_outside_window_are_dropped() {
        let api = Arc::new(MockLogsApi::with_statuses(
            vec![QueryStatus::Complete],
            vec![
                row(1_704_070_800_000, "at end"),
                row(1_704_070_799_999, "inside"),
                row(1_704_067_199_999, "before start"),
                row(1_704_067_200_000, "at start"),
            ],
        ));
        let mut retriever =
            retriever(api, Arc::new(ManualClock::new()), None, QuerySettings::default());

        let records = retriever.run().await.unwrap();
        let messages: Vec<_> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["inside", "at start"]);
        assert_eq!(retriever.skipped(), 0);
    }
}
