//! [`LogsApi`] backed by Amazon CloudWatch Logs.
//!
//! Query mode maps onto `StartQuery` / `GetQueryResults` / `StopQuery`;
//! scan mode maps onto `FilterLogEvents`.

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::Client;
use aws_sdk_cloudwatchlogs::error::DisplayErrorContext;
use aws_sdk_cloudwatchlogs::types::QueryStatus as AwsQueryStatus;
use tracing::debug;

use crate::config::AwsConfig;
use crate::retrieval::{Cursor, QueryStatus};

use super::{
    ApiError, ApiResult, LogsApi, QueryRow, RawEvent, ResultField, ScanInput, ScanPage,
    StartQueryInput,
};

/// CloudWatch Logs client wrapper.
#[derive(Debug, Clone)]
pub struct CloudWatchLogsApi {
    client: Client,
}

impl CloudWatchLogsApi {
    /// Resolve credentials and region, then build the service client.
    ///
    /// Unset fields fall back to the standard AWS provider chain.
    pub async fn connect(settings: &AwsConfig) -> Self {
        let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(profile) = &settings.profile {
            builder = builder.profile_name(profile);
        }
        if let Some(region) = &settings.region {
            builder = builder.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        let sdk_config = builder.load().await;
        debug!(
            profile = settings.profile.as_deref().unwrap_or("default"),
            region = ?sdk_config.region(),
            "CloudWatch Logs client ready"
        );

        Self {
            client: Client::new(&sdk_config),
        }
    }

    async fn get_query_results(
        &self,
        job_id: &str,
    ) -> ApiResult<aws_sdk_cloudwatchlogs::operation::get_query_results::GetQueryResultsOutput>
    {
        self.client
            .get_query_results()
            .query_id(job_id)
            .send()
            .await
            .map_err(|e| ApiError::new(DisplayErrorContext(&e).to_string()))
    }
}

fn map_status(status: Option<&AwsQueryStatus>) -> QueryStatus {
    match status {
        Some(AwsQueryStatus::Scheduled) => QueryStatus::Scheduled,
        Some(AwsQueryStatus::Running) => QueryStatus::Running,
        Some(AwsQueryStatus::Complete) => QueryStatus::Complete,
        Some(AwsQueryStatus::Failed) => QueryStatus::Failed,
        Some(AwsQueryStatus::Cancelled) => QueryStatus::Cancelled,
        Some(AwsQueryStatus::Timeout) => QueryStatus::Timeout,
        _ => QueryStatus::Unknown,
    }
}

#[async_trait]
impl LogsApi for CloudWatchLogsApi {
    async fn start_query(&self, input: &StartQueryInput) -> ApiResult<String> {
        let limit = input.limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX));

        let resp = self
            .client
            .start_query()
            .log_group_name(&input.log_group)
            .start_time(input.start_time)
            .end_time(input.end_time)
            .query_string(&input.query_string)
            .set_limit(limit)
            .send()
            .await
            .map_err(|e| ApiError::new(DisplayErrorContext(&e).to_string()))?;

        resp.query_id()
            .map(str::to_string)
            .ok_or_else(|| ApiError::new("StartQuery returned no query id"))
    }

    async fn query_status(&self, job_id: &str) -> ApiResult<QueryStatus> {
        let resp = self.get_query_results(job_id).await?;
        Ok(map_status(resp.status()))
    }

    async fn query_results(&self, job_id: &str) -> ApiResult<Vec<QueryRow>> {
        let resp = self.get_query_results(job_id).await?;

        let rows = resp
            .results()
            .iter()
            .map(|row| {
                row.iter()
                    .map(|f| ResultField {
                        field: f.field().map(str::to_string),
                        value: f.value().map(str::to_string),
                    })
                    .collect()
            })
            .collect();

        Ok(rows)
    }

    async fn stop_query(&self, job_id: &str) -> ApiResult<()> {
        self.client
            .stop_query()
            .query_id(job_id)
            .send()
            .await
            .map_err(|e| ApiError::new(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn scan_events(&self, input: &ScanInput) -> ApiResult<ScanPage> {
        let resp = self
            .client
            .filter_log_events()
            .log_group_name(&input.log_group)
            .start_time(input.start_time)
            .end_time(input.end_time)
            .set_next_token(input.cursor.as_ref().map(|c| c.as_str().to_string()))
            .send()
            .await
            .map_err(|e| ApiError::new(DisplayErrorContext(&e).to_string()))?;

        let events = resp
            .events()
            .iter()
            .map(|e| RawEvent {
                timestamp: e.timestamp(),
                message: e.message().map(str::to_string),
            })
            .collect();

        Ok(ScanPage {
            events,
            next_cursor: Cursor::from_token(resp.next_token()),
        })
    }
}
