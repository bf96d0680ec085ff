//! OFD Jobs Client Implementation

use crate::error::{Result, SdkError};
use crate::types::{
    Job, JobEvent, JobIdRequest, JobStartedResponse, SortRequest, StatsResponse, SweepResponse,
    ValidationRequest, ValidationStatus, ValidationType,
};
use futures::StreamExt;
use jsonrpsee::core::client::{ClientT, Subscription, SubscriptionClientT};
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const PROGRESS_SUBSCRIBE: &str = "job.progress.subscribe.v1";
const PROGRESS_UNSUBSCRIBE: &str = "job.progress.unsubscribe.v1";

/// OFD Jobs daemon client
///
/// Unary calls go over HTTP. Progress subscriptions open their own WebSocket
/// connection to the same host and port.
///
/// # Example
///
/// ```no_run
/// use ofd_jobs_sdk::OfdJobsClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OfdJobsClient::connect("http://127.0.0.1:9630").await?;
/// let status = client.validation_status().await?;
/// println!("running: {}", status.running);
/// # Ok(())
/// # }
/// ```
pub struct OfdJobsClient {
    client: HttpClient,
    ws_url: String,
}

impl OfdJobsClient {
    /// Connect to the daemon
    ///
    /// # Arguments
    ///
    /// * `url` - RPC endpoint URL (e.g., `http://127.0.0.1:9630`)
    pub async fn connect(url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref();
        let ws_url = websocket_url(url)?;

        let client = HttpClientBuilder::default()
            .request_timeout(REQUEST_TIMEOUT)
            .build(url)
            .map_err(|e| SdkError::Connection(format!("Failed to create client: {}", e)))?;

        Ok(Self { client, ws_url })
    }

    /// Start a validation run
    ///
    /// A running validation is reported as `SdkError::Rpc` with code 4002;
    /// `SdkError::running_job_id` recovers its id.
    pub async fn start_validation(
        &self,
        validation_type: ValidationType,
    ) -> Result<JobStartedResponse> {
        let params = object_params(&ValidationRequest { validation_type })?;
        let response = self.client.request("validation.start.v1", params).await?;

        Ok(response)
    }

    /// Start a sort run
    pub async fn start_sort(&self, request: SortRequest) -> Result<JobStartedResponse> {
        let params = object_params(&request)?;
        let response = self.client.request("sort.start.v1", params).await?;

        Ok(response)
    }

    /// Currently running validation, if any
    pub async fn validation_status(&self) -> Result<ValidationStatus> {
        let response = self
            .client
            .request("validation.status.v1", rpc_params![])
            .await?;

        Ok(response)
    }

    /// Fetch the full job record
    pub async fn get_job(&self, job_id: impl Into<String>) -> Result<Job> {
        let params = object_params(&JobIdRequest {
            job_id: job_id.into(),
        })?;
        let response = self.client.request("job.get.v1", params).await?;

        Ok(response)
    }

    /// Daemon statistics
    pub async fn stats(&self) -> Result<StatsResponse> {
        let response = self.client.request("admin.stats.v1", rpc_params![]).await?;

        Ok(response)
    }

    /// Run a registry sweep now
    pub async fn sweep(&self) -> Result<SweepResponse> {
        let response = self.client.request("admin.sweep.v1", rpc_params![]).await?;

        Ok(response)
    }

    /// Subscribe to a job's events
    ///
    /// The full history is replayed first. The subscription ends after the
    /// terminal event.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ofd_jobs_sdk::OfdJobsClient;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let client = OfdJobsClient::connect("http://127.0.0.1:9630").await?;
    /// let mut progress = client.subscribe_progress("validation-current").await?;
    /// while let Some(event) = progress.next().await {
    ///     println!("{:?}", event?);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn subscribe_progress(&self, job_id: impl Into<String>) -> Result<ProgressSubscription> {
        let ws = WsClientBuilder::default()
            .request_timeout(REQUEST_TIMEOUT)
            .build(&self.ws_url)
            .await
            .map_err(|e| SdkError::Connection(format!("Failed to open WebSocket: {}", e)))?;

        let params = object_params(&JobIdRequest {
            job_id: job_id.into(),
        })?;
        let inner = ws
            .subscribe::<JobEvent, _>(PROGRESS_SUBSCRIBE, params, PROGRESS_UNSUBSCRIBE)
            .await?;

        Ok(ProgressSubscription {
            inner,
            _ws: ws,
            finished: false,
        })
    }
}

/// Live event feed for one job
#[derive(Debug)]
pub struct ProgressSubscription {
    inner: Subscription<JobEvent>,
    /// Keeps the connection open for the subscription's lifetime
    _ws: WsClient,
    finished: bool,
}

impl ProgressSubscription {
    /// Next event, `None` after the terminal event
    ///
    /// A feed that closes before the terminal event yields one
    /// `SdkError::Subscription`.
    pub async fn next(&mut self) -> Option<Result<JobEvent>> {
        if self.finished {
            return None;
        }

        match self.inner.next().await {
            Some(Ok(event)) => {
                self.finished = event.is_terminal();
                Some(Ok(event))
            }
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(e.into()))
            }
            None => {
                self.finished = true;
                Some(Err(SdkError::Subscription(
                    "Progress stream closed before the job finished".to_string(),
                )))
            }
        }
    }

    /// Drain the feed, returning every event through the terminal one
    pub async fn collect(mut self) -> Result<Vec<JobEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event?);
        }
        Ok(events)
    }
}

/// Serialize a request struct into named JSON-RPC params
fn object_params<T: Serialize>(request: &T) -> Result<ObjectParams> {
    let mut params = ObjectParams::new();
    if let serde_json::Value::Object(map) = serde_json::to_value(request)? {
        for (key, value) in map {
            params.insert(&key, value)?;
        }
    }
    Ok(params)
}

/// http(s)://host:port -> ws(s)://host:port
fn websocket_url(url: &str) -> Result<String> {
    if let Some(rest) = url.strip_prefix("http://") {
        Ok(format!("ws://{}", rest))
    } else if let Some(rest) = url.strip_prefix("https://") {
        Ok(format!("wss://{}", rest))
    } else if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(url.to_string())
    } else {
        Err(SdkError::InvalidUrl(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonrpsee::core::traits::ToRpcParams;

    #[test]
    fn test_websocket_url() {
        assert_eq!(
            websocket_url("http://127.0.0.1:9630").unwrap(),
            "ws://127.0.0.1:9630"
        );
        assert_eq!(websocket_url("https://host").unwrap(), "wss://host");
        assert!(matches!(
            websocket_url("127.0.0.1:9630"),
            Err(SdkError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_object_params_are_named() {
        let params = object_params(&SortRequest {
            dry_run: true,
            ..Default::default()
        })
        .unwrap();

        let raw = params.to_rpc_params().unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(raw.get()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"dry_run": true, "validate": false, "fix_indent_only": false})
        );
    }
}
