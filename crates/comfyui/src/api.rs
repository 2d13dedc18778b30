//! REST API client for the inference service HTTP endpoints.
//!
//! Wraps workflow submission, history polling, artifact download, and
//! the liveness probe using [`reqwest`]. Errors are classified so
//! callers can distinguish transport failures from service answers.

use std::time::Duration;

use loopforge_core::workflow::WorkflowGraph;

use crate::outputs::{parse_history, ArtifactRef, HistoryEntry};

/// Default service address when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8188";

/// The liveness probe answers fast or not at all.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on any single API request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for a single inference service instance.
///
/// Every request carries a timeout, so a hung service surfaces as
/// [`ApiError::Transport`] instead of stalling the caller.
pub struct ComfyApi {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The service answered, but not with the expected shape or status.
    #[error("unexpected service response: {0}")]
    Protocol(String),

    /// The service refused the submitted workflow graph.
    #[error("workflow rejected ({status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The requested artifact does not exist on the service.
    #[error("artifact not found: {filename}")]
    NotFound { filename: String },
}

impl ComfyApi {
    /// Create a new API client.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `http://host:8188`. A trailing
    ///   slash is tolerated and stripped.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Override the default per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends a `POST /prompt` request with the graph wrapped in the
    /// service's `{"prompt": ...}` envelope. Returns the server-assigned
    /// prompt id.
    pub async fn submit(&self, workflow: &WorkflowGraph) -> Result<String, ApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.base_url))
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(ApiError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                body: Self::read_body(response).await,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ApiError::Protocol(format!("submit response is not JSON: {e}")))?;
        let prompt_id = parse_submit_response(&value)?;
        tracing::debug!(prompt_id = %prompt_id, "Workflow submitted");
        Ok(prompt_id)
    }

    /// Poll execution status for a prompt.
    ///
    /// Sends a `GET /history/{prompt_id}` request. `Ok(None)` means the
    /// job has not finished yet; a returned entry means it has, whether
    /// successfully or not.
    pub async fn fetch_status(&self, prompt_id: &str) -> Result<Option<HistoryEntry>, ApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.base_url, prompt_id))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(ApiError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Protocol(format!(
                "history request returned {status}"
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ApiError::Protocol(format!("history response is not JSON: {e}")))?;
        parse_history(prompt_id, &value)
            .map_err(|e| ApiError::Protocol(format!("malformed history entry: {e}")))
    }

    /// Download one stored artifact's raw bytes.
    ///
    /// Sends a `GET /view` request addressed by filename, subfolder,
    /// and storage type. A 404 maps to [`ApiError::NotFound`].
    pub async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.base_url))
            .query(&[
                ("filename", artifact.filename.as_str()),
                ("subfolder", artifact.subfolder.as_str()),
                ("type", artifact.kind.as_str()),
            ])
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(ApiError::Transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                filename: artifact.filename.clone(),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Protocol(format!(
                "artifact request returned {status}"
            )));
        }

        let bytes = response.bytes().await.map_err(ApiError::Transport)?;
        tracing::debug!(
            filename = %artifact.filename,
            bytes = bytes.len(),
            "Artifact downloaded",
        );
        Ok(bytes.to_vec())
    }

    /// Probe service liveness via `GET /system_stats`.
    ///
    /// Any reachable, successfully answering service counts as alive.
    pub async fn health_check(&self) -> Result<(), ApiError> {
        let response = self
            .client
            .get(format!("{}/system_stats", self.base_url))
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(ApiError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Protocol(format!(
                "liveness probe returned {status}"
            )));
        }
        Ok(())
    }

    // ---- private helpers ----

    /// Read a response body for error reporting, tolerating read failures.
    async fn read_body(response: reqwest::Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string())
    }
}

/// Extract the prompt id from a submission response body.
///
/// The id must be present, a string, and non-empty; anything else is a
/// protocol error.
fn parse_submit_response(value: &serde_json::Value) -> Result<String, ApiError> {
    value
        .get("prompt_id")
        .and_then(|id| id.as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Protocol("submit response is missing prompt_id".to_string()))
}
