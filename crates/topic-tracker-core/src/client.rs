//! HTTP client for the tracker backend REST API.
//!
//! Covers the sidebar surface (health, tasks, results, catalogs) and the
//! streamed chat endpoint.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::sse::{self, StreamEvent};
use crate::types::{
    AnalysisType, AnalysisTypesResponse, ApiErrorResponse, CreateTaskRequest, CreateTaskResponse, DataSource,
    HealthStatus, ListTasksResponse, MessageResponse, ResultsResponse, SourcesResponse, Task,
    TaskResultSummary,
};

/// Client for the tracker backend.
#[derive(Debug, Clone)]
pub struct TrackerClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl TrackerClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the backend (e.g., "http://localhost:8000")
    /// * `request_timeout` - Timeout for plain request/response calls. Streamed
    ///   responses are only bounded by the connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, mapping non-success statuses to [`ClientError::Api`].
    async fn execute(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.timeout(self.request_timeout).send().await?;
        tracing::debug!(status = response.status().as_u16(), url = %response.url(), "Response received");

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }
        Ok(response)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.execute(self.client.get(self.url(path))).await?;
        Self::parse(response).await
    }

    /// Handle API error responses.
    async fn handle_error(response: Response) -> ClientError {
        let status = response.status().as_u16();
        let message = match response.json::<ApiErrorResponse>().await {
            Ok(body) => body.message(),
            Err(_) => "Unknown error".to_string(),
        };
        tracing::warn!(status, message = %message, "API error");
        ClientError::Api { status, message }
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Check backend health.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.get_json("/health").await
    }

    // =========================================================================
    // Task Operations
    // =========================================================================

    /// List active tasks.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        let body: ListTasksResponse = self.get_json("/api/tasks").await?;
        Ok(body.tasks)
    }

    /// Create a task.
    pub async fn create_task(
        &self,
        request: &CreateTaskRequest,
    ) -> Result<CreateTaskResponse, ClientError> {
        let response = self
            .execute(self.client.post(self.url("/api/tasks")).json(request))
            .await?;
        Self::parse(response).await
    }

    /// Delete a task. Returns the backend's confirmation text.
    pub async fn delete_task(&self, task_id: i64) -> Result<String, ClientError> {
        let response = self
            .execute(self.client.delete(self.url(&format!("/api/tasks/{task_id}"))))
            .await?;
        let body: MessageResponse = Self::parse(response).await?;
        Ok(body.message)
    }

    // =========================================================================
    // Result Operations
    // =========================================================================

    /// Most recent results across all tasks.
    pub async fn recent_results(&self) -> Result<Vec<TaskResultSummary>, ClientError> {
        let body: ResultsResponse = self.get_json("/api/results").await?;
        Ok(body.results)
    }

    /// Most recent results of one task.
    pub async fn task_results(&self, task_id: i64) -> Result<Vec<TaskResultSummary>, ClientError> {
        let body: ResultsResponse = self
            .get_json(&format!("/api/tasks/{task_id}/results"))
            .await?;
        Ok(body.results)
    }

    // =========================================================================
    // Catalogs
    // =========================================================================

    /// Data sources the backend can collect from.
    pub async fn sources(&self) -> Result<Vec<DataSource>, ClientError> {
        let body: SourcesResponse = self.get_json("/api/sources").await?;
        Ok(body.sources)
    }

    /// Analysis types the backend supports.
    pub async fn analysis_types(&self) -> Result<Vec<AnalysisType>, ClientError> {
        let body: AnalysisTypesResponse = self.get_json("/api/analysis-types").await?;
        Ok(body.analysis_types)
    }

    // =========================================================================
    // Streamed Chat
    // =========================================================================

    /// Post a chat message and stream the reply.
    ///
    /// Dropping the returned receiver stops reading the body.
    pub async fn stream_chat(
        &self,
        message: &str,
    ) -> Result<mpsc::Receiver<StreamEvent>, ClientError> {
        let response = self
            .client
            .post(self.url("/api/chat/stream"))
            .header(ACCEPT, "text/event-stream")
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(sse::pump(response.bytes_stream(), tx));
        Ok(rx)
    }

    // =========================================================================
    // Utility
    // =========================================================================

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebSocket endpoint derived from the base URL.
    #[must_use]
    pub fn ws_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}/ws")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> TrackerClient {
        TrackerClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn trims_trailing_slash() {
        assert_eq!(client("http://localhost:8000/").base_url(), "http://localhost:8000");
    }

    #[test]
    fn ws_url_follows_scheme() {
        assert_eq!(client("http://localhost:8000").ws_url(), "ws://localhost:8000/ws");
        assert_eq!(
            client("https://tracker.example.com").ws_url(),
            "wss://tracker.example.com/ws"
        );
    }
}
