//! Wire types for the tracker backend.
//!
//! These types mirror the JSON exchanged with the backend over REST, the
//! `/ws` WebSocket and the `/api/chat/stream` streamed response.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

// =============================================================================
// Task Types
// =============================================================================

/// A tracking task as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task ID.
    pub id: i64,
    /// Human-readable name.
    pub name: String,
    /// Keywords being tracked.
    pub keywords: String,
    /// Data sources the task collects from.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Analysis applied to collected data.
    #[serde(default)]
    pub analysis_type: String,
    /// Seconds between runs.
    #[serde(default)]
    pub schedule_interval: u64,
    /// Creation timestamp as reported by the backend.
    #[serde(default)]
    pub created_at: String,
}

/// Response for listing tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTasksResponse {
    /// Active tasks.
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Request to create a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    /// Human-readable name.
    pub name: String,
    /// Keywords to track.
    pub keywords: String,
    /// Data source ids (see [`DataSource`]).
    pub sources: Vec<String>,
    /// Analysis type id (see [`AnalysisType`]).
    pub analysis_type: String,
    /// Seconds between runs.
    pub schedule_interval: u64,
}

/// Response for creating a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    /// Confirmation text.
    pub message: String,
    /// ID of the new task.
    pub task_id: i64,
}

/// Generic confirmation body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Confirmation text.
    pub message: String,
}

// =============================================================================
// Result Types
// =============================================================================

/// A stored analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResultSummary {
    /// Result ID.
    pub id: i64,
    /// Task that produced the result.
    pub task_id: i64,
    /// Analysis summary.
    #[serde(default)]
    pub summary: String,
    /// Overall sentiment.
    #[serde(default = "default_sentiment")]
    pub sentiment: String,
    /// Number of items analyzed.
    #[serde(default)]
    pub data_count: u64,
    /// Creation timestamp as reported by the backend.
    #[serde(default)]
    pub created_at: String,
}

fn default_sentiment() -> String {
    "neutral".to_string()
}

/// Response for listing results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsResponse {
    /// Results, newest first.
    #[serde(default)]
    pub results: Vec<TaskResultSummary>,
}

// =============================================================================
// Catalog Types
// =============================================================================

/// A data source the backend can collect from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    /// Source id used in [`CreateTaskRequest::sources`].
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Whether the backend needs an API key for this source.
    #[serde(default)]
    pub requires_api_key: bool,
}

/// Response for listing data sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesResponse {
    /// Available sources.
    #[serde(default)]
    pub sources: Vec<DataSource>,
}

/// An analysis the backend can apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisType {
    /// Type id used in [`CreateTaskRequest::analysis_type`].
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
}

/// Response for listing analysis types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTypesResponse {
    /// Available analysis types.
    #[serde(default)]
    pub analysis_types: Vec<AnalysisType>,
}

/// Health check body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall status, "healthy" when up.
    pub status: String,
    /// Agent subsystem status.
    #[serde(default)]
    pub agents: Option<String>,
}

impl HealthStatus {
    /// Whether the backend reports itself healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Error body returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// A string for handled errors, a list of field errors for rejected input.
    pub detail: serde_json::Value,
}

impl ApiErrorResponse {
    /// Detail rendered as a single line.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}

// =============================================================================
// WebSocket Protocol Types
// =============================================================================
//
// Endpoint: WS /ws

/// Client -> Server: messages sent over the WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A chat line typed by the user.
    ChatMessage {
        /// The user's text.
        message: String,
    },
}

impl ClientMessage {
    /// Build a chat message.
    #[must_use]
    pub fn chat(message: impl Into<String>) -> Self {
        Self::ChatMessage {
            message: message.into(),
        }
    }
}

/// Server -> Client: messages pushed over the WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Assistant reply to a chat message.
    Response {
        /// Reply text (markdown).
        #[serde(default)]
        message: String,
    },
    /// A scheduled task produced a new result.
    TaskResult(TaskResultNotice),
    /// Chat line relayed by the backend.
    ChatMessage {
        /// Relayed text.
        #[serde(default)]
        message: String,
    },
}

/// Push notification for a finished task run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResultNotice {
    /// Task ID.
    #[serde(default)]
    pub task_id: Option<i64>,
    /// Task name.
    pub task_name: String,
    /// Analysis output.
    pub result: AnalysisSummary,
}

/// Analysis output attached to a task result notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Summary text.
    #[serde(default)]
    pub summary: String,
    /// Overall sentiment.
    #[serde(default = "default_sentiment")]
    pub sentiment: String,
    /// Emoji for the sentiment.
    #[serde(default)]
    pub sentiment_emoji: String,
    /// Key points extracted.
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Number of items analyzed.
    #[serde(default)]
    pub data_count: u64,
}

impl TaskResultNotice {
    /// Render the notification as a markdown chat message.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let r = &self.result;
        let mut out = format!("🎯 **{}** completed!\n\n", self.task_name);
        let _ = write!(out, "📊 **Summary**: {}\n\n", r.summary);
        let _ = write!(out, "📈 **Sentiment**: {} {}\n\n", r.sentiment, r.sentiment_emoji);
        out.push_str("📋 **Key Points**:\n");
        for point in &r.key_points {
            let _ = writeln!(out, "- {point}");
        }
        let _ = write!(out, "\n🔢 **Data Count**: {} items analyzed", r.data_count);
        out
    }
}

// =============================================================================
// Streamed Response Types
// =============================================================================
//
// Endpoint: POST /api/chat/stream, newline-delimited `data: <json>` records.

/// One record of a streamed chat response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamRecord {
    /// Progress text shown before the answer.
    Thinking {
        /// Thinking fragment.
        #[serde(default)]
        content: String,
    },
    /// Answer text fragment.
    Content {
        /// Answer fragment.
        #[serde(default)]
        content: String,
    },
    /// The answer is complete.
    Done {
        /// Structured outcome of the request, if any.
        #[serde(default)]
        result: Option<serde_json::Value>,
    },
    /// The backend failed to answer.
    Error {
        /// Error text.
        #[serde(default)]
        content: String,
    },
}

impl StreamRecord {
    /// Whether this record ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // WebSocket Message Tests
    // =========================================================================

    #[test]
    fn chat_message_serializes_correctly() {
        let json = serde_json::to_string(&ClientMessage::chat("Track AI breakthroughs")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["type"], "chat_message");
        assert_eq!(parsed["message"], "Track AI breakthroughs");
    }

    #[test]
    fn response_deserializes() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"response","message":"Task created"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Response {
                message: "Task created".to_string()
            }
        );
    }

    #[test]
    fn task_result_deserializes_and_renders() {
        let json = r#"{
            "type":"task_result","task_id":3,"task_name":"AI news",
            "result":{"summary":"Lots happening","sentiment":"positive","sentiment_emoji":"😊",
                      "key_points":["New model","Funding round"],"data_count":12}
        }"#;
        let ServerMessage::TaskResult(notice) = serde_json::from_str(json).unwrap() else {
            panic!("Expected TaskResult");
        };
        assert_eq!(notice.task_id, Some(3));

        let md = notice.to_markdown();
        assert!(md.starts_with("🎯 **AI news** completed!"));
        assert!(md.contains("**Sentiment**: positive 😊"));
        assert!(md.contains("- Funding round\n"));
        assert!(md.ends_with("12 items analyzed"));
    }

    #[test]
    fn task_result_tolerates_sparse_analysis() {
        let json = r#"{"type":"task_result","task_name":"t","result":{}}"#;
        let ServerMessage::TaskResult(notice) = serde_json::from_str(json).unwrap() else {
            panic!("Expected TaskResult");
        };
        assert_eq!(notice.result.sentiment, "neutral");
        assert!(notice.result.key_points.is_empty());
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        assert!(serde_json::from_str::<ServerMessage>(r#"{"type":"mystery"}"#).is_err());
    }

    // =========================================================================
    // Stream Record Tests
    // =========================================================================

    #[test]
    fn stream_records_deserialize() {
        let r: StreamRecord = serde_json::from_str(r#"{"type":"thinking","content":"Analyzing"}"#).unwrap();
        assert_eq!(r, StreamRecord::Thinking { content: "Analyzing".to_string() });
        assert!(!r.is_terminal());

        let r: StreamRecord = serde_json::from_str(r#"{"type":"done","result":{"task_id":1}}"#).unwrap();
        match &r {
            StreamRecord::Done { result: Some(v) } => assert_eq!(v["task_id"], 1),
            _ => panic!("Expected Done with result"),
        }
        assert!(r.is_terminal());

        let r: StreamRecord = serde_json::from_str(r#"{"type":"done"}"#).unwrap();
        assert_eq!(r, StreamRecord::Done { result: None });
    }

    // =========================================================================
    // REST Type Tests
    // =========================================================================

    #[test]
    fn task_list_deserializes() {
        let json = r#"{"tasks":[{"id":1,"name":"Crypto","keywords":"bitcoin","sources":["news","reddit"],
            "analysis_type":"sentiment","schedule_interval":3600,"created_at":"2024-05-01T10:00:00"}]}"#;
        let body: ListTasksResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.tasks.len(), 1);
        assert_eq!(body.tasks[0].sources, vec!["news", "reddit"]);
    }

    #[test]
    fn health_status() {
        let health: HealthStatus =
            serde_json::from_str(r#"{"status":"healthy","agents":"operational"}"#).unwrap();
        assert!(health.is_healthy());
    }
}
