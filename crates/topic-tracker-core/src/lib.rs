//! Client core for the hot topic tracker.
//!
//! This crate holds everything the terminal client needs that is not drawing:
//!
//! - **Connection management**: a WebSocket kept open with fixed-delay,
//!   bounded reconnection ([`ConnectionManager`])
//! - **Streaming text assembly**: fragments accumulated and revealed one
//!   character at a time ([`StreamingTypewriter`])
//! - **Conversation state**: the ordered message list with one open
//!   assistant message ([`MessageList`])
//! - **Backend access**: REST calls and the streamed chat endpoint
//!   ([`TrackerClient`])
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  commands   ┌───────────────────┐   frames   ┌─────────┐
//! │ UI / caller  │────────────▶│ connection task   │◀──────────▶│ backend │
//! │              │◀────────────│ (owns transport)  │            │  /ws    │
//! └──────┬───────┘ status +    └───────────────────┘            └─────────┘
//!        │         messages
//!        │ fragments           ┌───────────────────┐
//!        └────────────────────▶│ StreamingTypewriter│──▶ display_text
//!                              └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use tokio::time::Instant;
//! use topic_tracker_core::{RevealPace, StreamingTypewriter};
//!
//! let mut tw = StreamingTypewriter::new(RevealPace::default());
//! let start = Instant::now();
//! tw.add_chunk_at("Hi", start);
//!
//! let mut now = start;
//! while let Some(deadline) = tw.next_deadline() {
//!     now = deadline.max(now);
//!     tw.tick(now);
//! }
//! tw.mark_complete();
//! assert_eq!(tw.display_text(), "Hi");
//! assert!(tw.is_complete());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod messages;
pub mod sse;
pub mod types;
pub mod typewriter;
pub mod ws;

pub use client::TrackerClient;
pub use config::ClientConfig;
pub use connection::{
    ConnectionAction, ConnectionMachine, ConnectionManager, ConnectionState, ConnectionStatus,
    Connector, ReconnectPolicy, Transport,
};
pub use error::{ClientError, ConfigError, TransportError};
pub use messages::{ChatMessage, MessageId, MessageList, Role};
pub use sse::{SseDecoder, StreamEvent};
pub use types::{ClientMessage, ServerMessage, StreamRecord, TaskResultNotice};
pub use typewriter::{RevealPace, StreamingTypewriter, Typewriter};
pub use ws::WsConnector;
