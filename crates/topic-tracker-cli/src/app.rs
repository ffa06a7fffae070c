//! Application state.
//!
//! Holds the conversation, the connection handle and the sidebar data, and
//! turns connection, stream and reveal events into state changes. Rendering
//! lives in `ui` and only reads from here.

use tokio::sync::mpsc;
use tokio::time::Instant;
use topic_tracker_core::types::{Task, TaskResultSummary};
use topic_tracker_core::{
    ClientError, ClientMessage, ConnectionManager, ConnectionState, ConnectionStatus, MessageList,
    RevealPace, ServerMessage, StreamEvent, StreamRecord, StreamingTypewriter, TrackerClient,
    Typewriter,
};

/// Greeting revealed when the client starts.
pub const WELCOME: &str = "👋 Hello! I'm your AI Hot Topic Tracker assistant. I can help you:

- **Track topics**: say \"Track AI breakthroughs\" to start monitoring news
- **List tasks**: ask \"Show my tasks\" to see what you're tracking
- **Delete tasks**: say \"Delete task 1\" to remove a task
- **Get help**: type \"help\" for more information

What would you like to track today?";

/// How chat messages reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ChatTransport {
    /// POST to the streamed chat endpoint and reveal the reply as it arrives.
    #[default]
    Sse,
    /// Send `chat_message` frames over the WebSocket.
    Ws,
}

/// Application state.
pub struct App {
    /// HTTP client for the backend.
    client: TrackerClient,
    /// Handle to the WebSocket connection task.
    connection: ConnectionManager,
    /// How chat messages are sent.
    pub transport: ChatTransport,
    /// Reveal pace for the banner.
    pace: RevealPace,
    /// Conversation.
    pub messages: MessageList,
    /// Assembler for the reply being revealed.
    reply: StreamingTypewriter,
    /// Welcome banner, while it is still being revealed.
    banner: Option<Typewriter>,
    /// Last published connection status.
    pub connection_status: ConnectionStatus,
    /// A streamed reply is in flight.
    pub is_streaming: bool,
    /// A WebSocket reply is expected.
    pub awaiting_reply: bool,
    /// Latest "thinking" text of the streamed reply.
    pub thinking: Option<String>,
    /// Active tasks shown in the sidebar.
    pub tasks: Vec<Task>,
    /// Recent results shown in the sidebar.
    pub results: Vec<TaskResultSummary>,
    /// Current input buffer.
    pub input: String,
    /// Cursor position in input, as a byte offset on a char boundary.
    pub cursor_position: usize,
    /// Chat scroll position, in lines up from the bottom.
    pub chat_scroll: usize,
    /// Status message to display.
    pub status_message: Option<String>,
    /// Error message to display.
    pub error_message: Option<String>,
    /// Last sidebar refresh error.
    pub refresh_error: Option<String>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Animation frame counter for loading indicators.
    pub animation_frame: usize,
    refresh_requested: bool,
}

impl App {
    /// Create a new application.
    #[must_use]
    pub fn new(
        client: TrackerClient,
        connection: ConnectionManager,
        transport: ChatTransport,
        pace: RevealPace,
    ) -> Self {
        let connection_status = connection.status();
        Self {
            client,
            connection,
            transport,
            pace,
            messages: MessageList::new(),
            reply: StreamingTypewriter::new(pace),
            banner: None,
            connection_status,
            is_streaming: false,
            awaiting_reply: false,
            thinking: None,
            tasks: Vec::new(),
            results: Vec::new(),
            input: String::new(),
            cursor_position: 0,
            chat_scroll: 0,
            status_message: None,
            error_message: None,
            refresh_error: None,
            should_quit: false,
            animation_frame: 0,
            refresh_requested: true,
        }
    }

    /// Start revealing the welcome banner.
    pub fn start_welcome(&mut self, now: Instant) {
        self.finish_open_message();
        self.messages.open_assistant();
        self.banner = Some(Typewriter::start_at(WELCOME, self.pace, now));
    }

    /// Tick the animation frame (call on each render).
    pub fn tick_animation(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
    }

    /// Get current spinner character for loading animation.
    #[must_use]
    pub fn spinner_char(&self) -> &'static str {
        const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        SPINNER[self.animation_frame % SPINNER.len()]
    }

    /// Backend URL for display.
    #[must_use]
    pub fn backend_url(&self) -> &str {
        self.client.base_url()
    }

    /// Set the status message (also clears any error).
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.error_message = None;
    }

    /// Set the error message.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    /// Clear the error message.
    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Reconnect the WebSocket with a fresh retry budget.
    pub fn reconnect(&mut self) {
        self.connection.connect();
        self.set_status("Connecting...");
    }

    /// Close the WebSocket and stop reconnecting.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
        self.awaiting_reply = false;
        self.set_status("Disconnected");
    }

    /// Whether the WebSocket is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_status.state == ConnectionState::Connected
    }

    /// Whether a message can be sent right now.
    #[must_use]
    pub fn can_send(&self) -> bool {
        match self.transport {
            ChatTransport::Sse => !self.is_streaming,
            ChatTransport::Ws => self.is_connected(),
        }
    }

    /// Apply a new connection status.
    ///
    /// Returns `true` if the UI should be redrawn.
    pub fn handle_connection_status(&mut self, status: ConnectionStatus) -> bool {
        let previous = std::mem::replace(&mut self.connection_status, status);
        if previous == status {
            return false;
        }

        match status.state {
            ConnectionState::Connected if previous.state != ConnectionState::Connected => {
                self.set_status("Connected to backend");
                self.refresh_requested = true;
            }
            ConnectionState::Disconnected if status.exhausted => {
                self.set_error("Connection lost. Press Ctrl+R to reconnect");
            }
            ConnectionState::Disconnected if status.attempts > 0 => {
                self.set_status(format!(
                    "Connection lost, reconnecting (attempt {})",
                    status.attempts
                ));
            }
            _ => {}
        }

        if status.state != ConnectionState::Connected {
            self.awaiting_reply = false;
        }
        true
    }

    /// Apply a message pushed over the WebSocket.
    ///
    /// Returns `true` if the UI should be redrawn.
    pub fn handle_server_message(&mut self, message: ServerMessage, now: Instant) -> bool {
        match message {
            ServerMessage::Response { message } => {
                self.awaiting_reply = false;
                self.finish_open_message();
                self.messages.open_assistant();
                self.reply.add_chunk_at(&message, now);
                self.reply.mark_complete();
                self.settle_reply();
                self.chat_scroll = 0;
                true
            }
            ServerMessage::TaskResult(notice) => {
                self.messages.push_assistant(notice.to_markdown());
                self.set_status(format!("Task '{}' completed", notice.task_name));
                self.refresh_requested = true;
                self.chat_scroll = 0;
                true
            }
            ServerMessage::ChatMessage { .. } => {
                tracing::debug!("Ignoring echoed chat message");
                false
            }
        }
    }

    // =========================================================================
    // Streamed Reply
    // =========================================================================

    /// Apply an event of the streamed reply.
    ///
    /// Returns `true` if the UI should be redrawn.
    pub fn handle_stream_event(&mut self, event: StreamEvent, now: Instant) -> bool {
        match event {
            StreamEvent::Record(StreamRecord::Thinking { content }) => {
                self.thinking = Some(content);
            }
            StreamEvent::Record(StreamRecord::Content { content }) => {
                self.thinking = None;
                if self.messages.open_id().is_none() {
                    self.messages.open_assistant();
                }
                self.reply.add_chunk_at(&content, now);
                self.chat_scroll = 0;
            }
            StreamEvent::Record(StreamRecord::Done { .. }) => {
                self.thinking = None;
                self.reply.mark_complete();
            }
            StreamEvent::Record(StreamRecord::Error { content }) => {
                self.thinking = None;
                self.reply.mark_complete();
                self.set_error(content);
            }
            StreamEvent::Finished => {
                self.end_stream();
                if self.error_message.is_none() {
                    self.set_status("Reply complete");
                }
            }
            StreamEvent::Failed(e) => {
                self.end_stream();
                self.set_error(format!("Stream failed: {e}"));
            }
        }
        self.settle_reply();
        true
    }

    fn end_stream(&mut self) {
        self.is_streaming = false;
        self.thinking = None;
        self.reply.mark_complete();
        self.refresh_requested = true;
    }

    // =========================================================================
    // Reveal
    // =========================================================================

    /// The earliest pending reveal deadline.
    #[must_use]
    pub fn next_reveal_deadline(&self) -> Option<Instant> {
        let banner = self.banner.as_ref().and_then(Typewriter::next_deadline);
        match (banner, self.reply.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Advance the reveal animations.
    ///
    /// Returns `true` if the UI should be redrawn.
    pub fn tick_reveal(&mut self, now: Instant) -> bool {
        let mut changed = false;

        if let Some(banner) = self.banner.as_mut() {
            if banner.tick(now) {
                self.messages.update_open(banner.display_text());
                changed = true;
            }
            if banner.is_complete() {
                self.banner = None;
                self.messages.close_open();
            }
        } else if self.reply.tick(now) {
            self.messages.update_open(self.reply.display_text());
            changed = true;
        }

        self.settle_reply();
        changed
    }

    /// Whether text is still being revealed.
    #[must_use]
    pub fn is_revealing(&self) -> bool {
        self.banner.is_some() || self.reply.is_typing()
    }

    /// Whether a reply is expected but none of its text is visible yet.
    #[must_use]
    pub fn is_waiting_for_text(&self) -> bool {
        if self.awaiting_reply {
            return true;
        }
        let shown = self
            .messages
            .open_id()
            .and_then(|id| self.messages.get(id))
            .is_some_and(|m| !m.content.is_empty());
        self.is_streaming && !shown
    }

    /// Show everything received so far without waiting for the animation.
    pub fn skip_reveal(&mut self) {
        if let Some(mut banner) = self.banner.take() {
            banner.skip();
            self.messages.update_open(banner.display_text());
            self.messages.close_open();
            return;
        }
        self.reply.skip();
        self.messages.update_open(self.reply.display_text());
        self.settle_reply();
    }

    /// Reveal and freeze whatever message is open.
    fn finish_open_message(&mut self) {
        if let Some(mut banner) = self.banner.take() {
            banner.skip();
            self.messages.update_open(banner.display_text());
        } else if !self.reply.full_text().is_empty() {
            self.reply.skip();
            self.messages.update_open(self.reply.display_text());
        }
        self.messages.close_open();
        self.reply.reset();
    }

    /// Close the reply message once it is complete and fully shown.
    fn settle_reply(&mut self) {
        if self.banner.is_none() && self.reply.is_complete() {
            self.messages.close_open();
            self.reply.reset();
        }
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Send the input line.
    ///
    /// With the streamed transport, returns the receiver of the reply events.
    pub async fn send_message(&mut self) -> Option<mpsc::Receiver<StreamEvent>> {
        if self.input.trim().is_empty() {
            return None;
        }
        if !self.can_send() {
            self.set_error(match self.transport {
                ChatTransport::Sse => "Wait for the current reply to finish",
                ChatTransport::Ws => "Not connected. Press Ctrl+R to reconnect",
            });
            return None;
        }

        let text = self.take_input().trim().to_string();
        self.finish_open_message();
        self.messages.push_user(&text);
        self.chat_scroll = 0;

        match self.transport {
            ChatTransport::Ws => {
                if self.connection.send(&ClientMessage::chat(text)) {
                    self.awaiting_reply = true;
                    self.set_status("Waiting for reply...");
                } else {
                    self.set_error("Not connected. Press Ctrl+R to reconnect");
                }
                None
            }
            ChatTransport::Sse => match self.client.stream_chat(&text).await {
                Ok(events) => {
                    self.is_streaming = true;
                    self.set_status("Receiving reply... (Esc to skip animation)");
                    Some(events)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to start chat stream");
                    self.set_error(format!("Failed to send: {e}"));
                    None
                }
            },
        }
    }

    // =========================================================================
    // Sidebar
    // =========================================================================

    /// Ask for a sidebar refresh.
    pub fn request_refresh(&mut self) {
        self.refresh_requested = true;
    }

    /// Consume a pending refresh request. Deferred while a reply streams.
    pub fn take_refresh_request(&mut self) -> bool {
        if self.is_streaming {
            return false;
        }
        std::mem::take(&mut self.refresh_requested)
    }

    /// Reload tasks and recent results.
    pub async fn refresh_sidebar(&mut self) -> Result<(), ClientError> {
        self.tasks = self.client.list_tasks().await?;
        self.results = self.client.recent_results().await?;
        Ok(())
    }

    /// Report backend health in the status bar.
    pub async fn check_health(&mut self) {
        match self.client.health().await {
            Ok(health) if health.is_healthy() => self.set_status("Backend healthy"),
            Ok(health) => self.set_error(format!("Backend status: {}", health.status)),
            Err(e) => self.set_error(format!("Backend unreachable: {e}")),
        }
    }

    // =========================================================================
    // Chat Scrolling
    // =========================================================================

    /// Scroll chat up (view older messages).
    pub fn scroll_chat_up(&mut self, amount: usize) {
        self.chat_scroll = self.chat_scroll.saturating_add(amount);
    }

    /// Scroll chat down (view newer messages).
    pub fn scroll_chat_down(&mut self, amount: usize) {
        self.chat_scroll = self.chat_scroll.saturating_sub(amount);
    }

    // =========================================================================
    // Input Handling
    // =========================================================================

    /// Insert a character at the cursor position.
    pub fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor_position, c);
        self.cursor_position += c.len_utf8();
    }

    /// Delete the character before the cursor.
    pub fn delete_char(&mut self) {
        if let Some(c) = self.input[..self.cursor_position].chars().next_back() {
            self.cursor_position -= c.len_utf8();
            self.input.remove(self.cursor_position);
        }
    }

    /// Delete the character at the cursor.
    pub fn delete_char_forward(&mut self) {
        if self.cursor_position < self.input.len() {
            self.input.remove(self.cursor_position);
        }
    }

    /// Move cursor left.
    pub fn move_cursor_left(&mut self) {
        if let Some(c) = self.input[..self.cursor_position].chars().next_back() {
            self.cursor_position -= c.len_utf8();
        }
    }

    /// Move cursor right.
    pub fn move_cursor_right(&mut self) {
        if let Some(c) = self.input[self.cursor_position..].chars().next() {
            self.cursor_position += c.len_utf8();
        }
    }

    /// Move cursor to the start.
    pub fn move_cursor_start(&mut self) {
        self.cursor_position = 0;
    }

    /// Move cursor to the end.
    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.input.len();
    }

    /// Cursor position in characters, for placing the terminal cursor.
    #[must_use]
    pub fn cursor_column(&self) -> usize {
        self.input[..self.cursor_position].chars().count()
    }

    /// Clear the input.
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }

    /// Take the current input (clears it).
    pub fn take_input(&mut self) -> String {
        self.cursor_position = 0;
        std::mem::take(&mut self.input)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use topic_tracker_core::types::{AnalysisSummary, TaskResultNotice};
    use topic_tracker_core::{ReconnectPolicy, Role, WsConnector};

    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn pace() -> RevealPace {
        RevealPace {
            start_delay: 50 * MS,
            interval: 30 * MS,
        }
    }

    /// App whose connection is never opened and whose client is never called.
    fn app(transport: ChatTransport) -> App {
        let client = TrackerClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let (connection, _messages) = ConnectionManager::spawn(
            WsConnector::new("ws://127.0.0.1:9/ws"),
            ReconnectPolicy::default(),
        );
        App::new(client, connection, transport, pace())
    }

    fn drain(app: &mut App, mut now: Instant) -> Instant {
        while let Some(deadline) = app.next_reveal_deadline() {
            now = now.max(deadline);
            app.tick_reveal(now);
        }
        now
    }

    fn last(app: &App) -> (Role, String) {
        let m = app.messages.iter().last().unwrap();
        (m.role, m.content.clone())
    }

    fn content(text: &str) -> StreamEvent {
        StreamEvent::Record(StreamRecord::Content {
            content: text.to_string(),
        })
    }

    #[tokio::test]
    async fn welcome_banner_reveals_then_closes() {
        let mut app = app(ChatTransport::Sse);
        let start = Instant::now();
        app.start_welcome(start);
        assert_eq!(app.messages.len(), 1);
        assert!(app.messages.open_id().is_some());

        app.tick_reveal(start + 50 * MS);
        assert_eq!(last(&app).1, "👋");

        drain(&mut app, start);
        assert_eq!(last(&app).1, WELCOME);
        assert!(app.messages.open_id().is_none());
        assert!(!app.is_revealing());
    }

    #[tokio::test]
    async fn skip_finishes_banner() {
        let mut app = app(ChatTransport::Sse);
        app.start_welcome(Instant::now());
        app.skip_reveal();
        assert_eq!(last(&app).1, WELCOME);
        assert!(app.messages.open_id().is_none());
        assert!(app.next_reveal_deadline().is_none());
    }

    #[tokio::test]
    async fn streamed_reply_reveals_in_one_message() {
        let mut app = app(ChatTransport::Sse);
        app.is_streaming = true;
        let start = Instant::now();

        app.handle_stream_event(
            StreamEvent::Record(StreamRecord::Thinking {
                content: "Analyzing...".to_string(),
            }),
            start,
        );
        assert_eq!(app.thinking.as_deref(), Some("Analyzing..."));
        assert!(app.messages.is_empty());
        assert!(app.is_waiting_for_text());

        app.handle_stream_event(content("Hel"), start);
        app.handle_stream_event(content("lo"), start);
        assert_eq!(app.thinking, None);
        assert_eq!(app.messages.len(), 1);
        // The message is open but nothing is revealed before the start delay.
        assert!(app.is_waiting_for_text());

        app.tick_reveal(start + 50 * MS);
        assert_eq!(last(&app), (Role::Assistant, "H".to_string()));
        assert!(!app.is_waiting_for_text());

        app.handle_stream_event(StreamEvent::Record(StreamRecord::Done { result: None }), start);
        app.handle_stream_event(StreamEvent::Finished, start);
        assert!(!app.is_streaming);
        // Still revealing after the stream ended.
        assert!(app.messages.open_id().is_some());

        drain(&mut app, start + 50 * MS);
        assert_eq!(last(&app).1, "Hello");
        assert!(app.messages.open_id().is_none());
        assert!(app.take_refresh_request());
    }

    #[tokio::test]
    async fn stream_failure_keeps_partial_text() {
        let mut app = app(ChatTransport::Sse);
        app.is_streaming = true;
        let start = Instant::now();

        app.handle_stream_event(content("partial"), start);
        app.handle_stream_event(StreamEvent::Failed("connection reset".to_string()), start);
        assert!(!app.is_streaming);
        assert_eq!(
            app.error_message.as_deref(),
            Some("Stream failed: connection reset")
        );

        app.skip_reveal();
        assert_eq!(last(&app).1, "partial");
        assert!(app.messages.open_id().is_none());
    }

    #[tokio::test]
    async fn websocket_response_goes_through_assembler() {
        let mut app = app(ChatTransport::Ws);
        app.awaiting_reply = true;
        let start = Instant::now();

        app.handle_server_message(
            ServerMessage::Response {
                message: "Tracking started".to_string(),
            },
            start,
        );
        assert!(!app.awaiting_reply);
        assert_eq!(last(&app).1, "");

        drain(&mut app, start);
        assert_eq!(last(&app).1, "Tracking started");
        assert!(app.messages.open_id().is_none());
    }

    #[tokio::test]
    async fn second_response_freezes_the_first() {
        let mut app = app(ChatTransport::Ws);
        let start = Instant::now();

        app.handle_server_message(ServerMessage::Response { message: "first".to_string() }, start);
        app.handle_server_message(ServerMessage::Response { message: "second".to_string() }, start);

        let contents: Vec<_> = app.messages.iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["first".to_string(), String::new()]);

        drain(&mut app, start);
        assert_eq!(last(&app).1, "second");
    }

    #[tokio::test]
    async fn task_result_is_pushed_without_disturbing_reply() {
        let mut app = app(ChatTransport::Sse);
        app.is_streaming = true;
        let start = Instant::now();
        app.handle_stream_event(content("Working"), start);

        let notice = TaskResultNotice {
            task_id: Some(1),
            task_name: "AI news".to_string(),
            result: AnalysisSummary {
                summary: "Busy week".to_string(),
                sentiment: "positive".to_string(),
                sentiment_emoji: "😊".to_string(),
                key_points: vec!["launch".to_string()],
                data_count: 3,
            },
        };
        let expected = notice.to_markdown();
        app.handle_server_message(ServerMessage::TaskResult(notice), start);

        assert_eq!(last(&app).1, expected);
        assert_eq!(app.status_message.as_deref(), Some("Task 'AI news' completed"));

        app.handle_stream_event(StreamEvent::Finished, start);
        drain(&mut app, start);
        let contents: Vec<_> = app.messages.iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["Working".to_string(), expected]);
    }

    #[tokio::test]
    async fn websocket_sends_are_gated_on_connection() {
        let mut app = app(ChatTransport::Ws);
        app.input = "hello".to_string();
        app.cursor_position = 5;

        assert!(app.send_message().await.is_none());
        assert!(app.messages.is_empty());
        assert_eq!(app.input, "hello");
        assert!(app.error_message.is_some());
    }

    #[tokio::test]
    async fn connection_status_updates_banner_text() {
        let mut app = app(ChatTransport::Ws);
        app.take_refresh_request();

        let connected = ConnectionStatus {
            state: ConnectionState::Connected,
            attempts: 0,
            exhausted: false,
        };
        assert!(app.handle_connection_status(connected));
        assert!(app.is_connected());
        assert!(app.take_refresh_request());
        assert!(!app.handle_connection_status(connected));

        app.handle_connection_status(ConnectionStatus {
            state: ConnectionState::Disconnected,
            attempts: 5,
            exhausted: true,
        });
        assert!(!app.can_send());
        assert_eq!(
            app.error_message.as_deref(),
            Some("Connection lost. Press Ctrl+R to reconnect")
        );
    }

    #[tokio::test]
    async fn input_editing_respects_char_boundaries() {
        let mut app = app(ChatTransport::Sse);
        for c in "热点ok".chars() {
            app.insert_char(c);
        }
        assert_eq!(app.cursor_column(), 4);

        app.move_cursor_left();
        app.move_cursor_left();
        app.move_cursor_left();
        assert_eq!(app.cursor_column(), 1);
        app.delete_char();
        assert_eq!(app.input, "点ok");

        app.delete_char_forward();
        assert_eq!(app.input, "ok");
        app.move_cursor_end();
        assert_eq!(app.take_input(), "ok");
        assert_eq!(app.cursor_position, 0);
    }

    #[tokio::test]
    async fn refresh_is_deferred_while_streaming() {
        let mut app = app(ChatTransport::Sse);
        app.is_streaming = true;
        app.request_refresh();
        assert!(!app.take_refresh_request());

        app.handle_stream_event(StreamEvent::Finished, Instant::now());
        assert!(app.take_refresh_request());
        assert!(!app.take_refresh_request());
    }
}
