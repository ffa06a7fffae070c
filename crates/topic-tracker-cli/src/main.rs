//! Hot Topic Tracker CLI - terminal chat client for the tracker backend.
//!
//! This is the entry point for the `ttrack` binary.

mod app;
mod markdown;
mod ui;

use std::fs::File;
use std::future::pending;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use topic_tracker_core::{
    ClientConfig, ConnectionManager, ConnectionStatus, ServerMessage, StreamEvent, TrackerClient,
    WsConnector,
};
use tracing_subscriber::EnvFilter;

use app::{App, ChatTransport};

/// How often the terminal is polled for input.
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Hot Topic Tracker CLI - chat with the tracker agents from the terminal.
#[derive(Parser, Debug)]
#[command(name = "ttrack")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend URL.
    #[arg(long, env = "TRACKER_URL", default_value = "http://localhost:8000")]
    url: String,

    /// How chat messages are sent.
    #[arg(long, value_enum, env = "TRACKER_TRANSPORT", default_value_t = ChatTransport::Sse)]
    transport: ChatTransport,

    /// Reconnect attempts after an unexpected disconnect.
    #[arg(long, env = "TRACKER_MAX_RECONNECTS", default_value = "5")]
    max_reconnects: u32,

    /// Delay between reconnect attempts, in milliseconds.
    #[arg(long, env = "TRACKER_RECONNECT_INTERVAL_MS", default_value = "3000")]
    reconnect_interval_ms: u64,

    /// Do not reconnect after the connection drops.
    #[arg(long, default_value = "false")]
    no_reconnect: bool,

    /// Delay between revealed characters, in milliseconds.
    #[arg(long, env = "TRACKER_REVEAL_INTERVAL_MS", default_value = "30")]
    reveal_interval_ms: u64,

    /// Delay before the first character of a reply is revealed, in milliseconds.
    #[arg(long, env = "TRACKER_REVEAL_START_DELAY_MS", default_value = "50")]
    reveal_start_delay_ms: u64,

    /// Timeout for REST requests, in seconds.
    #[arg(long, env = "TRACKER_REQUEST_TIMEOUT_SECS", default_value = "30")]
    request_timeout_secs: u64,

    /// Sidebar refresh period, in seconds.
    #[arg(long, default_value = "10")]
    refresh_seconds: u64,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    /// Log file used with --debug.
    #[arg(long, default_value = "ttrack.log")]
    log_file: String,
}

impl Args {
    fn config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.url.clone(),
            should_reconnect: !self.no_reconnect,
            reconnect_interval_ms: self.reconnect_interval_ms,
            max_reconnect_attempts: self.max_reconnects,
            reveal_interval_ms: self.reveal_interval_ms,
            reveal_start_delay_ms: self.reveal_start_delay_ms,
            request_timeout_seconds: self.request_timeout_secs,
            refresh_interval_seconds: self.refresh_seconds,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse arguments
    let args = Args::parse();
    let config = args.config();
    config.validate()?;

    // Initialize logging. The terminal belongs to the UI, so logs go to a file.
    if args.debug {
        let file = File::create(&args.log_file)
            .with_context(|| format!("failed to create log file {}", args.log_file))?;
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("topic_tracker_cli=debug,topic_tracker_core=debug,warn")
        });
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    }

    // Create client and connection
    let client = TrackerClient::new(config.base_url(), config.request_timeout())?;
    let (connection, server_rx) =
        ConnectionManager::spawn(WsConnector::new(client.ws_url()), config.reconnect_policy());
    let status_rx = connection.subscribe();
    connection.connect();

    // Create app
    let mut app = App::new(client, connection, args.transport, config.reveal_pace());
    app.start_welcome(Instant::now());
    app.check_health().await;

    // Setup terminal with mouse capture enabled
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the event loop
    let channels = Channels {
        server_rx,
        status_rx,
        stream_rx: None,
    };
    let result =
        run_event_loop(&mut terminal, &mut app, channels, config.refresh_interval()).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

/// Event sources feeding the loop.
struct Channels {
    server_rx: mpsc::Receiver<ServerMessage>,
    status_rx: watch::Receiver<ConnectionStatus>,
    stream_rx: Option<mpsc::Receiver<StreamEvent>>,
}

/// Next event of the streamed reply, if one is in flight.
///
/// A closed channel reads as [`StreamEvent::Finished`] and clears the slot.
async fn next_stream_event(stream: &mut Option<mpsc::Receiver<StreamEvent>>) -> StreamEvent {
    let Some(rx) = stream.as_mut() else {
        return pending().await;
    };
    match rx.recv().await {
        Some(event) => {
            if matches!(event, StreamEvent::Finished | StreamEvent::Failed(_)) {
                *stream = None;
            }
            event
        }
        None => {
            *stream = None;
            StreamEvent::Finished
        }
    }
}

/// Sleep until the next reveal deadline, or forever without one.
async fn reveal_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}

/// Main event loop.
///
/// Redraws after every event that changed visible state.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut channels: Channels,
    refresh_period: Duration,
) -> anyhow::Result<()> {
    let mut input_interval = tokio::time::interval(INPUT_POLL_INTERVAL);
    input_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut refresh_interval = tokio::time::interval(refresh_period);
    refresh_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // Tick animation frame
        app.tick_animation();

        // Render
        terminal.draw(|f| ui::render(f, app))?;

        let deadline = app.next_reveal_deadline();

        tokio::select! {
            // Terminal events
            _ = input_interval.tick() => {
                while event::poll(Duration::from_millis(0)).unwrap_or(false) {
                    if let Ok(evt) = event::read() {
                        if let Some(rx) = handle_input(app, evt).await {
                            channels.stream_rx = Some(rx);
                        }
                    }
                }
            }

            // Frames pushed over the WebSocket
            Some(message) = channels.server_rx.recv() => {
                app.handle_server_message(message, Instant::now());
            }

            // Connection state changes
            Ok(()) = channels.status_rx.changed() => {
                let status = *channels.status_rx.borrow_and_update();
                app.handle_connection_status(status);
            }

            // Streamed reply
            event = next_stream_event(&mut channels.stream_rx) => {
                app.handle_stream_event(event, Instant::now());
            }

            // Typewriter reveal
            () = reveal_deadline(deadline) => {
                app.tick_reveal(Instant::now());
            }

            // Periodic sidebar refresh
            _ = refresh_interval.tick() => {
                app.request_refresh();
            }
        }

        if app.take_refresh_request() {
            if let Err(e) = app.refresh_sidebar().await {
                tracing::warn!(error = %e, "Failed to refresh sidebar");
                app.refresh_error = Some(format!("Refresh failed: {e}"));
            } else {
                app.refresh_error = None;
            }
        }

        if app.should_quit {
            break;
        }
    }

    // Cleanup: close the connection
    app.disconnect();

    Ok(())
}

/// Handle input events.
///
/// Returns the reply stream when a message was sent over the streamed transport.
async fn handle_input(app: &mut App, event: Event) -> Option<mpsc::Receiver<StreamEvent>> {
    match event {
        Event::Key(key) => {
            // Only handle key press events
            if key.kind != KeyEventKind::Press {
                return None;
            }
            return handle_key(app, key.code, key.modifiers).await;
        }
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => app.scroll_chat_up(3),
            MouseEventKind::ScrollDown => app.scroll_chat_down(3),
            _ => {}
        },
        _ => {}
    }
    None
}

/// Handle a key press.
async fn handle_key(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
) -> Option<mpsc::Receiver<StreamEvent>> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        match code {
            KeyCode::Char('c') => app.should_quit = true,
            KeyCode::Char('r') => app.reconnect(),
            KeyCode::Char('d') => app.disconnect(),
            KeyCode::Char('u') => app.clear_input(),
            KeyCode::Char('a') => app.move_cursor_start(),
            KeyCode::Char('e') => app.move_cursor_end(),
            _ => {}
        }
        return None;
    }

    match code {
        KeyCode::Esc => {
            if app.error_message.is_some() {
                app.clear_error();
            } else {
                app.skip_reveal();
            }
        }
        KeyCode::Enter => return app.send_message().await,
        KeyCode::PageUp => app.scroll_chat_up(10),
        KeyCode::PageDown => app.scroll_chat_down(10),
        KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::Char(c) => app.insert_char(c),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Delete => app.delete_char_forward(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_start(),
        KeyCode::End => app.move_cursor_end(),
        _ => {}
    }
    None
}
