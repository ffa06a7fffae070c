//! Connection lifecycle for the backend WebSocket.
//!
//! Two layers:
//!
//! - [`ConnectionMachine`] is a synchronous state machine. Lifecycle inputs
//!   (connect, open, loss, reconnect timer, disconnect) update its fields and
//!   return a [`ConnectionAction`] for the caller to carry out.
//! - [`ConnectionManager`] is a handle to a spawned task that owns the
//!   transport, the machine and the single reconnect timer. Consumers only see
//!   the published [`ConnectionStatus`] and the parsed inbound messages.
//!
//! ```text
//! disconnected --connect--> connecting --open--> connected
//!      ^                        |                   |
//!      +-------- failure -------+------ loss -------+
//!      |
//!      +-- reconnect timer (fixed delay, bounded attempts) --> connecting
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::error::TransportError;
use crate::types::{ClientMessage, ServerMessage};

/// Inbound messages buffered for the consumer. Frames beyond this are dropped.
pub const INBOUND_CAPACITY: usize = 128;

// =============================================================================
// State
// =============================================================================

/// Connection state shown to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Opening the transport.
    Connecting,
    /// Transport is open; sends are allowed.
    Connected,
    /// No transport.
    #[default]
    Disconnected,
}

impl ConnectionState {
    /// Human-readable display string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
        }
    }
}

/// Reconnection policy: fixed delay, bounded attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Whether unexpected closure triggers reconnection at all.
    pub enabled: bool,
    /// Delay before each reconnect attempt.
    pub interval: Duration,
    /// Maximum consecutive reconnect attempts.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(3),
            max_attempts: 5,
        }
    }
}

/// Snapshot published to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    /// Current state.
    pub state: ConnectionState,
    /// Reconnect attempts since the last successful open.
    pub attempts: u32,
    /// Retries are used up; only an explicit connect recovers.
    pub exhausted: bool,
}

/// What the owner of the transport must do after an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Nothing.
    None,
    /// Open the transport.
    Open,
    /// Close the transport and cancel any scheduled reconnect.
    Close,
    /// Arm the reconnect timer.
    ScheduleReconnect(Duration),
}

/// Connection lifecycle state machine.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    policy: ReconnectPolicy,
    attempts: u32,
    closed_by_caller: bool,
    reconnect_pending: bool,
}

impl ConnectionMachine {
    /// Create a disconnected machine.
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            policy,
            attempts: 0,
            closed_by_caller: false,
            reconnect_pending: false,
        }
    }

    /// Explicit connect request. No-op while connecting or connected.
    ///
    /// Restores the full retry budget.
    pub fn connect(&mut self) -> ConnectionAction {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return ConnectionAction::None;
        }
        self.closed_by_caller = false;
        self.reconnect_pending = false;
        self.attempts = 0;
        self.state = ConnectionState::Connecting;
        ConnectionAction::Open
    }

    /// The transport opened.
    pub fn on_open(&mut self) {
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        self.reconnect_pending = false;
    }

    /// The transport failed to open, closed, or errored.
    pub fn on_lost(&mut self) -> ConnectionAction {
        self.state = ConnectionState::Disconnected;
        if self.closed_by_caller || !self.policy.enabled {
            return ConnectionAction::None;
        }
        if self.attempts >= self.policy.max_attempts {
            self.reconnect_pending = false;
            return ConnectionAction::None;
        }
        self.attempts += 1;
        self.reconnect_pending = true;
        ConnectionAction::ScheduleReconnect(self.policy.interval)
    }

    /// The reconnect timer fired.
    pub fn on_reconnect_due(&mut self) -> ConnectionAction {
        let due = self.reconnect_pending
            && !self.closed_by_caller
            && self.state == ConnectionState::Disconnected;
        self.reconnect_pending = false;
        if !due {
            return ConnectionAction::None;
        }
        self.state = ConnectionState::Connecting;
        ConnectionAction::Open
    }

    /// Caller-initiated close. Suppresses automatic reconnection.
    pub fn disconnect(&mut self) -> ConnectionAction {
        self.closed_by_caller = true;
        self.reconnect_pending = false;
        self.state = ConnectionState::Disconnected;
        ConnectionAction::Close
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts since the last successful open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether a reconnect is scheduled.
    #[must_use]
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Whether sends are allowed.
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Whether automatic recovery has given up.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.state == ConnectionState::Disconnected
            && !self.closed_by_caller
            && !self.reconnect_pending
            && self.policy.enabled
            && self.attempts >= self.policy.max_attempts
    }

    /// Snapshot for consumers.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            attempts: self.attempts,
            exhausted: self.is_exhausted(),
        }
    }
}

// =============================================================================
// Transport Seam
// =============================================================================

/// An open, ordered, bidirectional text channel.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound text frame. `None` means the peer closed the channel.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the channel.
    async fn close(&mut self);
}

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Transport produced by this connector.
    type Transport: Transport;

    /// Open a new transport.
    async fn open(&self) -> Result<Self::Transport, TransportError>;
}

// =============================================================================
// Manager
// =============================================================================

#[derive(Debug)]
enum Command {
    Connect,
    Send(String),
    Disconnect,
}

/// Handle to the connection task.
///
/// Dropping the handle closes the transport and stops the task.
#[derive(Debug)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl ConnectionManager {
    /// Spawn the connection task. The transport is not opened until
    /// [`connect`](Self::connect) is called.
    ///
    /// Returns the handle and a receiver of parsed inbound messages.
    pub fn spawn<C: Connector>(
        connector: C,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let (message_tx, message_rx) = mpsc::channel(INBOUND_CAPACITY);

        let driver = Driver {
            connector: Arc::new(connector),
            machine: ConnectionMachine::new(policy),
            status: status_tx,
            messages: message_tx,
            reconnect_at: None,
        };
        tokio::spawn(driver.run(command_rx));

        (
            Self {
                commands: command_tx,
                status: status_rx,
            },
            message_rx,
        )
    }

    /// Open the transport if not already open or opening.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Close the transport and stop reconnecting.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Send a message if connected.
    ///
    /// Returns `false` and drops the message when not connected; nothing is
    /// queued for later delivery.
    pub fn send(&self, message: &ClientMessage) -> bool {
        if self.state() != ConnectionState::Connected {
            tracing::warn!(state = self.state().as_str(), "Not connected, message dropped");
            return false;
        }
        match serde_json::to_string(message) {
            Ok(json) => self.commands.send(Command::Send(json)).is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode message");
                false
            }
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Receiver notified on every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }
}

type OpenFuture<T> = BoxFuture<'static, Result<T, TransportError>>;

/// Task state. The transport and the in-flight open live in `run` as locals.
struct Driver<C: Connector> {
    connector: Arc<C>,
    machine: ConnectionMachine,
    status: watch::Sender<ConnectionStatus>,
    messages: mpsc::Sender<ServerMessage>,
    /// The single reconnect timer.
    reconnect_at: Option<Instant>,
}

impl<C: Connector> Driver<C> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut transport: Option<C::Transport> = None;
        let mut opening: Option<OpenFuture<C::Transport>> = None;

        loop {
            let reconnect_at = self.reconnect_at;

            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    match command {
                        Command::Connect => {
                            if self.machine.connect() == ConnectionAction::Open {
                                tracing::info!("Connecting");
                                self.reconnect_at = None;
                                opening = Some(self.open());
                            } else {
                                tracing::debug!(state = self.machine.state().as_str(), "Connect ignored");
                            }
                        }
                        Command::Disconnect => {
                            self.machine.disconnect();
                            self.reconnect_at = None;
                            opening = None;
                            if let Some(mut t) = transport.take() {
                                t.close().await;
                            }
                            tracing::info!("Disconnected by caller");
                        }
                        Command::Send(json) => {
                            let failed = match transport.as_mut() {
                                Some(t) if self.machine.can_send() => t.send(json).await.err(),
                                _ => {
                                    tracing::warn!("Not connected, message dropped");
                                    None
                                }
                            };
                            if let Some(e) = failed {
                                tracing::warn!(error = %e, "Send failed, treating as connection loss");
                                transport = None;
                                self.lost();
                            }
                        }
                    }
                }

                result = poll_opening(&mut opening) => {
                    opening = None;
                    match result {
                        Ok(t) => {
                            transport = Some(t);
                            self.machine.on_open();
                            tracing::info!("Connected");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Connection attempt failed");
                            self.lost();
                        }
                    }
                }

                frame = recv_frame(&mut transport) => match frame {
                    Some(Ok(text)) => self.deliver(&text),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Transport error");
                        transport = None;
                        self.lost();
                    }
                    None => {
                        tracing::info!("Connection closed by peer");
                        transport = None;
                        self.lost();
                    }
                },

                () = sleep_until(reconnect_at), if self.machine.reconnect_pending() => {
                    self.reconnect_at = None;
                    if self.machine.on_reconnect_due() == ConnectionAction::Open {
                        tracing::info!(
                            attempt = self.machine.attempts(),
                            "Attempting to reconnect"
                        );
                        opening = Some(self.open());
                    }
                }
            }

            self.publish();
        }

        if let Some(mut t) = transport.take() {
            t.close().await;
        }
        tracing::debug!("Connection task stopped");
    }

    fn open(&self) -> OpenFuture<C::Transport> {
        let connector = Arc::clone(&self.connector);
        Box::pin(async move { connector.open().await })
    }

    fn lost(&mut self) {
        match self.machine.on_lost() {
            ConnectionAction::ScheduleReconnect(delay) => {
                tracing::info!(
                    attempt = self.machine.attempts(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Reconnect scheduled"
                );
                self.reconnect_at = Some(Instant::now() + delay);
            }
            _ => {
                self.reconnect_at = None;
                if self.machine.is_exhausted() {
                    tracing::warn!(
                        attempts = self.machine.attempts(),
                        "Reconnect attempts exhausted"
                    );
                }
            }
        }
    }

    /// Hand a frame to the consumer without blocking the task.
    fn deliver(&self, text: &str) {
        let message = match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, text = %text, "Dropping malformed message");
                return;
            }
        };
        match self.messages.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(capacity = INBOUND_CAPACITY, "Inbound queue full, message dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Inbound receiver gone, message dropped");
            }
        }
    }

    fn publish(&self) {
        let next = self.machine.status();
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

async fn poll_opening<T>(opening: &mut Option<OpenFuture<T>>) -> Result<T, TransportError> {
    match opening.as_mut() {
        Some(fut) => fut.await,
        None => pending().await,
    }
}

async fn recv_frame<T: Transport>(
    transport: &mut Option<T>,
) -> Option<Result<String, TransportError>> {
    match transport.as_mut() {
        Some(t) => t.recv().await,
        None => pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => pending().await,
    }
}

fn pending<T>() -> impl Future<Output = T> {
    std::future::pending()
}
