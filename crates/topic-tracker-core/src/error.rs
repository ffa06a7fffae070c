//! Error types shared across the tracker client.
//!
//! Transport failures never reach the UI as typed errors; they only show up as
//! a [`ConnectionState`](crate::ConnectionState) transition. The types here
//! cover the request/response surface and the transport seam itself.

use thiserror::Error;

/// Errors from the REST and streamed-response surface of the backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The backend's `detail` field, when present.
        message: String,
    },

    /// Failed to parse a response body.
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// Errors raised by a [`Transport`](crate::connection::Transport) or
/// [`Connector`](crate::connection::Connector).
///
/// The connection manager treats every variant as connection loss.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport could not be opened.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading from the transport failed.
    #[error("receive failed: {0}")]
    Receive(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The backend URL is not an `http://` or `https://` URL.
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),

    /// A configured value is out of range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
