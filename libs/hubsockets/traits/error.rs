use std::time::Duration;
use thiserror::Error;

/// Frame codec failure
///
/// A frame that yields at least one candidate is never an error: undecodable
/// candidates are kept as raw placeholders (see `CodecResult::Partial`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// No object/array-looking fragment anywhere in the text
    #[error("no decodable payload in {len} bytes of input")]
    NoPayload { len: usize },
}

/// Negotiate/start request failure
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// Final response was not 2xx
    #[error("handshake rejected with status {status}: {body_prefix}")]
    Status { status: u16, body_prefix: String },

    /// 2xx response, but the codec found nothing to parse
    #[error("handshake response carried no payload")]
    NoPayload,

    /// Payload parsed but neither token field was present
    #[error("handshake response is missing the connection token")]
    MissingToken,

    /// Payload fragment was not a valid negotiate record
    #[error("handshake payload is not valid JSON: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// HTTP transport error after the transport-level retries ran out
    #[error("handshake request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Error raised by a `Dispatcher`; always contained by the session
#[derive(Error, Debug, Clone)]
#[error("dispatch failed: {0}")]
pub struct DispatchError(pub String);

impl DispatchError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Main error type for hubsockets
#[derive(Error, Debug)]
pub enum HubSocketError {
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// Session did not report `Opened` inside the wait window
    #[error("session did not open within {0:?}")]
    OpenTimeout(Duration),

    /// Underlying connection error, heartbeat loss or unexpected close
    #[error("transport fault: {0}")]
    TransportFault(String),

    /// Start confirmation answered with a non-2xx status
    #[error("start confirmation rejected with status {status}")]
    StartRejected { status: u16 },

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// `stop()` (or a newer `start()`) cancelled the operation in flight
    #[error("stopped")]
    Stopped,
}

impl HubSocketError {
    pub fn transport(reason: impl std::fmt::Display) -> Self {
        Self::TransportFault(reason.to_string())
    }
}

/// Result type for hubsockets operations
pub type Result<T> = std::result::Result<T, HubSocketError>;
