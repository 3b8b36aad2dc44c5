use thiserror::Error;

/// Top-level error type for the `obsdeck-api` crate.
///
/// Covers every failure mode of the control channel: socket setup,
/// the obs-websocket handshake, individual request rejections, and
/// frame decoding. `obsdeck-core` maps these into session-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// The WebSocket could not be opened (refused, DNS, TLS, ...).
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The target address could not be turned into a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The socket closed while a request was outstanding, or a call was
    /// made on a link that is already closed.
    #[error("Connection closed: {reason}")]
    ConnectionClosed { reason: String },

    // ── Handshake ───────────────────────────────────────────────────
    /// The server demanded authentication and none (or the wrong one) was given.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The server sent something other than the expected handshake frame.
    #[error("Protocol error: expected {expected}, got op {got}")]
    UnexpectedOp { expected: &'static str, got: u8 },

    // ── Requests ────────────────────────────────────────────────────
    /// The remote engine rejected a request (`requestStatus.result == false`).
    #[error("Request {request_type} failed (code {code}): {comment}")]
    Request {
        request_type: String,
        code: u16,
        comment: String,
    },

    /// No response arrived within the transport's request timeout.
    #[error("Request {request_type} timed out after {timeout_ms}ms")]
    Timeout {
        request_type: String,
        timeout_ms: u64,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// A frame or payload could not be decoded.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the error means the link itself is gone, as
    /// opposed to one request being refused.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed { .. } | Self::WebSocketConnect(_) | Self::Timeout { .. }
        )
    }

    /// The obs-websocket status code, if the remote rejected the request.
    pub fn request_code(&self) -> Option<u16> {
        match self {
            Self::Request { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Deserialization {
            message: err.to_string(),
            body: String::new(),
        }
    }
}
