// ── Core error types ──
//
// Session-level errors. Consumers never see raw frames or socket errors;
// the `From<obsdeck_api::Error>` impl folds transport failures into
// these variants. Only `connect`/`reconnect` surface errors to callers --
// facade commands absorb theirs into the log feed.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to OBS at {target}: {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not connected to OBS")]
    Disconnected,

    #[error("No connection parameters cached -- call connect() first")]
    NotConfigured,

    /// A newer `connect()` or a `disconnect()` overtook this attempt.
    #[error("Connection attempt superseded")]
    Superseded,

    #[error("Request {request_type} timed out after {timeout_ms}ms")]
    Timeout {
        request_type: String,
        timeout_ms: u64,
    },

    // ── Remote errors ────────────────────────────────────────────────
    #[error("OBS rejected {request_type} (code {code}): {comment}")]
    Rejected {
        request_type: String,
        code: u16,
        comment: String,
    },

    #[error("Unexpected response to {request_type}: {message}")]
    InvalidResponse {
        request_type: String,
        message: String,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The remote status code, if OBS refused the request.
    pub fn remote_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn invalid(request_type: &str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            request_type: request_type.to_owned(),
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<obsdeck_api::Error> for CoreError {
    fn from(err: obsdeck_api::Error) -> Self {
        match err {
            obsdeck_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            obsdeck_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                target: String::new(),
                reason,
            },
            obsdeck_api::Error::ConnectionClosed { .. } => CoreError::Disconnected,
            obsdeck_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid OBS address: {e}"),
            },
            obsdeck_api::Error::UnexpectedOp { expected, got } => CoreError::ConnectionFailed {
                target: String::new(),
                reason: format!("protocol error: expected {expected}, got op {got}"),
            },
            obsdeck_api::Error::Request {
                request_type,
                code,
                comment,
            } => CoreError::Rejected {
                request_type,
                code,
                comment,
            },
            obsdeck_api::Error::Timeout {
                request_type,
                timeout_ms,
            } => CoreError::Timeout {
                request_type,
                timeout_ms,
            },
            obsdeck_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
