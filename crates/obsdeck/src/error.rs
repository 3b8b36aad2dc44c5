//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError`, `ConfigError` and `PresetError` into user-facing
//! errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use obsdeck_config::ConfigError;
use obsdeck_config::presets::PresetError;
use obsdeck_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to OBS at {target}")]
    #[diagnostic(
        code(obsdeck::connection_failed),
        help(
            "Check that OBS is running with the WebSocket server enabled\n\
             (Tools > WebSocket Server Settings).\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { target: String, reason: String },

    #[error("Not connected to OBS")]
    #[diagnostic(
        code(obsdeck::disconnected),
        help("The connection dropped before the command finished. Try again.")
    )]
    NotConnected,

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(obsdeck::auth_failed),
        help(
            "Pass --password, set OBSDECK_PASSWORD, or configure password_env\n\
             in your profile. The password is under Tools > WebSocket Server\n\
             Settings > Show Connect Info."
        )
    )]
    AuthFailed { message: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(obsdeck::not_found),
        help("Run: obsdeck {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Remote ───────────────────────────────────────────────────────

    #[error("OBS rejected {request_type} (code {code}): {message}")]
    #[diagnostic(code(obsdeck::rejected))]
    Rejected {
        request_type: String,
        code: u16,
        message: String,
    },

    #[error("{request_type} timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(obsdeck::timeout),
        help("Raise request_timeout in the config or check that OBS is responsive.")
    )]
    Timeout {
        request_type: String,
        timeout_ms: u64,
    },

    #[error("{0}")]
    #[diagnostic(code(obsdeck::session))]
    Session(String),

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(obsdeck::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(obsdeck::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No OBS connection configured")]
    #[diagnostic(
        code(obsdeck::no_config),
        help(
            "Pass --host (and --password), use --preset, or add a profile to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(obsdeck::config))]
    Config(ConfigError),

    #[error(transparent)]
    #[diagnostic(code(obsdeck::presets))]
    Presets(#[from] PresetError),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(obsdeck::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { target, reason } => {
                CliError::ConnectionFailed { target, reason }
            }

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Disconnected | CoreError::NotConfigured | CoreError::Superseded => {
                CliError::NotConnected
            }

            CoreError::Timeout {
                request_type,
                timeout_ms,
            } => CliError::Timeout {
                request_type,
                timeout_ms,
            },

            CoreError::Rejected {
                request_type,
                code,
                comment,
            } => CliError::Rejected {
                request_type,
                code,
                message: comment,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            err @ (CoreError::InvalidResponse { .. } | CoreError::Internal(_)) => {
                CliError::Session(err.to_string())
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
