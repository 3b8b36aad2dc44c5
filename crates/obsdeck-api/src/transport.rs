// Shared transport configuration and connection targets.
//
// A `ConnectTarget` says *where* the remote engine lives and how to
// authenticate; `TransportConfig` carries per-link tuning.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::Error;

/// Default obs-websocket port (OBS 28+).
pub const DEFAULT_PORT: u16 = 4455;

/// Tuning shared by every link a connector opens.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long a single request may stay unanswered before it fails.
    pub request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Address + credential for one remote engine.
#[derive(Debug, Clone)]
pub struct ConnectTarget {
    /// Host name or IP. May already carry a `ws://` / `wss://` scheme.
    pub host: String,
    pub port: u16,
    pub password: Option<SecretString>,
    /// Use `wss://` instead of `ws://` when `host` has no scheme.
    pub secure: bool,
}

impl ConnectTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            password: None,
            secure: false,
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Build the WebSocket URL for this target.
    ///
    /// A host that already names a scheme is used verbatim with the port
    /// appended; otherwise the scheme follows `secure`.
    pub fn url(&self) -> Result<Url, Error> {
        let host = self.host.trim().trim_end_matches('/');
        let raw = if host.starts_with("ws://") || host.starts_with("wss://") {
            format!("{host}:{}", self.port)
        } else {
            let scheme = if self.secure { "wss" } else { "ws" };
            format!("{scheme}://{host}:{}", self.port)
        };
        Ok(Url::parse(&raw)?)
    }

    /// `host:port` key, used in logs and preset lookups.
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn plain_host_gets_ws_scheme() {
        let url = ConnectTarget::new("192.168.1.10", 4455).url().unwrap();
        assert_eq!(url.as_str(), "ws://192.168.1.10:4455/");
    }

    #[test]
    fn secure_flag_selects_wss() {
        let url = ConnectTarget::new("obs.local", 443)
            .with_secure(true)
            .url()
            .unwrap();
        assert_eq!(url.scheme(), "wss");
        // 443 is the default for wss, so the URL elides it
        assert_eq!(url.port(), None);
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let url = ConnectTarget::new("wss://studio.example.org", 4455)
            .url()
            .unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.host_str(), Some("studio.example.org"));
        assert_eq!(url.port(), Some(4455));
    }

    #[test]
    fn garbage_host_is_rejected() {
        assert!(ConnectTarget::new("not a host", 4455).url().is_err());
    }

    #[test]
    fn key_is_host_and_port() {
        assert_eq!(ConnectTarget::new("localhost", 4455).key(), "localhost:4455");
    }
}
