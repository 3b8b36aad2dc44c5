use serde::Serialize;
use strum::{Display, EnumString};

/// Lifecycle of the control-channel session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Link lost; retries continue until `disconnect()` or success.
    Reconnecting,
    /// First connection attempt failed. Terminal until an explicit reconnect.
    Error,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}
