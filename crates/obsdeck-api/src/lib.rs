// obsdeck-api: async obs-websocket v5 client and the transport seam the session core is built on

pub mod binding;
pub mod error;
pub mod event;
pub mod protocol;
pub mod transport;
pub mod websocket;

pub use binding::{Connector, Link, Signal};
pub use error::Error;
pub use event::RemoteEvent;
pub use transport::{ConnectTarget, DEFAULT_PORT, TransportConfig};
pub use websocket::{ObsClient, WebSocketConnector};
