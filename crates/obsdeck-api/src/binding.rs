//! Transport seam between the session core and the wire.
//!
//! The core only ever talks to a [`Connector`] (to open links) and a
//! [`Link`] (request/response + push signals). The WebSocket client in
//! [`crate::websocket`] is the production implementation; tests inject
//! in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Error;
use crate::event::RemoteEvent;
use crate::transport::ConnectTarget;

/// Everything a link pushes without being asked.
#[derive(Debug, Clone)]
pub enum Signal {
    /// A push notification from the remote engine.
    Event(RemoteEvent),
    /// A non-fatal problem on the link (bad frame, unexpected op).
    Error { message: String },
    /// The link is gone. Sent at most once per link.
    Closed { reason: String },
}

/// Opens links to a remote engine.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, target: &ConnectTarget) -> Result<Arc<dyn Link>, Error>;
}

/// One live control-channel connection.
///
/// Implementations must allow many `call`s in flight at once: the
/// heartbeat poll and user commands share the same link.
#[async_trait]
pub trait Link: Send + Sync + 'static {
    /// Issue a request and wait for its response data.
    ///
    /// Returns `Value::Null` when the request succeeded without data.
    async fn call(&self, request_type: &str, request_data: Option<Value>)
    -> Result<Value, Error>;

    /// Subscribe to push signals. Signals sent before subscribing are lost,
    /// so callers should check [`is_closed`](Self::is_closed) afterwards.
    fn signals(&self) -> broadcast::Receiver<Arc<Signal>>;

    /// Whether the link has already observed its own closure.
    fn is_closed(&self) -> bool;

    /// Close the link. Idempotent.
    async fn close(&self);
}
