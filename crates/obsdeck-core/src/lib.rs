//! Session, reconnect and state-sync core for the obsdeck OBS dashboard.
//!
//! This crate owns the connection lifecycle and the mirrored engine state
//! that every UI surface (CLI, future TUI) reads from:
//!
//! - **[`Session`]**: explicitly constructed per remote engine with an
//!   injected [`obsdeck_api::Connector`]. [`connect()`](Session::connect)
//!   opens a link, performs a full refresh and starts the heartbeat; drops
//!   move the session to `Reconnecting` and are retried until
//!   [`disconnect()`](Session::disconnect).
//!
//! - **[`EventBus`]**: topic-keyed observer lists invoked synchronously in
//!   subscription order. Stateful topics replay their current value on
//!   subscribe; revisions guarantee no observer sees an older snapshot
//!   after a newer one.
//!
//! - **Command facade**: scene, audio, transition, output, PTZ and
//!   overlay commands on [`Session`]. Optimistic cache writes, failures
//!   absorbed into the operator log feed.
//!
//! - **Macros**: [`start_service`](Session::start_service),
//!   [`end_service`](Session::end_service) and [`panic`](Session::panic),
//!   plus the scene-driven exclusive-audio rule.

pub mod bus;
pub mod config;
pub mod error;
pub mod model;

mod commands;
mod convert;
mod heartbeat;
mod log_feed;
mod macros;
mod session;
mod store;
mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bus::{Callback, EventBus, SubscriptionId, Topic, Update};
pub use config::{
    AudioPreset, ChannelSetting, ExclusiveAudio, SceneRoles, SessionSettings, builtin_presets,
};
pub use error::CoreError;
pub use session::Session;

pub use model::{
    AudioChannel, ConnectionState, InputInfo, LogEntry, MAX_TRANSITION_MS, Scene, Severity,
    StreamStatus, TransitionConfig,
};

// The transport types callers need to build a session.
pub use obsdeck_api::{ConnectTarget, Connector, DEFAULT_PORT, Link, Signal, TransportConfig};
