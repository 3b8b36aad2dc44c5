// ── Mirrored OBS state ──
//
// Value types held by the state cache and handed to observers as
// immutable snapshots.

pub mod audio;
pub mod connection;
pub mod log;
pub mod output;
pub mod scene;

// ── Re-exports ──────────────────────────────────────────────────────

pub use audio::{AudioChannel, InputInfo};
pub use connection::ConnectionState;
pub use log::{LogEntry, Severity};
pub use output::{MAX_TRANSITION_MS, StreamStatus, TransitionConfig};
pub use scene::Scene;
