use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;

/// Upper bound for transition duration, in milliseconds.
pub const MAX_TRANSITION_MS: u32 = 2000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransitionConfig {
    pub active: String,
    /// Always within `0..=MAX_TRANSITION_MS`.
    pub duration_ms: u32,
    pub available: BTreeSet<String>,
}

/// Output state plus volatile engine metrics.
///
/// Written only from notifications and polls, never optimistically.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamStatus {
    pub streaming: bool,
    pub recording: bool,
    pub stream_elapsed: Duration,
    pub record_elapsed: Duration,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub bitrate_bps: u64,
    pub fps: f64,
    /// `"1920x1080"`, empty until video settings are known.
    pub resolution: String,
}
