//! Clap derive structures for the `obsdeck` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// obsdeck -- remote control for OBS Studio
#[derive(Debug, Parser)]
#[command(
    name = "obsdeck",
    version,
    about = "Control OBS Studio from the command line",
    long_about = "Drive a live OBS Studio instance over obs-websocket v5.\n\n\
        Scene switching, audio mixing, outputs, PTZ cameras and the\n\
        start / end / panic service macros, one command at a time or\n\
        as a live `watch` feed.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config profile to use
    #[arg(long, short = 'p', env = "OBSDECK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Saved connection preset to use instead of a profile
    #[arg(long, short = 'P', global = true, conflicts_with = "profile")]
    pub preset: Option<String>,

    /// OBS host (overrides profile)
    #[arg(long, short = 'H', env = "OBSDECK_HOST", global = true)]
    pub host: Option<String>,

    /// obs-websocket port (overrides profile)
    #[arg(long, env = "OBSDECK_PORT", global = true)]
    pub port: Option<u16>,

    /// obs-websocket password (overrides profile)
    #[arg(long, env = "OBSDECK_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Connect with wss:// instead of ws://
    #[arg(long, env = "OBSDECK_SECURE", global = true)]
    pub secure: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "OBSDECK_OUTPUT",
        default_value = "text",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    Text,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stay connected and print state changes until Ctrl-C
    #[command(alias = "w")]
    Watch(WatchArgs),

    #[command(flatten)]
    Control(ControlCommand),

    /// Manage saved connection presets
    Presets(PresetsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// One-shot commands: connect, act, disconnect.
#[derive(Debug, Subcommand)]
pub enum ControlCommand {
    /// Show stream, recording and engine health
    #[command(alias = "st")]
    Status,

    /// List scenes
    #[command(alias = "ls")]
    Scenes,

    /// Select a scene (staged in preview under studio mode)
    Scene {
        /// Scene name
        name: String,
    },

    /// List audio channels
    Audio,

    /// Mute or unmute an audio channel
    Mute {
        /// Audio channel name
        channel: String,

        /// Unmute instead of mute
        #[arg(long, short = 'u')]
        unmute: bool,
    },

    /// Set an audio channel's volume
    Volume {
        /// Audio channel name
        channel: String,

        /// Volume multiplier, 0.0 to 1.0
        volume: f64,
    },

    /// Apply a named audio preset
    Preset {
        /// Preset name (worship, sermon, service, or one from config)
        name: String,
    },

    /// Turn studio mode on or off
    Studio {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Show or change the scene transition
    Transition(TransitionArgs),

    /// Commit the preview scene to program
    Cut,

    /// Toggle streaming
    Stream,

    /// Toggle recording
    Record,

    /// Run the start-of-service macro
    Start,

    /// Run the end-of-service macro
    End,

    /// Stop everything and cut to the panic scene
    Panic,

    /// Control a PTZ camera through the vendor plugin
    Ptz(PtzArgs),

    /// Replace the text of a text source
    Text {
        /// Text input name
        input: String,

        /// New text
        text: String,
    },

    /// Show a source in the current program scene
    Show {
        /// Source name
        source: String,
    },

    /// Hide a source in the current program scene
    Hide {
        /// Source name
        source: String,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Also print stream/record health on every heartbeat
    #[arg(long, short = 's')]
    pub status: bool,
}

// ── Transition ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TransitionArgs {
    /// Transition style (e.g. Fade, Cut)
    #[arg(long, short = 's')]
    pub style: Option<String>,

    /// Duration in milliseconds (capped at 2000)
    #[arg(long, short = 'd')]
    pub duration: Option<u32>,
}

// ── PTZ ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PtzArgs {
    #[command(subcommand)]
    pub command: PtzCommand,
}

#[derive(Debug, Subcommand)]
pub enum PtzCommand {
    /// Relative pan/tilt
    Move {
        /// Pan step (negative is left)
        #[arg(allow_hyphen_values = true)]
        x: f64,
        /// Tilt step (negative is down)
        #[arg(allow_hyphen_values = true)]
        y: f64,
    },

    /// Relative zoom
    Zoom {
        /// Zoom step (negative zooms out)
        #[arg(allow_hyphen_values = true)]
        z: f64,
    },

    /// Switch focus mode
    Focus {
        #[arg(value_enum)]
        mode: FocusMode,
    },

    /// Save the current position as a camera preset
    Save { name: String },

    /// Recall a camera preset
    Recall { name: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FocusMode {
    Auto,
    Manual,
}

// ── Presets ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PresetsArgs {
    #[command(subcommand)]
    pub command: PresetsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PresetsCommand {
    /// List saved connection presets
    #[command(alias = "ls")]
    List,

    /// Save a connection preset (replaces one with the same name)
    Add {
        /// Preset name
        name: String,

        /// OBS host
        host: String,

        /// obs-websocket port
        #[arg(long, default_value_t = obsdeck_api::DEFAULT_PORT)]
        port: u16,

        /// obs-websocket password
        #[arg(long)]
        password: Option<String>,
    },

    /// Delete a connection preset
    #[command(alias = "rm")]
    Remove {
        /// Preset name
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
