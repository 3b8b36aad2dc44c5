//! Output formatting: text and JSON.
//!
//! Text output is colored by severity/state when enabled; JSON output
//! serializes the core snapshots as they are.

use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use chrono::Local;
use owo_colors::OwoColorize;

use obsdeck_core::{AudioChannel, ConnectionState, LogEntry, Scene, Severity, StreamStatus};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatch ──────────────────────────────────────────────────

/// Render `data` as JSON, or with `text_fn` for the text format.
pub fn render<T>(
    format: &OutputFormat,
    data: &T,
    text_fn: impl FnOnce(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    Ok(match format {
        OutputFormat::Text => text_fn(data),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Text renderers ───────────────────────────────────────────────────

pub fn scenes_text(scenes: &[Scene], program: Option<&str>, preview: Option<&str>, color: bool) -> String {
    scenes
        .iter()
        .map(|scene| {
            let marker = if Some(scene.name.as_str()) == program {
                "●"
            } else if Some(scene.name.as_str()) == preview {
                "◐"
            } else {
                " "
            };
            let line = format!("{marker} {}", scene.name);
            match (color, marker) {
                (true, "●") => line.red().bold().to_string(),
                (true, "◐") => line.green().to_string(),
                _ => line,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn audio_text(channels: &[AudioChannel], color: bool) -> String {
    let width = channels.iter().map(|c| c.name.chars().count()).max().unwrap_or(0);
    channels
        .iter()
        .map(|c| {
            let state = if c.muted { "muted" } else { "live" };
            let state = match (color, c.muted) {
                (true, true) => state.dimmed().to_string(),
                (true, false) => state.green().bold().to_string(),
                _ => state.to_owned(),
            };
            format!("{:<width$}  {:>4.0}%  {state}", c.name, c.volume * 100.0)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn status_text(status: &StreamStatus, color: bool) -> String {
    let onair = |active: bool, label: &str| {
        let text = if active { format!("{label} ON") } else { format!("{label} off") };
        if color && active {
            text.red().bold().to_string()
        } else {
            text
        }
    };
    let resolution = if status.resolution.is_empty() {
        "?"
    } else {
        status.resolution.as_str()
    };
    format!(
        "{} {}  {} {}\ncpu {:.1}%  mem {} MB  {} kbps  {:.0} fps  {resolution}",
        onair(status.streaming, "stream"),
        format_elapsed(status.stream_elapsed),
        onair(status.recording, "record"),
        format_elapsed(status.record_elapsed),
        status.cpu_percent,
        status.memory_bytes / (1024 * 1024),
        status.bitrate_bps / 1000,
        status.fps,
    )
}

pub fn log_entry_text(entry: &LogEntry, color: bool) -> String {
    let time = entry.timestamp.with_timezone(&Local).format("%H:%M:%S");
    let label = format!("{:<7}", entry.severity.to_string());
    let label = if color {
        match entry.severity {
            Severity::Info => label.blue().to_string(),
            Severity::Success => label.green().to_string(),
            Severity::Warning => label.yellow().to_string(),
            Severity::Error => label.red().bold().to_string(),
        }
    } else {
        label
    };
    format!("[{time}] {label} {}", entry.message)
}

pub fn state_text(state: ConnectionState, color: bool) -> String {
    let text = format!("connection: {state}");
    if !color {
        return text;
    }
    match state {
        ConnectionState::Connected => text.green().to_string(),
        ConnectionState::Connecting | ConnectionState::Reconnecting => text.yellow().to_string(),
        ConnectionState::Error => text.red().to_string(),
        ConnectionState::Disconnected => text.dimmed().to_string(),
    }
}

/// `HH:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_clock_style() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn scenes_mark_program_and_preview() {
        let scenes = vec![
            Scene { name: "Abertura".into(), index: 1 },
            Scene { name: "Principal".into(), index: 0 },
        ];
        let text = scenes_text(&scenes, Some("Principal"), Some("Abertura"), false);
        assert_eq!(text, "◐ Abertura\n● Principal");
    }

    #[test]
    fn audio_lines_show_percent_and_state() {
        let channels = vec![
            AudioChannel::new("Mic", 0.5, true),
            AudioChannel::new("Desk", 1.0, false),
        ];
        let text = audio_text(&channels, false);
        assert_eq!(text, "Mic     50%  muted\nDesk   100%  live");
    }
}
