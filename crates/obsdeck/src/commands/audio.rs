//! Audio mixer command handlers.

use obsdeck_core::Session;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::done;

pub fn list(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let channels = session.audio_sources();
    let color = output::should_color(&global.color);
    let rendered = output::render(&global.output, channels.as_slice(), |c| {
        output::audio_text(c, color)
    })?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn mute(
    session: &Session,
    channel: &str,
    muted: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    require_channel(session, channel)?;
    session.set_audio_mute(channel, muted).await;
    done(
        global,
        &format!("{channel}: {}", if muted { "muted" } else { "live" }),
    );
    Ok(())
}

pub async fn volume(
    session: &Session,
    channel: &str,
    volume: f64,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !(0.0..=1.0).contains(&volume) {
        return Err(CliError::Validation {
            field: "volume".into(),
            reason: format!("{volume} is outside 0.0..=1.0"),
        });
    }
    require_channel(session, channel)?;
    session.set_audio_volume(channel, volume).await;
    done(global, &format!("{channel}: {:.0}%", volume * 100.0));
    Ok(())
}

pub async fn preset(session: &Session, name: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let presets = &session.settings().audio_presets;
    if !presets.contains_key(name) {
        let available: Vec<&str> = presets.keys().map(String::as_str).collect();
        return Err(CliError::Validation {
            field: "preset".into(),
            reason: format!(
                "unknown audio preset '{name}' (available: {})",
                available.join(", ")
            ),
        });
    }
    session.apply_audio_preset(name).await?;
    done(global, &format!("Audio preset applied: {name}"));
    Ok(())
}

fn require_channel(session: &Session, channel: &str) -> Result<(), CliError> {
    if session.audio_sources().iter().any(|c| c.name == channel) {
        Ok(())
    } else {
        Err(CliError::NotFound {
            resource_type: "audio channel".into(),
            identifier: channel.to_owned(),
            list_command: "audio".into(),
        })
    }
}
