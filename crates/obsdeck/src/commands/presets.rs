//! Saved connection preset handlers. No OBS connection needed.

use serde::Serialize;

use obsdeck_config::presets::{ConnectionPreset, FallbackPresetStore, PresetStore};

use crate::cli::{GlobalOpts, PresetsArgs, PresetsCommand};
use crate::error::CliError;
use crate::output;

use super::done;

/// What `presets list` shows; the credential itself never leaves the store.
#[derive(Serialize)]
struct PresetRow<'a> {
    name: &'a str,
    host: &'a str,
    port: u16,
    has_password: bool,
}

impl<'a> From<&'a ConnectionPreset> for PresetRow<'a> {
    fn from(p: &'a ConnectionPreset) -> Self {
        Self {
            name: &p.name,
            host: &p.host,
            port: p.port,
            has_password: p.credential.as_deref().is_some_and(|c| !c.is_empty()),
        }
    }
}

pub async fn handle(args: PresetsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = obsdeck_config::load_config()?;
    let store = FallbackPresetStore::from_config(cfg.cloud.as_ref());

    match args.command {
        PresetsCommand::List => {
            let presets = store.list().await?;
            let rows: Vec<PresetRow<'_>> = presets.iter().map(PresetRow::from).collect();
            let rendered = output::render(&global.output, rows.as_slice(), |rows| {
                if rows.is_empty() {
                    return "No saved presets".into();
                }
                rows.iter()
                    .map(|r| {
                        let lock = if r.has_password { "  (password)" } else { "" };
                        format!("{}  {}:{}{lock}", r.name, r.host, r.port)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
            output::print_output(&rendered, global.quiet);
        }

        PresetsCommand::Add {
            name,
            host,
            port,
            password,
        } => {
            let mut preset = ConnectionPreset::new(&name, host, port);
            if let Some(password) = password {
                preset = preset.with_credential(password);
            }
            store.save(&preset).await?;
            done(global, &format!("Preset saved: {name}"));
        }

        PresetsCommand::Remove { name } => {
            store.delete(&name).await?;
            done(global, &format!("Preset removed: {name}"));
        }
    }
    Ok(())
}
