//! Connection resolution for the CLI.
//!
//! Flags and `OBSDECK_*` env vars win over a saved preset, which wins
//! over the selected config profile.

use secrecy::SecretString;

use obsdeck_config::presets::{FallbackPresetStore, PresetStore};
use obsdeck_config::{Config, ConfigError, config_path, profile_to_target};
use obsdeck_core::{ConnectTarget, DEFAULT_PORT, TransportConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything needed to open a session.
pub struct Connection {
    pub target: ConnectTarget,
    pub transport: TransportConfig,
}

pub async fn resolve_connection(global: &GlobalOpts, cfg: &Config) -> Result<Connection, CliError> {
    if let Some(host) = global.host.as_deref() {
        let target = ConnectTarget::new(host, global.port.unwrap_or(DEFAULT_PORT));
        return Ok(Connection {
            target: apply_overrides(target, global),
            transport: cfg.transport_config(None),
        });
    }

    if let Some(name) = global.preset.as_deref() {
        let store = FallbackPresetStore::from_config(cfg.cloud.as_ref());
        let preset = store
            .list()
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| CliError::NotFound {
                resource_type: "preset".into(),
                identifier: name.to_owned(),
                list_command: "presets list".into(),
            })?;
        let mut target = preset.to_target();
        if let Some(port) = global.port {
            target.port = port;
        }
        return Ok(Connection {
            target: apply_overrides(target, global),
            transport: cfg.transport_config(None),
        });
    }

    let (name, profile) = match cfg.profile(global.profile.as_deref()) {
        Ok(found) => found,
        Err(ConfigError::UnknownProfile { name }) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(cfg),
            });
        }
        Err(ConfigError::UnknownProfile { .. } | ConfigError::NoProfile) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let mut target = profile_to_target(profile, &name)?;
    if let Some(port) = global.port {
        target.port = port;
    }
    Ok(Connection {
        target: apply_overrides(target, global),
        transport: cfg.transport_config(Some(profile)),
    })
}

fn apply_overrides(mut target: ConnectTarget, global: &GlobalOpts) -> ConnectTarget {
    if let Some(password) = global.password.as_deref() {
        target = target.with_password(SecretString::from(password.to_owned()));
    }
    if global.secure {
        target = target.with_secure(true);
    }
    target
}

fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    names.sort_unstable();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}
