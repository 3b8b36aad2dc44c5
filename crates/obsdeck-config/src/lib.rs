//! Shared configuration for the obsdeck CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! automation settings, and translation to `obsdeck_core` types. Saved
//! connection presets live in [`presets`].

pub mod presets;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use obsdeck_core::{
    AudioPreset, ConnectTarget, ExclusiveAudio, SceneRoles, SessionSettings, TransportConfig,
    builtin_presets,
};

/// Keyring service name for every stored secret.
pub const KEYRING_SERVICE: &str = "obsdeck";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("no profile selected and no default_profile configured")]
    NoProfile,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named OBS instances.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,

    /// Scene roles, the exclusive audio pair, presets and timings.
    #[serde(default)]
    pub automation: Automation,

    /// Cloud table for saved connection presets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<CloudConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
            automation: Automation::default(),
            cloud: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Seconds a single obs-websocket request may stay unanswered.
    #[serde(default = "default_timeout")]
    pub request_timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            request_timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_port() -> u16 {
    obsdeck_core::DEFAULT_PORT
}

/// A named OBS instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Host name or IP, optionally with a `ws://` / `wss://` scheme.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// obs-websocket password (plaintext, prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    #[serde(default)]
    pub secure: bool,

    /// Override the request timeout (seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Everything the macros and the exclusive-audio rule are driven by.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Automation {
    /// Set to `false` to turn the exclusive-audio rule off.
    pub exclusive_audio_enabled: bool,
    pub ptz_vendor: String,
    pub exclusive_audio: ExclusiveAudio,
    pub scenes: SceneRoles,
    /// Merged over the built-in `worship` / `sermon` / `service` presets.
    pub audio_presets: BTreeMap<String, AudioPreset>,
    pub timings: Timings,
}

impl Default for Automation {
    fn default() -> Self {
        Self {
            exclusive_audio_enabled: true,
            ptz_vendor: "obs-ptz".into(),
            exclusive_audio: ExclusiveAudio::default(),
            scenes: SceneRoles::default(),
            audio_presets: BTreeMap::new(),
            timings: Timings::default(),
        }
    }
}

/// Optional overrides of the session's timing constants.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Timings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_failure_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_retry_delay_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_grace_secs: Option<u64>,
}

/// REST table holding shared connection presets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub url: String,

    /// Anonymous API key (plaintext, prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "obsdeck", "obsdeck").map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory for local state (the preset fallback file).
pub fn data_dir() -> PathBuf {
    ProjectDirs::from("org", "obsdeck", "obsdeck")
        .map_or_else(dirs_fallback, |dirs| dirs.data_dir().to_path_buf())
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("obsdeck");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` merged with `OBSDECK_` env vars. A missing file is
/// not an error. Nested keys use a double underscore:
/// `OBSDECK_DEFAULTS__REQUEST_TIMEOUT=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("OBSDECK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the obs-websocket password for a profile.
///
/// Order: `password_env`, then the keyring entry `<profile>/password`,
/// then the plaintext field. `None` means the server has auth disabled.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password")) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    profile.password.clone().map(SecretString::from)
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

/// Resolve the cloud table's API key: env, keyring `cloud/api-key`, plaintext.
pub fn resolve_cloud_key(cloud: &CloudConfig) -> Option<SecretString> {
    if let Some(ref env_name) = cloud.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, "cloud/api-key") {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }
    cloud.api_key.clone().map(SecretString::from)
}

// ── Translation to core types ───────────────────────────────────────

impl Config {
    /// Pick `name`, or the default profile when `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .ok_or(ConfigError::NoProfile)?;
        let profile = self
            .profiles
            .get(&name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.clone() })?;
        Ok((name, profile))
    }

    /// Session settings with every automation override applied.
    pub fn session_settings(&self) -> SessionSettings {
        let auto = &self.automation;
        let mut settings = SessionSettings::default();

        let mut presets = builtin_presets(&auto.exclusive_audio);
        presets.extend(auto.audio_presets.clone());
        settings.audio_presets = presets;
        settings.exclusive_audio = auto
            .exclusive_audio_enabled
            .then(|| auto.exclusive_audio.clone());
        settings.scene_roles = auto.scenes.clone();
        settings.ptz_vendor.clone_from(&auto.ptz_vendor);

        let t = &auto.timings;
        if let Some(ms) = t.heartbeat_interval_ms {
            settings.heartbeat_interval = Duration::from_millis(ms.max(100));
        }
        if let Some(n) = t.heartbeat_failure_threshold {
            settings.heartbeat_failure_threshold = n.max(1);
        }
        if let Some(s) = t.first_retry_delay_secs {
            settings.first_retry_delay = Duration::from_secs(s);
        }
        if let Some(s) = t.retry_delay_secs {
            settings.retry_delay = Duration::from_secs(s);
        }
        if let Some(s) = t.end_grace_secs {
            settings.end_grace = Duration::from_secs(s);
        }
        settings
    }

    /// Transport tuning for a profile (its own timeout wins).
    pub fn transport_config(&self, profile: Option<&Profile>) -> TransportConfig {
        let secs = profile
            .and_then(|p| p.timeout)
            .unwrap_or(self.defaults.request_timeout);
        TransportConfig {
            request_timeout: Duration::from_secs(secs.max(1)),
        }
    }
}

/// Build a `ConnectTarget` from a profile, resolving its password.
pub fn profile_to_target(profile: &Profile, profile_name: &str) -> Result<ConnectTarget, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: format!("profile '{profile_name}' has an empty host"),
        });
    }
    let mut target = ConnectTarget::new(profile.host.trim(), profile.port).with_secure(profile.secure);
    if let Some(password) = resolve_password(profile, profile_name) {
        target = target.with_password(password);
    }
    target.url().map_err(|e| ConfigError::Validation {
        field: "host".into(),
        reason: e.to_string(),
    })?;
    Ok(target)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    const SAMPLE: &str = r#"
default_profile = "church"

[defaults]
request_timeout = 7

[profiles.church]
host = "192.168.1.10"
password = "hunter2"

[automation.exclusive_audio]
channel_a = "Camera Audio"
channel_b = "Desk"
prefer_a = ["movel"]

[automation.scenes]
opening = "Intro"

[automation.audio_presets.sermon]
channels = [{ channel = "Desk", volume = 0.4, muted = false }]

[automation.timings]
end_grace_secs = 2
"#;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.request_timeout, 10);
        assert!(cfg.automation.exclusive_audio_enabled);
    }

    #[test]
    fn file_overrides_are_applied() {
        let file = write_config(SAMPLE);
        let cfg = load_config_from(file.path()).unwrap();

        let (name, profile) = cfg.profile(None).unwrap();
        assert_eq!(name, "church");
        assert_eq!(profile.port, 4455);
        assert_eq!(cfg.transport_config(Some(profile)).request_timeout, Duration::from_secs(7));

        let settings = cfg.session_settings();
        assert_eq!(settings.scene_roles.opening, "Intro");
        assert_eq!(settings.scene_roles.closing, "Final");
        assert_eq!(settings.end_grace, Duration::from_secs(2));
        assert_eq!(settings.retry_delay, Duration::from_secs(5));
        let exclusive = settings.exclusive_audio.unwrap();
        assert_eq!(exclusive.channel_b, "Desk");
        assert_eq!(exclusive.prefer_a, ["movel"]);
        // keys the file leaves out keep their defaults
        assert_eq!(exclusive.prefer_b, ["principal", "mesa"]);
    }

    #[test]
    fn configured_presets_override_builtins_by_name() {
        let file = write_config(SAMPLE);
        let settings = load_config_from(file.path()).unwrap().session_settings();

        let sermon = &settings.audio_presets["sermon"];
        assert_eq!(sermon.channels.len(), 1);
        assert!((sermon.channels[0].volume.unwrap() - 0.4).abs() < 1e-9);
        // builtins follow the configured desk channel
        assert_eq!(settings.audio_presets["service"].channels[0].channel, "Desk");
    }

    #[test]
    fn exclusive_rule_can_be_disabled() {
        let file = write_config("[automation]\nexclusive_audio_enabled = false\n");
        let settings = load_config_from(file.path()).unwrap().session_settings();
        assert!(settings.exclusive_audio.is_none());
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.profile(Some("nope")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn password_env_wins_over_plaintext() {
        // PATH is always set, so this never has to mutate the environment.
        let profile = Profile {
            host: "localhost".into(),
            port: 4455,
            password: Some("plaintext".into()),
            password_env: Some("PATH".into()),
            secure: false,
            timeout: None,
        };
        let secret = resolve_password(&profile, "test").unwrap();
        assert_eq!(secret.expose_secret(), std::env::var("PATH").unwrap());
    }

    #[test]
    fn empty_host_is_rejected() {
        let profile = Profile {
            host: "  ".into(),
            port: 4455,
            password: None,
            password_env: None,
            secure: false,
            timeout: None,
        };
        assert!(matches!(
            profile_to_target(&profile, "blank"),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn saved_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let file = write_config(SAMPLE);
        let cfg = load_config_from(file.path()).unwrap();

        save_config_to(&cfg, &path).unwrap();
        let reloaded = load_config_from(&path).unwrap();
        assert_eq!(reloaded.profiles["church"].host, "192.168.1.10");
        assert_eq!(reloaded.automation.scenes.opening, "Intro");
    }
}
