// ── Saved connection presets ──
//
// Named `{name, host, port, credential}` records the operator picks a
// remote engine from. The cloud table is shared between machines; the
// local TOML file mirrors it and takes over whenever the cloud is
// unreachable or not configured.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use obsdeck_core::ConnectTarget;

use crate::{CloudConfig, resolve_cloud_key};

const TABLE_PATH: &str = "rest/v1/connection_presets";
const CLOUD_TIMEOUT: Duration = Duration::from_secs(10);

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("invalid preset: {reason}")]
    Validation { reason: String },

    #[error("cloud preset table rejected the API key")]
    Unauthorized,

    #[error("cloud preset table error (HTTP {status}): {message}")]
    Cloud { status: u16, message: String },

    #[error("cloud presets are not configured: {reason}")]
    NotConfigured { reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid cloud URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to parse preset data: {message}")]
    Deserialization { message: String },

    #[error("failed to write preset file: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Record ──────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionPreset {
    pub name: String,
    pub host: String,
    #[serde(default = "crate::default_port")]
    pub port: u16,
    /// obs-websocket password, stored as entered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl fmt::Debug for ConnectionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPreset")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credential", &self.credential.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ConnectionPreset {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Where a session should connect for this preset.
    pub fn to_target(&self) -> ConnectTarget {
        let target = ConnectTarget::new(self.host.trim(), self.port);
        match self.credential.as_deref().filter(|c| !c.is_empty()) {
            Some(credential) => target.with_password(SecretString::from(credential.to_owned())),
            None => target,
        }
    }

    fn validate(&self) -> Result<(), PresetError> {
        if self.name.trim().is_empty() {
            return Err(PresetError::Validation {
                reason: "name must not be empty".into(),
            });
        }
        if self.host.trim().is_empty() {
            return Err(PresetError::Validation {
                reason: format!("preset '{}' has an empty host", self.name),
            });
        }
        Ok(())
    }
}

// ── Store trait ─────────────────────────────────────────────────────

/// Create / list / delete for saved presets. Saving an existing name
/// replaces it.
#[async_trait]
pub trait PresetStore: Send + Sync {
    /// All presets, ordered by name.
    async fn list(&self) -> Result<Vec<ConnectionPreset>, PresetError>;

    async fn save(&self, preset: &ConnectionPreset) -> Result<(), PresetError>;

    /// Deleting a name that does not exist is not an error.
    async fn delete(&self, name: &str) -> Result<(), PresetError>;
}

// ── Local file ──────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, Serialize)]
struct PresetFile {
    #[serde(default)]
    presets: Vec<ConnectionPreset>,
}

/// Presets in a TOML file of `[[presets]]` tables.
#[derive(Debug, Clone)]
pub struct LocalPresetStore {
    path: PathBuf,
}

impl LocalPresetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `presets.toml` in the platform data directory.
    pub fn default_location() -> Self {
        Self::new(crate::data_dir().join("presets.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the file with exactly `presets`.
    pub async fn replace_all(&self, presets: &[ConnectionPreset]) -> Result<(), PresetError> {
        let mut presets = presets.to_vec();
        presets.sort_by(|a, b| a.name.cmp(&b.name));
        self.write(PresetFile { presets }).await
    }

    async fn read(&self) -> Result<PresetFile, PresetError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(body) => toml::from_str(&body).map_err(|e| PresetError::Deserialization {
                message: format!("{}: {e}", self.path.display()),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PresetFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, file: PresetFile) -> Result<(), PresetError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = toml::to_string_pretty(&file)?;
        tokio::fs::write(&self.path, body).await?;
        debug!(path = %self.path.display(), count = file.presets.len(), "preset file written");
        Ok(())
    }
}

#[async_trait]
impl PresetStore for LocalPresetStore {
    async fn list(&self) -> Result<Vec<ConnectionPreset>, PresetError> {
        let mut presets = self.read().await?.presets;
        presets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(presets)
    }

    async fn save(&self, preset: &ConnectionPreset) -> Result<(), PresetError> {
        preset.validate()?;
        let mut file = self.read().await?;
        match file.presets.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => existing.clone_from(preset),
            None => file.presets.push(preset.clone()),
        }
        file.presets.sort_by(|a, b| a.name.cmp(&b.name));
        self.write(file).await
    }

    async fn delete(&self, name: &str) -> Result<(), PresetError> {
        let mut file = self.read().await?;
        let before = file.presets.len();
        file.presets.retain(|p| p.name != name);
        if file.presets.len() == before {
            return Ok(());
        }
        self.write(file).await
    }
}

// ── Cloud table ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Presets in a PostgREST-style table at `{base}/rest/v1/connection_presets`.
///
/// Authenticates with the project's API key, sent both as `apikey` and as
/// a bearer token.
pub struct CloudPresetStore {
    http: reqwest::Client,
    table_url: Url,
}

impl CloudPresetStore {
    pub fn new(base_url: &str, api_key: &SecretString) -> Result<Self, PresetError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key.expose_secret()).map_err(|e| {
            PresetError::NotConfigured {
                reason: format!("invalid API key header value: {e}"),
            }
        })?;
        key.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
            .map_err(|e| PresetError::NotConfigured {
                reason: format!("invalid API key header value: {e}"),
            })?;
        bearer.set_sensitive(true);
        headers.insert("apikey", key);
        headers.insert(reqwest::header::AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(CLOUD_TIMEOUT)
            .build()?;
        let table_url = Self::normalize_base_url(base_url)?.join(TABLE_PATH)?;

        Ok(Self { http, table_url })
    }

    /// Build from the `[cloud]` table, resolving its API key.
    pub fn from_config(cloud: &CloudConfig) -> Result<Self, PresetError> {
        let key = resolve_cloud_key(cloud).ok_or_else(|| PresetError::NotConfigured {
            reason: "no API key (set api_key, api_key_env or the keyring entry)".into(),
        })?;
        Self::new(&cloud.url, &key)
    }

    /// The base with exactly one trailing slash so `join` appends.
    fn normalize_base_url(raw: &str) -> Result<Url, PresetError> {
        let mut url = Url::parse(raw.trim())?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    async fn handle_empty(&self, resp: reqwest::Response) -> Result<(), PresetError> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn parse_error(&self, status: reqwest::StatusCode, resp: reqwest::Response) -> PresetError {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return PresetError::Unauthorized;
        }

        let raw = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&raw)
            .ok()
            .and_then(|err| err.message)
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                }
            });
        PresetError::Cloud {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl PresetStore for CloudPresetStore {
    async fn list(&self) -> Result<Vec<ConnectionPreset>, PresetError> {
        debug!("GET {}", self.table_url);
        let resp = self
            .http
            .get(self.table_url.clone())
            .query(&[("select", "*"), ("order", "name.asc")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(self.parse_error(status, resp).await);
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview = body.chars().take(200).collect::<String>();
            PresetError::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
            }
        })
    }

    async fn save(&self, preset: &ConnectionPreset) -> Result<(), PresetError> {
        preset.validate()?;
        debug!(name = %preset.name, "POST {}", self.table_url);
        let resp = self
            .http
            .post(self.table_url.clone())
            .query(&[("on_conflict", "name")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(preset)
            .send()
            .await?;
        self.handle_empty(resp).await
    }

    async fn delete(&self, name: &str) -> Result<(), PresetError> {
        debug!(name, "DELETE {}", self.table_url);
        let filter = format!("eq.{name}");
        let resp = self
            .http
            .delete(self.table_url.clone())
            .query(&[("name", filter.as_str())])
            .send()
            .await?;
        self.handle_empty(resp).await
    }
}

// ── Cache-aside composition ─────────────────────────────────────────

/// Cloud first when configured, the local file whenever the cloud fails.
///
/// A successful cloud listing refreshes the local copy. Writes always land
/// locally so the fallback never goes stale on this machine.
pub struct FallbackPresetStore {
    cloud: Option<Box<dyn PresetStore>>,
    local: LocalPresetStore,
}

impl FallbackPresetStore {
    pub fn new(cloud: Option<Box<dyn PresetStore>>, local: LocalPresetStore) -> Self {
        Self { cloud, local }
    }

    /// Local file at the default location, plus the cloud table when the
    /// config has a usable `[cloud]` section.
    pub fn from_config(cloud: Option<&CloudConfig>) -> Self {
        let cloud = cloud.and_then(|c| match CloudPresetStore::from_config(c) {
            Ok(store) => Some(Box::new(store) as Box<dyn PresetStore>),
            Err(e) => {
                warn!(error = %e, "cloud presets disabled");
                None
            }
        });
        Self::new(cloud, LocalPresetStore::default_location())
    }

    pub fn has_cloud(&self) -> bool {
        self.cloud.is_some()
    }
}

#[async_trait]
impl PresetStore for FallbackPresetStore {
    async fn list(&self) -> Result<Vec<ConnectionPreset>, PresetError> {
        if let Some(cloud) = &self.cloud {
            match cloud.list().await {
                Ok(presets) => {
                    if let Err(e) = self.local.replace_all(&presets).await {
                        warn!(error = %e, "failed to refresh local preset copy");
                    }
                    return Ok(presets);
                }
                Err(e) => warn!(error = %e, "cloud presets unavailable, using local copy"),
            }
        }
        self.local.list().await
    }

    async fn save(&self, preset: &ConnectionPreset) -> Result<(), PresetError> {
        if let Some(cloud) = &self.cloud {
            if let Err(e) = cloud.save(preset).await {
                warn!(error = %e, name = %preset.name, "cloud save failed, saved locally only");
            }
        }
        self.local.save(preset).await
    }

    async fn delete(&self, name: &str) -> Result<(), PresetError> {
        if let Some(cloud) = &self.cloud {
            if let Err(e) = cloud.delete(name).await {
                warn!(error = %e, name, "cloud delete failed, deleted locally only");
            }
        }
        self.local.delete(name).await
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_credential() {
        let preset = ConnectionPreset::new("church", "10.0.0.5", 4455).with_credential("hunter2");
        let rendered = format!("{preset:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn empty_credential_means_no_password() {
        let preset = ConnectionPreset::new("church", "10.0.0.5", 4455).with_credential("");
        assert!(preset.to_target().password.is_none());
    }

    #[test]
    fn base_url_gets_single_trailing_slash() {
        let url = CloudPresetStore::normalize_base_url("https://xyz.example.co//").unwrap();
        assert_eq!(url.as_str(), "https://xyz.example.co/");
        let table = url.join(TABLE_PATH).unwrap();
        assert_eq!(table.as_str(), "https://xyz.example.co/rest/v1/connection_presets");
    }

    #[test]
    fn validation_rejects_blank_fields() {
        assert!(ConnectionPreset::new(" ", "h", 1).validate().is_err());
        assert!(ConnectionPreset::new("n", "", 1).validate().is_err());
        assert!(ConnectionPreset::new("n", "h", 1).validate().is_ok());
    }
}
