// ── Command facade ──
//
// Every operator action the dashboard can issue. Commands need a
// Connected session and are dropped quietly without one. They write the
// cache optimistically where the entity allows it and report remote
// failures to the log feed instead of the caller. An optimistic write is never rolled back: the next
// notification or refresh is authoritative.

use serde_json::{Value, json};
use tracing::debug;

use crate::error::CoreError;
use crate::model::audio::clamp_volume;
use crate::model::{MAX_TRANSITION_MS, Severity};
use crate::session::{LinkHandle, Session};

impl Session {
    // ── Scenes & transitions ─────────────────────────────────────────

    /// Select a scene. Stages it in preview under studio mode, otherwise
    /// cuts it to program.
    pub async fn set_scene(&self, name: &str) {
        let Some(handle) = self.command_link("set scene") else {
            return;
        };
        let data = json!({ "sceneName": name });
        if self.inner.cache.studio_mode() {
            self.inner.cache.set_preview_scene(Some(name.to_owned()));
            self.send(&handle, "SetCurrentPreviewScene", Some(data)).await;
        } else {
            self.inner.cache.set_program_scene(name);
            self.send(&handle, "SetCurrentProgramScene", Some(data)).await;
        }
    }

    pub async fn set_transition_style(&self, name: &str) {
        let Some(handle) = self.command_link("set transition") else {
            return;
        };
        self.inner.cache.set_transition_active(name);
        let data = json!({ "transitionName": name });
        self.send(&handle, "SetCurrentSceneTransition", Some(data)).await;
    }

    /// Set the transition duration, capped at 2000 ms.
    pub async fn set_transition_duration(&self, duration_ms: u32) {
        let Some(handle) = self.command_link("set transition duration") else {
            return;
        };
        let duration_ms = duration_ms.min(MAX_TRANSITION_MS);
        self.inner.cache.set_transition_duration(duration_ms);
        let data = json!({ "transitionDuration": duration_ms });
        self.send(&handle, "SetCurrentSceneTransitionDuration", Some(data))
            .await;
    }

    /// Commit the preview scene to program.
    pub async fn trigger_transition(&self) {
        let Some(handle) = self.command_link("transition") else {
            return;
        };
        self.send(&handle, "TriggerStudioModeTransition", None).await;
    }

    pub async fn set_studio_mode(&self, enabled: bool) {
        let Some(handle) = self.command_link("set studio mode") else {
            return;
        };
        self.inner.cache.set_studio_mode(enabled);
        let data = json!({ "studioModeEnabled": enabled });
        self.send(&handle, "SetStudioModeEnabled", Some(data)).await;
    }

    // ── Audio ────────────────────────────────────────────────────────

    /// Set a channel's volume multiplier, clamped to `0.0..=1.0`.
    pub async fn set_audio_volume(&self, channel: &str, volume: f64) {
        let Some(handle) = self.command_link("set volume") else {
            return;
        };
        let volume = clamp_volume(volume);
        self.inner.cache.set_volume(channel, volume);
        let data = json!({ "inputName": channel, "inputVolumeMul": volume });
        self.send(&handle, "SetInputVolume", Some(data)).await;
    }

    /// Mute or unmute a channel. Unmuting one half of the exclusive pair
    /// mutes the other half, locally and remotely.
    pub async fn set_audio_mute(&self, channel: &str, muted: bool) {
        let Some(handle) = self.command_link("set mute") else {
            return;
        };
        self.inner.cache.set_mute(channel, muted);
        let data = json!({ "inputName": channel, "inputMuted": muted });
        self.send(&handle, "SetInputMute", Some(data)).await;

        if muted {
            return;
        }
        let partner = self
            .settings()
            .exclusive_audio
            .as_ref()
            .and_then(|ex| ex.partner(channel))
            .map(str::to_owned);
        if let Some(partner) = partner {
            debug!(unmuted = %channel, muting = %partner, "enforcing exclusive audio");
            let data = json!({ "inputName": partner, "inputMuted": true });
            self.send(&handle, "SetInputMute", Some(data)).await;
        }
    }

    /// Apply a named audio preset, channel by channel in order.
    ///
    /// Fails only when `name` is not a configured preset.
    pub async fn apply_audio_preset(&self, name: &str) -> Result<(), CoreError> {
        let preset = self
            .settings()
            .audio_presets
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::Config {
                message: format!("unknown audio preset '{name}'"),
            })?;

        self.log(Severity::Info, format!("Applying audio preset: {name}"));
        for setting in &preset.channels {
            if let Some(volume) = setting.volume {
                self.set_audio_volume(&setting.channel, volume).await;
            }
            if let Some(muted) = setting.muted {
                self.set_audio_mute(&setting.channel, muted).await;
            }
        }
        Ok(())
    }

    // ── Outputs ──────────────────────────────────────────────────────

    pub async fn toggle_stream(&self) {
        let Some(handle) = self.command_link("toggle stream") else {
            return;
        };
        self.send(&handle, "ToggleStream", None).await;
    }

    pub async fn toggle_record(&self) {
        let Some(handle) = self.command_link("toggle record") else {
            return;
        };
        self.send(&handle, "ToggleRecord", None).await;
    }

    // ── PTZ (vendor requests) ────────────────────────────────────────

    /// Relative pan/tilt.
    pub async fn ptz_move(&self, x: f64, y: f64) {
        self.ptz("relative-pt", json!({ "x": x, "y": y })).await;
    }

    pub async fn ptz_zoom(&self, z: f64) {
        self.ptz("relative-zoom", json!({ "z": z })).await;
    }

    pub async fn ptz_focus(&self, auto: bool) {
        let action = if auto { "auto-focus" } else { "manual-focus" };
        self.ptz(action, json!({})).await;
    }

    pub async fn ptz_save_preset(&self, name: &str) {
        if self.ptz("save-preset", json!({ "name": name })).await {
            self.log(Severity::Success, format!("PTZ preset saved: {name}"));
        }
    }

    pub async fn ptz_recall_preset(&self, name: &str) {
        self.ptz("recall-preset", json!({ "name": name })).await;
    }

    async fn ptz(&self, action: &str, args: Value) -> bool {
        let Some(handle) = self.command_link("PTZ") else {
            return false;
        };
        let data = json!({
            "vendorName": self.settings().ptz_vendor,
            "requestType": action,
            "requestData": args,
        });
        self.send(&handle, "CallVendorRequest", Some(data))
            .await
            .is_some()
    }

    // ── Overlays ─────────────────────────────────────────────────────

    /// Replace the text of a text input.
    pub async fn set_text(&self, input: &str, text: &str) {
        let Some(handle) = self.command_link("set text") else {
            return;
        };
        let data = json!({
            "inputName": input,
            "inputSettings": { "text": text },
        });
        self.send(&handle, "SetInputSettings", Some(data)).await;
    }

    /// Show or hide a source inside the current program scene.
    pub async fn set_source_visibility(&self, source: &str, visible: bool) {
        let Some(handle) = self.command_link("set visibility") else {
            return;
        };
        let Some(scene) = self.inner.cache.program_scene() else {
            self.log(Severity::Warning, "No program scene to change visibility in");
            return;
        };

        let lookup = json!({ "sceneName": scene, "sourceName": source });
        let Some(data) = self.send(&handle, "GetSceneItemId", Some(lookup)).await else {
            return;
        };
        let item_id = match crate::convert::scene_item_id(&data) {
            Ok(id) => id,
            Err(e) => {
                self.command_failed("GetSceneItemId", &e);
                return;
            }
        };
        let data = json!({
            "sceneName": scene,
            "sceneItemId": item_id,
            "sceneItemEnabled": visible,
        });
        self.send(&handle, "SetSceneItemEnabled", Some(data)).await;
    }

    /// A base64 JPEG data URI of the program scene, `width` pixels wide.
    pub async fn program_screenshot(&self, width: u32) -> Option<String> {
        let handle = self.link()?;
        let scene = self.inner.cache.program_scene()?;
        let data = json!({
            "sourceName": scene,
            "imageFormat": "jpg",
            "imageWidth": width,
        });
        match handle.call("GetSourceScreenshot", Some(data)).await {
            Ok(value) => crate::convert::screenshot(&value).ok(),
            Err(e) => {
                debug!(error = %e, "screenshot failed");
                None
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// The live link. Without one the command is dropped quietly; the log
    /// feed is reserved for connection and failure history.
    pub(crate) fn command_link(&self, action: &str) -> Option<LinkHandle> {
        let handle = self.link();
        if handle.is_none() {
            debug!(action, "not connected, command ignored");
        }
        handle
    }

    /// Issue one request; failures go to the log feed.
    pub(crate) async fn send(
        &self,
        handle: &LinkHandle,
        request_type: &str,
        data: Option<Value>,
    ) -> Option<Value> {
        match handle.call(request_type, data).await {
            Ok(value) => Some(value),
            Err(e) => {
                self.command_failed(request_type, &e);
                None
            }
        }
    }

    pub(crate) fn command_failed(&self, request_type: &str, error: &CoreError) {
        self.log(Severity::Warning, format!("{request_type} failed: {error}"));
    }
}
