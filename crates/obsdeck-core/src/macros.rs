// ── Automation macros ──
//
// Fixed, best-effort sequences triggered by one operator action. A step
// that fails is logged and the macro moves on; nothing aborts a macro.
// The public entry points run the sequence on its own task, so dropping
// the caller's future cannot stop a macro halfway (end-of-service keeps
// its grace delay even if the caller goes away).

use std::future::Future;

use futures_util::future::join_all;
use serde_json::json;
use tracing::{debug, warn};

use crate::model::Severity;
use crate::session::{LinkHandle, Session};

/// obs-websocket `OutputNotRunning`.
const OUTPUT_NOT_RUNNING: u16 = 501;

impl Session {
    /// Studio mode on, opening scene staged, desk audio live, outputs
    /// started, then the staged scene committed to program.
    pub async fn start_service(&self) {
        let session = self.clone();
        self.run_macro("start service", async move { session.start_service_steps().await })
            .await;
    }

    /// Closing scene on air, every channel muted, then outputs stopped
    /// after the grace delay.
    pub async fn end_service(&self) {
        let session = self.clone();
        self.run_macro("end service", async move { session.end_service_steps().await })
            .await;
    }

    /// Stop both outputs, cut straight to the panic scene and mute
    /// everything, all at once.
    pub async fn panic(&self) {
        let session = self.clone();
        self.run_macro("panic", async move { session.panic_steps().await })
            .await;
    }

    async fn run_macro<F>(&self, name: &str, steps: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Err(e) = tokio::spawn(steps).await {
            self.log(Severity::Error, format!("Macro {name} aborted: {e}"));
        }
    }

    // ── Sequences ────────────────────────────────────────────────────

    async fn start_service_steps(&self) {
        let Some(handle) = self.command_link("start service") else {
            return;
        };
        self.log(Severity::Info, "Starting service automation");
        let roles = &self.settings().scene_roles;

        if !self.inner.cache.studio_mode() {
            self.set_studio_mode(true).await;
        }

        let scenes = self.inner.cache.scenes();
        let opening = scenes
            .iter()
            .find(|s| s.name == roles.opening)
            .or_else(|| scenes.first());
        match opening {
            Some(scene) => self.set_scene(&scene.name).await,
            None => self.log(Severity::Warning, "No scenes available to open with"),
        }

        if let Some(exclusive) = &self.settings().exclusive_audio {
            self.set_audio_mute(&exclusive.channel_b, false).await;
        }

        let status = self.inner.cache.status();
        if !status.streaming {
            self.send(&handle, "StartStream", None).await;
        }
        if !status.recording {
            self.send(&handle, "StartRecord", None).await;
        }

        self.send(&handle, "TriggerStudioModeTransition", None).await;
        self.log(Severity::Success, "Service started");
    }

    async fn end_service_steps(&self) {
        let Some(handle) = self.command_link("end service") else {
            return;
        };
        self.log(Severity::Warning, "Ending service");
        let closing = &self.settings().scene_roles.closing;

        if self.has_scene(closing) {
            self.set_scene(closing).await;
            if self.inner.cache.studio_mode() {
                self.send(&handle, "TriggerStudioModeTransition", None).await;
            }
        } else {
            self.log(
                Severity::Warning,
                format!("Closing scene '{closing}' not found; staying on current scene"),
            );
        }

        self.mute_all().await;

        tokio::time::sleep(self.settings().end_grace).await;

        let Some(handle) = self.command_link("stop outputs") else {
            return;
        };
        let status = self.inner.cache.status();
        if status.streaming {
            self.send(&handle, "StopStream", None).await;
        }
        if status.recording {
            self.send(&handle, "StopRecord", None).await;
        }
        self.log(Severity::Info, "Service ended (stream and recording stopped)");
    }

    async fn panic_steps(&self) {
        let Some(handle) = self.command_link("panic") else {
            return;
        };
        self.log(Severity::Error, "PANIC MODE");

        tokio::join!(
            self.stop_output(&handle, "StopStream"),
            self.stop_output(&handle, "StopRecord"),
            self.cut_to_panic_scene(&handle),
            self.mute_all(),
        );
    }

    /// Stop an output whether or not the cache thinks it is running.
    async fn stop_output(&self, handle: &LinkHandle, request_type: &str) {
        match handle.call(request_type, None).await {
            Ok(_) => {}
            Err(e) if e.remote_code() == Some(OUTPUT_NOT_RUNNING) => {
                debug!(request_type, "output already stopped");
            }
            Err(e) => self.command_failed(request_type, &e),
        }
    }

    /// Program cut, never staged through preview.
    async fn cut_to_panic_scene(&self, handle: &LinkHandle) {
        let panic = &self.settings().scene_roles.panic;
        if !self.has_scene(panic) {
            self.log(
                Severity::Warning,
                format!("Panic scene '{panic}' not found; scene left unchanged"),
            );
            return;
        }
        self.inner.cache.set_program_scene(panic);
        let data = json!({ "sceneName": panic });
        self.send(handle, "SetCurrentProgramScene", Some(data)).await;
    }

    async fn mute_all(&self) {
        let channels = self.inner.cache.audio();
        join_all(channels.iter().map(|c| self.set_audio_mute(&c.name, true))).await;
    }

    fn has_scene(&self, name: &str) -> bool {
        self.inner.cache.scenes().iter().any(|s| s.name == name)
    }

    // ── Reactive exclusive-audio rule ────────────────────────────────

    /// Put the channel a program scene calls for on air.
    pub(crate) async fn apply_exclusive_rule(&self, scene_name: &str) {
        let Some(channel) = self
            .settings()
            .exclusive_audio
            .as_ref()
            .and_then(|ex| ex.channel_for_scene(scene_name))
            .map(str::to_owned)
        else {
            return;
        };
        if self.link().is_none() {
            warn!(scene = %scene_name, "exclusive audio rule skipped: not connected");
            return;
        }
        self.set_audio_mute(&channel, false).await;
        self.log(Severity::Info, format!("Auto-audio: enabled {channel}"));
    }
}
