// ── State synchronizer ──
//
// Reconciles the cache against the remote engine: full pulls on connect
// and on suspected staleness, targeted patches from push notifications.
// Notifications are applied strictly in arrival order by one pump task
// per link; follow-up round-trips are spawned so the pump never waits
// on the network.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use obsdeck_api::{RemoteEvent, Signal};
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::convert::{self, EngineStats, OutputSample};
use crate::error::CoreError;
use crate::model::{AudioChannel, Severity, StreamStatus};
use crate::session::{LinkHandle, Session};

// ── Notification pump ────────────────────────────────────────────────

pub(crate) async fn pump(
    session: Session,
    handle: LinkHandle,
    mut signals: broadcast::Receiver<Arc<Signal>>,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = signals.recv() => received,
        };

        match received {
            Ok(signal) => match signal.as_ref() {
                Signal::Event(event) => session.apply_event(&handle, event),
                Signal::Error { message } => {
                    session.log(Severity::Warning, format!("OBS link error: {message}"));
                }
                Signal::Closed { reason } => {
                    session.handle_drop(handle.generation, reason);
                    break;
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "notification stream lagged; resynchronizing");
                let (s, h) = (session.clone(), handle.clone());
                session.spawn_detached(async move {
                    if let Err(e) = s.refresh_all_on(&h).await {
                        warn!(error = %e, "resync after lag failed");
                    }
                });
            }
            Err(RecvError::Closed) => {
                session.handle_drop(handle.generation, "notification stream ended");
                break;
            }
        }
    }
    debug!(generation = handle.generation, "notification pump exiting");
}

impl Session {
    /// Patch the cache from one push notification.
    pub(crate) fn apply_event(&self, handle: &LinkHandle, event: &RemoteEvent) {
        if !self.is_current(handle.generation) {
            trace!(event = event.event_type(), "dropping event from superseded link");
            return;
        }
        let cache = &self.inner.cache;

        match event {
            RemoteEvent::CurrentProgramSceneChanged { scene_name } => {
                if !cache.set_program_scene(scene_name) {
                    debug!(scene = %scene_name, "program scene not in catalog; refreshing scenes");
                    self.spawn_refresh(handle, Category::Scenes);
                }
                self.spawn_exclusive_rule(scene_name.clone());
            }
            RemoteEvent::CurrentPreviewSceneChanged { scene_name } => {
                cache.set_preview_scene(Some(scene_name.clone()));
            }
            RemoteEvent::SceneListChanged => self.spawn_refresh(handle, Category::Scenes),
            RemoteEvent::InputMuteStateChanged { input_name, muted } => {
                if let Some(partner) = cache.set_mute(input_name, *muted) {
                    debug!(unmuted = %input_name, muting = %partner, "enforcing exclusive audio");
                    self.spawn_remote_mute(handle, partner);
                }
            }
            RemoteEvent::InputVolumeChanged {
                input_name,
                volume_mul,
            } => cache.set_volume(input_name, *volume_mul),
            RemoteEvent::InputCreated { .. } => self.spawn_refresh(handle, Category::Audio),
            RemoteEvent::InputRemoved { input_name } => cache.remove_input(input_name),
            RemoteEvent::InputNameChanged { old_name, new_name } => {
                cache.rename_input(old_name, new_name);
            }
            RemoteEvent::CurrentSceneTransitionChanged { transition_name } => {
                cache.set_transition_active(transition_name);
            }
            RemoteEvent::CurrentSceneTransitionDurationChanged { duration_ms } => {
                cache.set_transition_duration(*duration_ms);
            }
            RemoteEvent::StreamStateChanged { active } => {
                let active = *active;
                cache.update_status(|s| {
                    s.streaming = active;
                    if !active {
                        s.stream_elapsed = Duration::ZERO;
                        s.bitrate_bps = 0;
                    }
                });
            }
            RemoteEvent::RecordStateChanged { active } => {
                let active = *active;
                cache.update_status(|s| {
                    s.recording = active;
                    if !active {
                        s.record_elapsed = Duration::ZERO;
                    }
                });
            }
            RemoteEvent::StudioModeStateChanged { enabled } => cache.set_studio_mode(*enabled),
            RemoteEvent::ExitStarted => {
                self.log(Severity::Warning, "OBS is shutting down");
            }
            RemoteEvent::Other { event_type, .. } => {
                trace!(event_type = %event_type, "unhandled event");
            }
        }
    }

    fn spawn_refresh(&self, handle: &LinkHandle, category: Category) {
        let (s, h) = (self.clone(), handle.clone());
        self.spawn_detached(async move {
            let result = match category {
                Category::Scenes => s.refresh_scenes_on(&h).await,
                Category::Audio => s.refresh_audio_on(&h).await,
            };
            if let Err(e) = result {
                warn!(error = %e, ?category, "follow-up refresh failed");
            }
        });
    }

    fn spawn_remote_mute(&self, handle: &LinkHandle, channel: String) {
        let (s, h) = (self.clone(), handle.clone());
        self.spawn_detached(async move {
            let data = json!({ "inputName": channel, "inputMuted": true });
            if let Err(e) = h.call("SetInputMute", Some(data)).await {
                s.command_failed("SetInputMute", &e);
            }
        });
    }

    fn spawn_exclusive_rule(&self, scene_name: String) {
        let s = self.clone();
        self.spawn_detached(async move { s.apply_exclusive_rule(&scene_name).await });
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Full pull of every category. Every category is attempted; the
    /// first failure is returned after the rest complete.
    pub async fn refresh_all(&self) -> Result<(), CoreError> {
        let handle = self.link().ok_or(CoreError::Disconnected)?;
        self.refresh_all_on(&handle).await
    }

    pub async fn refresh_scenes(&self) -> Result<(), CoreError> {
        let handle = self.link().ok_or(CoreError::Disconnected)?;
        self.refresh_scenes_on(&handle).await
    }

    /// Refresh the input list and the audio channels derived from it.
    pub async fn refresh_audio(&self) -> Result<(), CoreError> {
        let handle = self.link().ok_or(CoreError::Disconnected)?;
        self.refresh_audio_on(&handle).await
    }

    pub async fn refresh_transitions(&self) -> Result<(), CoreError> {
        let handle = self.link().ok_or(CoreError::Disconnected)?;
        self.refresh_transitions_on(&handle).await
    }

    pub async fn refresh_studio_mode(&self) -> Result<(), CoreError> {
        let handle = self.link().ok_or(CoreError::Disconnected)?;
        self.refresh_studio_mode_on(&handle).await
    }

    pub async fn refresh_status(&self) -> Result<(), CoreError> {
        let handle = self.link().ok_or(CoreError::Disconnected)?;
        self.refresh_status_on(&handle).await
    }

    pub(crate) async fn refresh_all_on(&self, handle: &LinkHandle) -> Result<(), CoreError> {
        let results = tokio::join!(
            self.refresh_studio_mode_on(handle),
            self.refresh_scenes_on(handle),
            self.refresh_audio_on(handle),
            self.refresh_transitions_on(handle),
            self.refresh_status_on(handle),
        );
        let results = [results.0, results.1, results.2, results.3, results.4];

        let mut first = None;
        for err in results.into_iter().filter_map(Result::err) {
            warn!(error = %err, "refresh step failed");
            first.get_or_insert(err);
        }
        debug!(
            generation = handle.generation,
            scenes = self.inner.cache.scenes().len(),
            channels = self.inner.cache.audio().len(),
            "full refresh complete"
        );
        first.map_or(Ok(()), Err)
    }

    pub(crate) async fn refresh_scenes_on(&self, handle: &LinkHandle) -> Result<(), CoreError> {
        let data = handle.call("GetSceneList", None).await?;
        let list = convert::scene_list(&data)?;
        if !self.is_current(handle.generation) {
            return Ok(());
        }
        let moved = self
            .inner
            .cache
            .replace_scenes(list.scenes, list.program, list.preview);
        if let Some(program) = moved {
            debug!(scene = %program, "program scene moved while out of sync");
            self.spawn_exclusive_rule(program);
        }
        Ok(())
    }

    pub(crate) async fn refresh_audio_on(&self, handle: &LinkHandle) -> Result<(), CoreError> {
        let data = handle.call("GetInputList", None).await?;
        let inputs = convert::input_list(&data)?;

        let reads = inputs
            .iter()
            .filter(|i| i.is_audio_candidate())
            .map(|input| read_channel(handle, input.name.clone()));
        let channels: Vec<AudioChannel> = join_all(reads).await.into_iter().flatten().collect();

        if !self.is_current(handle.generation) {
            return Ok(());
        }
        self.inner.cache.replace_inputs(inputs);
        if let Some(forced) = self.inner.cache.replace_audio(channels) {
            self.log(
                Severity::Warning,
                format!("Both exclusive channels were live; muted {forced}"),
            );
            let data = json!({ "inputName": forced, "inputMuted": true });
            if let Err(e) = handle.call("SetInputMute", Some(data)).await {
                self.command_failed("SetInputMute", &e);
            }
        }
        Ok(())
    }

    pub(crate) async fn refresh_transitions_on(&self, handle: &LinkHandle) -> Result<(), CoreError> {
        let (list, current) = tokio::join!(
            handle.call("GetSceneTransitionList", None),
            handle.call("GetCurrentSceneTransition", None),
        );
        let (active, available) = convert::transition_list(&list?)?;
        let duration = convert::transition_duration(&current?)?;
        if !self.is_current(handle.generation) {
            return Ok(());
        }
        let duration = duration.unwrap_or_else(|| self.inner.cache.transition().duration_ms);
        self.inner
            .cache
            .replace_transition(active, duration, available);
        Ok(())
    }

    pub(crate) async fn refresh_studio_mode_on(&self, handle: &LinkHandle) -> Result<(), CoreError> {
        let data = handle.call("GetStudioModeEnabled", None).await?;
        let enabled = convert::studio_mode(&data)?;
        if self.is_current(handle.generation) {
            self.inner.cache.set_studio_mode(enabled);
        }
        Ok(())
    }

    pub(crate) async fn refresh_status_on(&self, handle: &LinkHandle) -> Result<(), CoreError> {
        let (stream, record, stats, video) = tokio::try_join!(
            handle.call("GetStreamStatus", None),
            handle.call("GetRecordStatus", None),
            handle.call("GetStats", None),
            handle.call("GetVideoSettings", None),
        )?;
        let stream = convert::output_status("GetStreamStatus", &stream)?;
        let record = convert::output_status("GetRecordStatus", &record)?;
        let stats = convert::stats(&stats)?;
        let resolution = convert::resolution(&video)?;
        if self.is_current(handle.generation) {
            self.apply_status(stream, record, stats, None);
            self.inner
                .cache
                .update_status(|s| s.resolution = resolution);
        }
        Ok(())
    }

    /// Fold one round of output/stat readings into the status entity.
    pub(crate) fn apply_status(
        &self,
        stream: OutputSample,
        record: OutputSample,
        stats: EngineStats,
        bitrate_bps: Option<u64>,
    ) {
        self.inner.cache.update_status(|s: &mut StreamStatus| {
            s.streaming = stream.active;
            s.recording = record.active;
            s.stream_elapsed = stream.elapsed;
            s.record_elapsed = record.elapsed;
            s.cpu_percent = stats.cpu_percent;
            s.memory_bytes = stats.memory_bytes;
            s.fps = stats.fps;
            if !stream.active {
                s.bitrate_bps = 0;
            } else if let Some(bps) = bitrate_bps {
                s.bitrate_bps = bps;
            }
        });
    }
}

#[derive(Debug, Clone, Copy)]
enum Category {
    Scenes,
    Audio,
}

/// Read volume and mute for one input. Inputs without audio controls
/// reject these requests and are skipped.
async fn read_channel(handle: &LinkHandle, name: String) -> Option<AudioChannel> {
    let arg = json!({ "inputName": name });
    let (volume, mute) = tokio::join!(
        handle.call("GetInputVolume", Some(arg.clone())),
        handle.call("GetInputMute", Some(arg)),
    );
    let volume = volume.and_then(|v| convert::input_volume(&v));
    let mute = mute.and_then(|m| convert::input_mute(&m));
    match (volume, mute) {
        (Ok(volume), Ok(muted)) => Some(AudioChannel::new(name, volume, muted)),
        (Err(e), _) | (_, Err(e)) => {
            debug!(input = %name, error = %e, "skipping input without audio controls");
            None
        }
    }
}
