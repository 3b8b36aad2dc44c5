// ── Mirrored OBS state ──
//
// Single owner of every cached entity. Each mutation runs under one lock,
// allocates a bus revision per changed topic while still holding it, and
// publishes the resulting snapshots after the lock is released.
//
// The exclusive-audio invariant is enforced here, so no snapshot ever
// shows both channels of the pair unmuted, whatever path wrote it.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::bus::{EventBus, Topic, Update};
use crate::config::ExclusiveAudio;
use crate::model::audio::clamp_volume;
use crate::model::{AudioChannel, InputInfo, MAX_TRANSITION_MS, Scene, StreamStatus, TransitionConfig};

#[derive(Default)]
struct CacheState {
    scenes: Arc<Vec<Scene>>,
    program_scene: Option<String>,
    preview_scene: Option<String>,
    audio: Arc<Vec<AudioChannel>>,
    inputs: Arc<Vec<InputInfo>>,
    transition: Arc<TransitionConfig>,
    studio_mode: bool,
    status: Arc<StreamStatus>,
    /// Revision of the value each topic currently holds.
    revisions: [u64; 10],
}

impl CacheState {
    fn snapshot(&self, topic: Topic) -> Option<Update> {
        let update = match topic {
            Topic::Status => Update::Status(Arc::clone(&self.status)),
            Topic::Scenes => Update::Scenes(Arc::clone(&self.scenes)),
            Topic::CurrentScene => Update::CurrentScene(self.program_scene.clone()),
            Topic::PreviewScene => Update::PreviewScene(self.preview_scene.clone()),
            Topic::AudioSources => Update::AudioSources(Arc::clone(&self.audio)),
            Topic::Inputs => Update::Inputs(Arc::clone(&self.inputs)),
            Topic::Transition => Update::Transition(Arc::clone(&self.transition)),
            Topic::StudioMode => Update::StudioMode(self.studio_mode),
            Topic::ConnectionState | Topic::Log => return None,
        };
        Some(update)
    }

    fn revision_slot(&mut self, topic: Topic) -> Option<&mut u64> {
        let idx = match topic {
            Topic::Status => 0,
            Topic::Scenes => 1,
            Topic::CurrentScene => 2,
            Topic::PreviewScene => 3,
            Topic::AudioSources => 4,
            Topic::Inputs => 5,
            Topic::Transition => 6,
            Topic::StudioMode => 7,
            Topic::ConnectionState | Topic::Log => return None,
        };
        self.revisions.get_mut(idx)
    }

    fn channel_mut(&mut self, name: &str) -> Option<&mut AudioChannel> {
        Arc::make_mut(&mut self.audio)
            .iter_mut()
            .find(|c| c.name == name)
    }

    fn is_unmuted(&self, name: &str) -> bool {
        self.audio.iter().any(|c| c.name == name && !c.muted)
    }
}

/// Records which topics a mutation touched.
#[derive(Default)]
pub(crate) struct Changes(Vec<Topic>);

impl Changes {
    fn mark(&mut self, topic: Topic) {
        if !self.0.contains(&topic) {
            self.0.push(topic);
        }
    }
}

pub(crate) struct StateCache {
    state: Mutex<CacheState>,
    bus: Arc<EventBus>,
    exclusive: Option<ExclusiveAudio>,
}

impl StateCache {
    pub(crate) fn new(bus: Arc<EventBus>, exclusive: Option<ExclusiveAudio>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            bus,
            exclusive,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the state, then publish every topic it marked.
    fn mutate<R>(&self, f: impl FnOnce(&mut CacheState, &mut Changes) -> R) -> R {
        let (result, updates) = {
            let mut state = self.lock();
            let mut changes = Changes::default();
            let result = f(&mut state, &mut changes);

            let mut updates = Vec::with_capacity(changes.0.len());
            for topic in changes.0 {
                let revision = self.bus.next_revision();
                if let Some(slot) = state.revision_slot(topic) {
                    *slot = revision;
                }
                if let Some(update) = state.snapshot(topic) {
                    updates.push((revision, update));
                }
            }
            (result, updates)
        };

        for (revision, update) in &updates {
            self.bus.publish(*revision, update);
        }
        result
    }

    /// Current value of a cache topic and the revision it was written at.
    pub(crate) fn current(&self, topic: Topic) -> Option<(u64, Update)> {
        let mut state = self.lock();
        let update = state.snapshot(topic)?;
        let revision = state.revision_slot(topic).map_or(0, |r| *r);
        Some((revision, update))
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub(crate) fn scenes(&self) -> Arc<Vec<Scene>> {
        Arc::clone(&self.lock().scenes)
    }

    pub(crate) fn program_scene(&self) -> Option<String> {
        self.lock().program_scene.clone()
    }

    pub(crate) fn preview_scene(&self) -> Option<String> {
        self.lock().preview_scene.clone()
    }

    pub(crate) fn audio(&self) -> Arc<Vec<AudioChannel>> {
        Arc::clone(&self.lock().audio)
    }

    pub(crate) fn inputs(&self) -> Arc<Vec<InputInfo>> {
        Arc::clone(&self.lock().inputs)
    }

    pub(crate) fn transition(&self) -> Arc<TransitionConfig> {
        Arc::clone(&self.lock().transition)
    }

    pub(crate) fn studio_mode(&self) -> bool {
        self.lock().studio_mode
    }

    pub(crate) fn status(&self) -> Arc<StreamStatus> {
        Arc::clone(&self.lock().status)
    }

    // ── Scenes ───────────────────────────────────────────────────────

    /// Replace the catalog wholesale (full refresh).
    /// Replace the catalog and selections. Returns the new program scene
    /// when it moved away from a previously known one; the first fill
    /// after startup is not a change.
    pub(crate) fn replace_scenes(
        &self,
        scenes: Vec<Scene>,
        program: Option<String>,
        preview: Option<String>,
    ) -> Option<String> {
        self.mutate(|s, c| {
            s.scenes = Arc::new(scenes);
            c.mark(Topic::Scenes);
            let mut moved = None;
            if s.program_scene != program {
                if s.program_scene.is_some() {
                    moved.clone_from(&program);
                }
                s.program_scene = program;
                c.mark(Topic::CurrentScene);
            }
            if s.preview_scene != preview {
                s.preview_scene = preview;
                c.mark(Topic::PreviewScene);
            }
            moved
        })
    }

    /// Set the program scene. Returns whether the catalog knows the name.
    pub(crate) fn set_program_scene(&self, name: &str) -> bool {
        self.mutate(|s, c| {
            if s.program_scene.as_deref() != Some(name) {
                s.program_scene = Some(name.to_owned());
                c.mark(Topic::CurrentScene);
            }
            s.scenes.iter().any(|scene| scene.name == name)
        })
    }

    pub(crate) fn set_preview_scene(&self, name: Option<String>) {
        self.mutate(|s, c| {
            if s.preview_scene != name {
                s.preview_scene = name;
                c.mark(Topic::PreviewScene);
            }
        });
    }

    // ── Inputs & audio ───────────────────────────────────────────────

    pub(crate) fn replace_inputs(&self, inputs: Vec<InputInfo>) {
        self.mutate(|s, c| {
            s.inputs = Arc::new(inputs);
            c.mark(Topic::Inputs);
        });
    }

    /// Replace every channel (full refresh).
    ///
    /// If both halves of the exclusive pair come back unmuted, B wins: A is
    /// muted locally and its name returned so the caller can mute it remotely.
    pub(crate) fn replace_audio(&self, channels: Vec<AudioChannel>) -> Option<String> {
        let exclusive = self.exclusive.as_ref();
        self.mutate(|s, c| {
            s.audio = Arc::new(channels);
            c.mark(Topic::AudioSources);
            let ex = exclusive?;
            if s.is_unmuted(&ex.channel_a) && s.is_unmuted(&ex.channel_b) {
                if let Some(a) = s.channel_mut(&ex.channel_a) {
                    a.muted = true;
                }
                return Some(ex.channel_a.clone());
            }
            None
        })
    }

    /// Apply a mute flag from any source.
    ///
    /// Unmuting one half of the exclusive pair mutes the other in the same
    /// snapshot. Returns the partner's name when it was flipped here.
    pub(crate) fn set_mute(&self, name: &str, muted: bool) -> Option<String> {
        let exclusive = self.exclusive.as_ref();
        self.mutate(|s, c| {
            let channel = s.channel_mut(name)?;
            if channel.muted != muted {
                channel.muted = muted;
                c.mark(Topic::AudioSources);
            }
            if muted {
                return None;
            }
            let partner = exclusive?.partner(name)?;
            if !s.is_unmuted(partner) {
                return None;
            }
            if let Some(p) = s.channel_mut(partner) {
                p.muted = true;
            }
            c.mark(Topic::AudioSources);
            Some(partner.to_owned())
        })
    }

    pub(crate) fn set_volume(&self, name: &str, volume: f64) {
        let volume = clamp_volume(volume);
        self.mutate(|s, c| {
            if let Some(channel) = s.channel_mut(name) {
                if (channel.volume - volume).abs() > f64::EPSILON {
                    channel.volume = volume;
                    c.mark(Topic::AudioSources);
                }
            }
        });
    }

    /// Drop an input (and its channel) that OBS reported removed.
    pub(crate) fn remove_input(&self, name: &str) {
        self.mutate(|s, c| {
            if s.inputs.iter().any(|i| i.name == name) {
                Arc::make_mut(&mut s.inputs).retain(|i| i.name != name);
                c.mark(Topic::Inputs);
            }
            if s.audio.iter().any(|a| a.name == name) {
                Arc::make_mut(&mut s.audio).retain(|a| a.name != name);
                c.mark(Topic::AudioSources);
            }
        });
    }

    pub(crate) fn rename_input(&self, old: &str, new: &str) {
        self.mutate(|s, c| {
            if let Some(input) = Arc::make_mut(&mut s.inputs)
                .iter_mut()
                .find(|i| i.name == old)
            {
                new.clone_into(&mut input.name);
                c.mark(Topic::Inputs);
            }
            if let Some(channel) = s.channel_mut(old) {
                new.clone_into(&mut channel.name);
                c.mark(Topic::AudioSources);
            }
        });
    }

    // ── Transition & studio mode ─────────────────────────────────────

    pub(crate) fn replace_transition(&self, active: String, duration_ms: u32, available: BTreeSet<String>) {
        self.mutate(|s, c| {
            s.transition = Arc::new(TransitionConfig {
                active,
                duration_ms: duration_ms.min(MAX_TRANSITION_MS),
                available,
            });
            c.mark(Topic::Transition);
        });
    }

    pub(crate) fn set_transition_active(&self, name: &str) {
        self.mutate(|s, c| {
            if s.transition.active != name {
                name.clone_into(&mut Arc::make_mut(&mut s.transition).active);
                c.mark(Topic::Transition);
            }
        });
    }

    pub(crate) fn set_transition_duration(&self, duration_ms: u32) {
        let duration_ms = duration_ms.min(MAX_TRANSITION_MS);
        self.mutate(|s, c| {
            if s.transition.duration_ms != duration_ms {
                Arc::make_mut(&mut s.transition).duration_ms = duration_ms;
                c.mark(Topic::Transition);
            }
        });
    }

    /// Leaving studio mode also clears the staged preview scene.
    pub(crate) fn set_studio_mode(&self, enabled: bool) {
        self.mutate(|s, c| {
            if s.studio_mode != enabled {
                s.studio_mode = enabled;
                c.mark(Topic::StudioMode);
            }
            if !enabled && s.preview_scene.is_some() {
                s.preview_scene = None;
                c.mark(Topic::PreviewScene);
            }
        });
    }

    // ── Status ───────────────────────────────────────────────────────

    pub(crate) fn update_status(&self, f: impl FnOnce(&mut StreamStatus)) {
        self.mutate(|s, c| {
            let mut next = StreamStatus::clone(&s.status);
            f(&mut next);
            if next != *s.status {
                s.status = Arc::new(next);
                c.mark(Topic::Status);
            }
        });
    }
}

// ── Tests ────────────────────────────────────────────────────────────
