// ── Session: connection lifecycle ──
//
// Owns the state machine (Disconnected / Connecting / Connected /
// Reconnecting / Error), the retry timer, cached connection parameters,
// and the single live link. Every installed link gets a generation; every
// open attempt gets an attempt number. Anything that completes against a
// superseded generation or attempt is discarded.
//
// The connection slot is a std mutex and is never held across an await
// or while publishing on the bus.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use obsdeck_api::{ConnectTarget, Connector, Link, Signal};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bus::{EventBus, SubscriptionId, Topic, Update};
use crate::config::SessionSettings;
use crate::error::CoreError;
use crate::log_feed::LogFeed;
use crate::model::{AudioChannel, ConnectionState, InputInfo, LogEntry, Scene, Severity, StreamStatus, TransitionConfig};
use crate::store::StateCache;

// ── LinkHandle ───────────────────────────────────────────────────────

/// A link tagged with the generation it was installed under.
#[derive(Clone)]
pub(crate) struct LinkHandle {
    pub(crate) generation: u64,
    link: Arc<dyn Link>,
}

impl LinkHandle {
    pub(crate) async fn call(
        &self,
        request_type: &str,
        request_data: Option<Value>,
    ) -> Result<Value, CoreError> {
        self.link
            .call(request_type, request_data)
            .await
            .map_err(CoreError::from)
    }
}

struct ActiveLink {
    handle: LinkHandle,
    /// Stops the notification pump and heartbeat of this link.
    cancel: CancellationToken,
}

struct ConnectionSlot {
    state: ConnectionState,
    state_revision: u64,
    auto_reconnect: bool,
    target: Option<ConnectTarget>,
    health_failures: u32,
    attempt: u64,
    generation: u64,
    active: Option<ActiveLink>,
    retry: Option<CancellationToken>,
}

/// A connection-state transition waiting to be published.
#[must_use]
struct StateChange(Option<(u64, ConnectionState)>);

// ── Session ──────────────────────────────────────────────────────────

/// The control-channel session and everything mirrored through it.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Construct one per remote
/// engine; nothing is global.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    connector: Arc<dyn Connector>,
    pub(crate) settings: SessionSettings,
    bus: Arc<EventBus>,
    pub(crate) cache: StateCache,
    feed: LogFeed,
    state_tx: watch::Sender<ConnectionState>,
    conn: Mutex<ConnectionSlot>,
}

impl Session {
    /// Create a disconnected session that opens links through `connector`.
    pub fn new(connector: Arc<dyn Connector>, settings: SessionSettings) -> Self {
        let bus = Arc::new(EventBus::new());
        let cache = StateCache::new(Arc::clone(&bus), settings.exclusive_audio.clone());
        let feed = LogFeed::new(settings.log_capacity);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(SessionInner {
                connector,
                settings,
                bus,
                cache,
                feed,
                state_tx,
                conn: Mutex::new(ConnectionSlot {
                    state: ConnectionState::Disconnected,
                    state_revision: 0,
                    auto_reconnect: false,
                    target: None,
                    health_failures: 0,
                    attempt: 0,
                    generation: 0,
                    active: None,
                    retry: None,
                }),
            }),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    fn slot(&self) -> MutexGuard<'_, ConnectionSlot> {
        self.inner
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Connect to `target`.
    ///
    /// A no-op when already connected. Otherwise enables auto-reconnect,
    /// caches the target and opens a link. On success the session is
    /// Connected, fully refreshed and heartbeating before this returns.
    /// A failed first attempt leaves the session in `Error`; a failure while
    /// `Reconnecting` keeps retrying in the background.
    pub async fn connect(&self, target: ConnectTarget) -> Result<(), CoreError> {
        let (attempt, change) = {
            let mut slot = self.slot();
            if slot.state == ConnectionState::Connected {
                debug!(target = %target.key(), "connect ignored: already connected");
                return Ok(());
            }
            slot.auto_reconnect = true;
            slot.target = Some(target.clone());
            slot.attempt += 1;
            if let Some(timer) = slot.retry.take() {
                timer.cancel();
            }
            // Keep showing Reconnecting while a manual attempt runs.
            let change = if slot.state == ConnectionState::Reconnecting {
                StateChange(None)
            } else {
                self.set_state(&mut slot, ConnectionState::Connecting)
            };
            (slot.attempt, change)
        };
        self.announce(change);
        self.log(Severity::Info, format!("Connecting to OBS at {}", target.key()));

        self.open_and_install(target, attempt).await
    }

    /// Connect again with the cached parameters (the Error → Connecting path).
    pub async fn reconnect(&self) -> Result<(), CoreError> {
        let target = self.slot().target.clone().ok_or(CoreError::NotConfigured)?;
        self.connect(target).await
    }

    /// Tear down the link and stop every automatic retry.
    ///
    /// The only path that permanently halts reconnection: pending timers,
    /// in-flight opens and heartbeat checks all observe it.
    pub async fn disconnect(&self) {
        let (active, change) = {
            let mut slot = self.slot();
            slot.auto_reconnect = false;
            slot.attempt += 1;
            slot.health_failures = 0;
            if let Some(timer) = slot.retry.take() {
                timer.cancel();
            }
            let active = slot.active.take();
            if let Some(a) = &active {
                a.cancel.cancel();
            }
            let change = self.set_state(&mut slot, ConnectionState::Disconnected);
            (active, change)
        };

        if let Some(active) = active {
            active.handle.link.close().await;
        }
        if change.0.is_some() {
            self.announce(change);
            self.log(Severity::Info, "Disconnected from OBS");
        }
    }

    async fn open_and_install(&self, target: ConnectTarget, attempt: u64) -> Result<(), CoreError> {
        let key = target.key();
        let link = match self.inner.connector.open(&target).await {
            Ok(link) => link,
            Err(e) => return self.open_failed(&key, attempt, e),
        };

        let Some((handle, cancel, change)) = self.install(Arc::clone(&link), attempt) else {
            debug!(attempt, "discarding link from superseded attempt");
            link.close().await;
            return Err(CoreError::Superseded);
        };
        self.announce(change);
        self.log(Severity::Success, format!("Connected to OBS at {key}"));

        // Closed before the pump subscribed: no Closed signal will arrive.
        if handle.link.is_closed() {
            self.handle_drop(handle.generation, "closed during setup");
            return Ok(());
        }

        if let Err(e) = self.refresh_all_on(&handle).await {
            self.log(Severity::Warning, format!("Initial refresh incomplete: {e}"));
        }

        if self.is_current(handle.generation) {
            self.spawn_heartbeat(handle, cancel);
        }
        Ok(())
    }

    /// Make `link` the live link unless its attempt was superseded.
    fn install(
        &self,
        link: Arc<dyn Link>,
        attempt: u64,
    ) -> Option<(LinkHandle, CancellationToken, StateChange)> {
        let mut slot = self.slot();
        if slot.attempt != attempt || !slot.auto_reconnect {
            return None;
        }
        if let Some(old) = slot.active.take() {
            old.cancel.cancel();
            spawn_close(old.handle.link);
        }
        if let Some(timer) = slot.retry.take() {
            timer.cancel();
        }

        slot.generation += 1;
        let handle = LinkHandle {
            generation: slot.generation,
            link,
        };
        let cancel = CancellationToken::new();
        slot.active = Some(ActiveLink {
            handle: handle.clone(),
            cancel: cancel.clone(),
        });
        slot.health_failures = 0;

        let signals = handle.link.signals();
        self.spawn_pump(handle.clone(), signals, cancel.clone());

        let change = self.set_state(&mut slot, ConnectionState::Connected);
        info!(generation = handle.generation, "link installed");
        Some((handle, cancel, change))
    }

    fn open_failed(
        &self,
        key: &str,
        attempt: u64,
        err: obsdeck_api::Error,
    ) -> Result<(), CoreError> {
        let error = match err {
            obsdeck_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            other => CoreError::ConnectionFailed {
                target: key.to_owned(),
                reason: other.to_string(),
            },
        };

        let retrying = {
            let mut slot = self.slot();
            if slot.attempt != attempt || !slot.auto_reconnect {
                return Err(CoreError::Superseded);
            }
            if slot.state == ConnectionState::Reconnecting {
                let delay = self.inner.settings.retry_delay;
                self.schedule_retry(&mut slot, delay);
                Ok(delay)
            } else {
                Err(self.set_state(&mut slot, ConnectionState::Error))
            }
        };

        match retrying {
            Ok(delay) => self.log(
                Severity::Warning,
                format!("Reconnect failed: {error}; retrying in {}s", delay.as_secs()),
            ),
            Err(change) => {
                self.announce(change);
                self.log(Severity::Error, format!("Connection failed: {error}"));
            }
        }
        Err(error)
    }

    /// React to a lost link: a transport close, a dead notification
    /// stream, or the heartbeat giving up.
    ///
    /// Idempotent per generation. Only a Connected session with
    /// auto-reconnect enabled moves to Reconnecting.
    pub(crate) fn handle_drop(&self, generation: u64, reason: &str) {
        let delay = self.inner.settings.first_retry_delay;
        let change = {
            let mut slot = self.slot();
            let current = slot
                .active
                .as_ref()
                .is_some_and(|a| a.handle.generation == generation);
            if !current {
                debug!(generation, reason, "ignoring drop of superseded link");
                return;
            }
            if !slot.auto_reconnect || slot.state != ConnectionState::Connected {
                return;
            }
            if let Some(active) = slot.active.take() {
                active.cancel.cancel();
                spawn_close(active.handle.link);
            }
            slot.health_failures = 0;
            let change = self.set_state(&mut slot, ConnectionState::Reconnecting);
            self.schedule_retry(&mut slot, delay);
            change
        };
        self.announce(change);
        self.log(
            Severity::Warning,
            format!("Connection lost ({reason}); reconnecting in {}s", delay.as_secs()),
        );
    }

    /// Arm the retry timer, replacing any pending one.
    fn schedule_retry(&self, slot: &mut ConnectionSlot, delay: Duration) {
        if let Some(timer) = slot.retry.take() {
            timer.cancel();
        }
        let token = CancellationToken::new();
        slot.retry = Some(token.clone());
        debug!(delay_ms = delay.as_millis(), "reconnect scheduled");

        let session = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            session.retry_now(&token).await;
        });
    }

    async fn retry_now(&self, token: &CancellationToken) {
        let (target, attempt) = {
            let mut slot = self.slot();
            if token.is_cancelled()
                || !slot.auto_reconnect
                || slot.state != ConnectionState::Reconnecting
            {
                return;
            }
            slot.retry = None;
            let Some(target) = slot.target.clone() else {
                return;
            };
            slot.attempt += 1;
            (target, slot.attempt)
        };

        info!(target = %target.key(), attempt, "attempting reconnect");
        if let Err(e) = self.open_and_install(target, attempt).await {
            debug!(error = %e, "reconnect attempt failed");
        }
    }

    // ── State transitions ────────────────────────────────────────────

    fn set_state(&self, slot: &mut ConnectionSlot, next: ConnectionState) -> StateChange {
        if slot.state == next {
            return StateChange(None);
        }
        debug!(from = %slot.state, to = %next, "connection state");
        slot.state = next;
        slot.state_revision = self.inner.bus.next_revision();
        self.inner.state_tx.send_replace(next);
        StateChange(Some((slot.state_revision, next)))
    }

    fn announce(&self, change: StateChange) {
        if let Some((revision, state)) = change.0 {
            self.inner
                .bus
                .publish(revision, &Update::ConnectionState(state));
        }
    }

    // ── Link access ──────────────────────────────────────────────────

    /// The live link, only while Connected.
    pub(crate) fn link(&self) -> Option<LinkHandle> {
        let slot = self.slot();
        if slot.state != ConnectionState::Connected {
            return None;
        }
        slot.active.as_ref().map(|a| a.handle.clone())
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.slot()
            .active
            .as_ref()
            .is_some_and(|a| a.handle.generation == generation)
    }

    /// Count one heartbeat result. Returns the consecutive failure count,
    /// or `None` if `generation` is no longer live.
    pub(crate) fn record_poll(&self, generation: u64, ok: bool) -> Option<u32> {
        let mut slot = self.slot();
        let current = slot
            .active
            .as_ref()
            .is_some_and(|a| a.handle.generation == generation);
        if !current {
            return None;
        }
        if ok {
            slot.health_failures = 0;
        } else {
            slot.health_failures += 1;
        }
        Some(slot.health_failures)
    }

    fn spawn_pump(
        &self,
        handle: LinkHandle,
        signals: broadcast::Receiver<Arc<Signal>>,
        cancel: CancellationToken,
    ) {
        tokio::spawn(crate::sync::pump(self.clone(), handle, signals, cancel));
    }

    fn spawn_heartbeat(&self, handle: LinkHandle, cancel: CancellationToken) {
        tokio::spawn(crate::heartbeat::run(self.clone(), handle, cancel));
    }

    /// Fire-and-forget a follow-up (refresh, remote enforcement).
    pub(crate) fn spawn_detached<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(task);
    }

    // ── State observation ────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Connection state as a `Stream`, starting with the current value.
    pub fn connection_stream(&self) -> WatchStream<ConnectionState> {
        WatchStream::new(self.inner.state_tx.subscribe())
    }

    /// Consecutive failed heartbeat polls on the live link.
    pub fn health_failures(&self) -> u32 {
        self.slot().health_failures
    }

    /// Register `callback` on `topic`.
    ///
    /// `connectionState` subscribers are called immediately with the
    /// current state. Other stateful topics replay their cached value only
    /// while Connected; `log` never replays.
    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> SubscriptionId
    where
        F: Fn(&Update) + Send + Sync + 'static,
    {
        self.inner
            .bus
            .subscribe(topic, Arc::new(callback), || self.current(topic))
    }

    pub fn unsubscribe(&self, topic: Topic, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(topic, id)
    }

    fn current(&self, topic: Topic) -> Option<(u64, Update)> {
        match topic {
            Topic::Log => None,
            Topic::ConnectionState => {
                let slot = self.slot();
                Some((slot.state_revision, Update::ConnectionState(slot.state)))
            }
            _ if self.is_connected() => self.inner.cache.current(topic),
            _ => None,
        }
    }

    // ── Log feed ─────────────────────────────────────────────────────

    /// Append to the operator log and notify `log` subscribers.
    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        let entry = self.inner.feed.push(severity, message);
        let revision = self.inner.bus.next_revision();
        self.inner.bus.publish(revision, &Update::Log(entry));
    }

    /// Retained log entries, oldest first.
    pub fn log_history(&self) -> Vec<LogEntry> {
        self.inner.feed.history()
    }

    // ── Snapshot accessors (delegate to StateCache) ──────────────────

    pub fn scenes(&self) -> Arc<Vec<Scene>> {
        self.inner.cache.scenes()
    }

    pub fn program_scene(&self) -> Option<String> {
        self.inner.cache.program_scene()
    }

    pub fn preview_scene(&self) -> Option<String> {
        self.inner.cache.preview_scene()
    }

    pub fn audio_sources(&self) -> Arc<Vec<AudioChannel>> {
        self.inner.cache.audio()
    }

    pub fn inputs(&self) -> Arc<Vec<InputInfo>> {
        self.inner.cache.inputs()
    }

    pub fn transition(&self) -> Arc<TransitionConfig> {
        self.inner.cache.transition()
    }

    pub fn studio_mode(&self) -> bool {
        self.inner.cache.studio_mode()
    }

    pub fn status(&self) -> Arc<StreamStatus> {
        self.inner.cache.status()
    }
}

fn spawn_close(link: Arc<dyn Link>) {
    tokio::spawn(async move { link.close().await });
}
