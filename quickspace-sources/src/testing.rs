//! In-memory providers and a recording sink for tests
//!
//! Enabled with the `testing` feature. Fakes never hold their own locks
//! while invoking callbacks, so adapters may unregister from inside one.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{ProviderError, Result};
use crate::event::{NormalizedEvent, PlaybackState, WeatherSnapshot};
use crate::provider::{
    MediaCallback, MediaMetadata, MediaProvider, MediaSession, MediaSessionEvent,
    NotificationCallback, NotificationEvent, NotificationProvider, ProviderToken, WeatherCallback,
    WeatherEvent, WeatherProvider,
};
use crate::sink::{DeferredPull, EventSink};

/// Registration table shared by the fakes
struct Callbacks<C> {
    next: AtomicU64,
    entries: Mutex<Vec<(ProviderToken, C)>>,
    peak: AtomicUsize,
    reject: AtomicBool,
}

impl<C: Clone> Callbacks<C> {
    fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
            peak: AtomicUsize::new(0),
            reject: AtomicBool::new(false),
        }
    }

    fn register(&self, callback: C) -> std::result::Result<ProviderToken, ProviderError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(ProviderError::Registration("rejected by fake".to_string()));
        }
        let token = ProviderToken(self.next.fetch_add(1, Ordering::SeqCst));
        let mut entries = self.entries.lock();
        entries.push((token, callback));
        self.peak.fetch_max(entries.len(), Ordering::SeqCst);
        Ok(token)
    }

    fn unregister(&self, token: ProviderToken) {
        self.entries.lock().retain(|(t, _)| *t != token);
    }

    fn snapshot(&self) -> Vec<C> {
        self.entries.lock().iter().map(|(_, c)| c.clone()).collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Most registrations ever live at the same time
    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Media
// ============================================================================

pub struct FakeSession {
    id: String,
    state: Mutex<Option<PlaybackState>>,
    metadata: Mutex<Option<MediaMetadata>>,
    register_delay: Mutex<Option<Duration>>,
    panic_on_register: AtomicBool,
    callbacks: Callbacks<MediaCallback>,
}

impl FakeSession {
    pub fn new(id: &str, state: Option<PlaybackState>, metadata: Option<MediaMetadata>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            state: Mutex::new(state),
            metadata: Mutex::new(metadata),
            register_delay: Mutex::new(None),
            panic_on_register: AtomicBool::new(false),
            callbacks: Callbacks::new(),
        })
    }

    pub fn playing(id: &str, title: &str, artist: &str) -> Arc<Self> {
        Self::new(
            id,
            Some(PlaybackState::Playing),
            Some(MediaMetadata::new(title, artist)),
        )
    }

    pub fn set_state(&self, state: PlaybackState) {
        *self.state.lock() = Some(state);
    }

    pub fn set_metadata(&self, metadata: Option<MediaMetadata>) {
        *self.metadata.lock() = metadata;
    }

    pub fn reject_registrations(&self, reject: bool) {
        self.callbacks.reject.store(reject, Ordering::SeqCst);
    }

    /// Make `register_callback` sleep before it registers
    pub fn set_register_delay(&self, delay: Option<Duration>) {
        *self.register_delay.lock() = delay;
    }

    /// Make `register_callback` panic
    pub fn panic_on_register(&self, panic: bool) {
        self.panic_on_register.store(panic, Ordering::SeqCst);
    }

    /// Deliver an event to every registered callback
    pub fn emit(&self, event: MediaSessionEvent) {
        for callback in self.callbacks.snapshot() {
            callback(event.clone());
        }
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    pub fn peak_callback_count(&self) -> usize {
        self.callbacks.peak()
    }
}

impl MediaSession for FakeSession {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn playback_state(&self) -> Option<PlaybackState> {
        *self.state.lock()
    }

    fn metadata(&self) -> Option<MediaMetadata> {
        self.metadata.lock().clone()
    }

    fn register_callback(
        &self,
        callback: MediaCallback,
    ) -> std::result::Result<ProviderToken, ProviderError> {
        if self.panic_on_register.load(Ordering::SeqCst) {
            panic!("media session {} crashed during registration", self.id);
        }
        let delay = *self.register_delay.lock();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        self.callbacks.register(callback)
    }

    fn unregister_callback(&self, token: ProviderToken) {
        self.callbacks.unregister(token);
    }
}

#[derive(Default)]
pub struct FakeMediaProvider {
    sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeMediaProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_session(&self, session: Arc<FakeSession>) {
        self.sessions.lock().push(session);
    }

    pub fn remove_session(&self, id: &str) {
        self.sessions.lock().retain(|s| s.id != id);
    }
}

impl MediaProvider for FakeMediaProvider {
    fn active_sessions(&self) -> Vec<Arc<dyn MediaSession>> {
        self.sessions
            .lock()
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn MediaSession>)
            .collect()
    }
}

// ============================================================================
// Notifications
// ============================================================================

pub struct FakeNotificationProvider {
    callbacks: Callbacks<NotificationCallback>,
}

impl FakeNotificationProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            callbacks: Callbacks::new(),
        })
    }

    pub fn reject_registrations(&self, reject: bool) {
        self.callbacks.reject.store(reject, Ordering::SeqCst);
    }

    pub fn emit(&self, event: NotificationEvent) {
        for callback in self.callbacks.snapshot() {
            callback(event.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.callbacks.len()
    }
}

impl NotificationProvider for FakeNotificationProvider {
    fn add_listener(
        &self,
        callback: NotificationCallback,
    ) -> std::result::Result<ProviderToken, ProviderError> {
        self.callbacks.register(callback)
    }

    fn remove_listener(&self, token: ProviderToken) {
        self.callbacks.unregister(token);
    }
}

// ============================================================================
// Weather
// ============================================================================

pub struct FakeWeatherProvider {
    snapshot: Mutex<Option<WeatherSnapshot>>,
    failing: AtomicBool,
    queries: AtomicUsize,
    callbacks: Callbacks<WeatherCallback>,
}

impl FakeWeatherProvider {
    pub fn new(snapshot: Option<WeatherSnapshot>) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(snapshot),
            failing: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
            callbacks: Callbacks::new(),
        })
    }

    pub fn set_snapshot(&self, snapshot: Option<WeatherSnapshot>) {
        *self.snapshot.lock() = snapshot;
    }

    /// Make subsequent queries fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn reject_registrations(&self, reject: bool) {
        self.callbacks.reject.store(reject, Ordering::SeqCst);
    }

    pub fn emit(&self, event: WeatherEvent) {
        for callback in self.callbacks.snapshot() {
            callback(event);
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn observer_count(&self) -> usize {
        self.callbacks.len()
    }
}

impl WeatherProvider for FakeWeatherProvider {
    fn query_weather(&self) -> std::result::Result<Option<WeatherSnapshot>, ProviderError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Query("weather service unreachable".to_string()));
        }
        Ok(self.snapshot.lock().clone())
    }

    fn add_observer(
        &self,
        callback: WeatherCallback,
    ) -> std::result::Result<ProviderToken, ProviderError> {
        self.callbacks.register(callback)
    }

    fn remove_observer(&self, token: ProviderToken) {
        self.callbacks.unregister(token);
    }
}

/// Build a weather snapshot with a dummy condition code
pub fn weather(condition: &str, temp: &str, unit: &str) -> WeatherSnapshot {
    WeatherSnapshot {
        condition: condition.to_string(),
        condition_code: 800,
        temp: temp.to_string(),
        temp_unit: unit.to_string(),
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Sink that records pushed events and holds deferred pulls until run
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<NormalizedEvent>>,
    deferred: Mutex<Vec<(&'static str, DeferredPull)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<NormalizedEvent> {
        self.events.lock().clone()
    }

    pub fn take_events(&self) -> Vec<NormalizedEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn deferred_labels(&self) -> Vec<&'static str> {
        self.deferred.lock().iter().map(|(label, _)| *label).collect()
    }

    /// Run every pending pull, recording what it produced
    ///
    /// Returns how many pulls ran.
    pub fn run_deferred(&self) -> usize {
        let pulls = std::mem::take(&mut *self.deferred.lock());
        let count = pulls.len();
        for (_, pull) in pulls {
            let produced = pull();
            self.events.lock().extend(produced);
        }
        count
    }
}

impl EventSink for RecordingSink {
    fn push(&self, event: NormalizedEvent) -> Result<()> {
        self.events.lock().push(event);
        Ok(())
    }

    fn defer(&self, label: &'static str, pull: DeferredPull) -> Result<()> {
        self.deferred.lock().push((label, pull));
        Ok(())
    }
}
