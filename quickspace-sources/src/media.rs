//! Media session adapter
//!
//! Tracks the first session that is actually playing and keeps a single
//! callback bound to it. Session callbacks are normalized and pushed to the
//! sink; anything that needs a re-scan is deferred to the dispatch queue.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::adapter::{SourceAdapter, SourceKind, Subscription};
use crate::error::{Result, SourceError};
use crate::event::{NormalizedEvent, PlaybackState};
use crate::provider::{MediaCallback, MediaMetadata, MediaProvider, MediaSession, MediaSessionEvent};
use crate::sink::EventSink;

/// Adapter over a [`MediaProvider`]
pub struct MediaSource {
    inner: Arc<MediaInner>,
}

struct MediaInner {
    provider: Option<Arc<dyn MediaProvider>>,
    sink: Arc<dyn EventSink>,
    state: Mutex<MediaState>,
    /// Held across a whole scan-register-install sequence so activation and
    /// queued re-scans never register side by side
    rebind: Mutex<()>,
}

#[derive(Default)]
struct MediaState {
    active: bool,
    binding: Option<SessionBinding>,
}

/// The one session callback this adapter holds
struct SessionBinding {
    session_id: String,
    _subscription: Subscription,
}

/// Cloneable trigger for a deferred media re-scan
///
/// Handed to other adapters whose events imply the playing session may
/// have changed.
#[derive(Clone)]
pub struct MediaRefresher {
    inner: Arc<MediaInner>,
}

impl MediaRefresher {
    /// Schedule a re-scan on the dispatch queue
    pub fn request(&self) {
        self.inner.request_refresh();
    }
}

impl MediaSource {
    pub fn new(provider: Option<Arc<dyn MediaProvider>>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Arc::new(MediaInner {
                provider,
                sink,
                state: Mutex::new(MediaState::default()),
                rebind: Mutex::new(()),
            }),
        }
    }

    /// First session whose playback state is exactly `Playing`
    ///
    /// Ties are broken by provider iteration order.
    pub fn playing_session(&self) -> Option<Arc<dyn MediaSession>> {
        self.inner.playing_session()
    }

    /// Id of the session the callback is currently bound to
    pub fn bound_session(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .binding
            .as_ref()
            .map(|b| b.session_id.clone())
    }

    pub fn refresher(&self) -> MediaRefresher {
        MediaRefresher {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Schedule a re-scan of active sessions on the dispatch queue
    pub fn request_refresh(&self) {
        self.inner.request_refresh();
    }
}

impl SourceAdapter for MediaSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Media
    }

    fn activate(&self) {
        if self.inner.provider.is_none() {
            tracing::debug!("{}", SourceError::ProviderUnavailable(SourceKind::Media));
            return;
        }

        let _binding = self.inner.rebind.lock();
        {
            let mut state = self.inner.state.lock();
            if state.active {
                tracing::trace!("Media source already active");
                return;
            }
            state.active = true;
        }

        // A failing or panicking provider leaves us inactive
        let guard = ActivationGuard {
            state: &self.inner.state,
            armed: true,
        };
        let playing = self.inner.playing_session();
        if let Err(e) = self.inner.bind(playing.as_ref()) {
            tracing::warn!("Media source activation failed: {}", e);
            return;
        }
        guard.disarm();

        tracing::debug!(
            "Media source activated (playing session: {:?})",
            playing.as_ref().map(|s| s.id())
        );
        self.inner.request_refresh();
    }

    fn deactivate(&self) {
        let binding = {
            let mut state = self.inner.state.lock();
            if !state.active && state.binding.is_none() {
                return;
            }
            state.active = false;
            state.binding.take()
        };
        drop(binding);
        tracing::debug!("Media source deactivated");
    }

    fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }
}

impl MediaInner {
    fn playing_session(&self) -> Option<Arc<dyn MediaSession>> {
        let provider = self.provider.as_ref()?;
        provider
            .active_sessions()
            .into_iter()
            .find(|session| session.playback_state() == Some(PlaybackState::Playing))
    }

    /// Point the single session callback at `session`
    ///
    /// Callers hold `self.rebind`. The previous registration is released
    /// before a new one is made. The state lock is never held across
    /// provider calls.
    fn bind(self: &Arc<Self>, session: Option<&Arc<dyn MediaSession>>) -> Result<()> {
        let target = session.map(|s| s.id());

        let previous = {
            let mut state = self.state.lock();
            let current = state.binding.as_ref().map(|b| b.session_id.as_str());
            if current == target.as_deref() {
                return Ok(());
            }
            state.binding.take()
        };
        drop(previous);

        let (Some(session), Some(session_id)) = (session, target) else {
            return Ok(());
        };

        let weak = Arc::downgrade(self);
        let callback_session = session_id.clone();
        let callback: MediaCallback = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_session_event(&callback_session, event);
            }
        });

        let token = session
            .register_callback(callback)
            .map_err(|source| SourceError::Registration {
                kind: SourceKind::Media,
                source,
            })?;

        let owner = Arc::clone(session);
        let binding = SessionBinding {
            session_id,
            _subscription: Subscription::new(token, move |token| owner.unregister_callback(token)),
        };

        let displaced = {
            let mut state = self.state.lock();
            if state.active {
                state.binding.replace(binding)
            } else {
                // Deactivated while registering
                Some(binding)
            }
        };
        drop(displaced);

        Ok(())
    }

    fn on_session_event(self: &Arc<Self>, session_id: &str, event: MediaSessionEvent) {
        {
            let state = self.state.lock();
            let bound = state.binding.as_ref().map(|b| b.session_id.as_str());
            if !state.active || bound != Some(session_id) {
                tracing::trace!("Ignoring event from unbound session {}", session_id);
                return;
            }
        }

        tracing::trace!("Media session {} event: {:?}", session_id, event);

        match event {
            MediaSessionEvent::MetadataChanged(metadata) => {
                self.emit(metadata_event(metadata.unwrap_or_default()));
            }
            MediaSessionEvent::PlaybackStateChanged(state) => {
                self.emit(NormalizedEvent::MediaPlaybackStateChanged(state));
            }
            MediaSessionEvent::SessionDestroyed => {
                let binding = self.state.lock().binding.take();
                drop(binding);
                self.emit(NormalizedEvent::MediaSessionLost);
            }
            MediaSessionEvent::QueueChanged | MediaSessionEvent::ExtrasChanged => {
                self.request_refresh();
            }
        }
    }

    fn emit(&self, event: NormalizedEvent) {
        if let Err(e) = self.sink.push(event) {
            tracing::debug!("Dropping media event: {}", e);
        }
    }

    fn request_refresh(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        if let Err(e) = self.sink.defer("media_refresh", Box::new(move || inner.refresh())) {
            tracing::debug!("Media refresh not scheduled: {}", e);
        }
    }

    /// Re-scan active sessions, re-bind the callback and report the result
    fn refresh(self: &Arc<Self>) -> Vec<NormalizedEvent> {
        let _binding = self.rebind.lock();
        if !self.state.lock().active {
            return Vec::new();
        }

        let playing = self.playing_session();
        if let Err(e) = self.bind(playing.as_ref()) {
            tracing::warn!("Media re-bind failed: {}", e);
        }

        session_events(playing.as_deref())
    }
}

/// Clears `active` if activation returns early or unwinds
struct ActivationGuard<'a> {
    state: &'a Mutex<MediaState>,
    armed: bool,
}

impl ActivationGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ActivationGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.lock().active = false;
        }
    }
}

/// Events describing the given playing session, or its absence
fn session_events(playing: Option<&dyn MediaSession>) -> Vec<NormalizedEvent> {
    match playing {
        Some(session) => vec![
            NormalizedEvent::MediaPlaybackStateChanged(PlaybackState::Playing),
            metadata_event(session.metadata().unwrap_or_default()),
        ],
        None => vec![NormalizedEvent::MediaSessionLost],
    }
}

fn metadata_event(metadata: MediaMetadata) -> NormalizedEvent {
    NormalizedEvent::MediaMetadataChanged {
        title: metadata.title,
        artist: metadata.artist,
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::testing::{FakeMediaProvider, FakeSession, RecordingSink};

    fn setup() -> (Arc<FakeMediaProvider>, Arc<RecordingSink>, MediaSource) {
        let provider = FakeMediaProvider::new();
        let sink = RecordingSink::new();
        let source = MediaSource::new(Some(provider.clone()), sink.clone());
        (provider, sink, source)
    }

    #[test]
    fn test_playing_session_first_match_wins() {
        let (provider, _sink, source) = setup();
        provider.add_session(FakeSession::new("paused", Some(PlaybackState::Paused), None));
        provider.add_session(FakeSession::new("buffering", Some(PlaybackState::Buffering), None));
        provider.add_session(FakeSession::playing("first", "A", "B"));
        provider.add_session(FakeSession::playing("second", "C", "D"));

        let playing = source.playing_session().map(|s| s.id());
        assert_eq!(playing.as_deref(), Some("first"));
    }

    #[test]
    fn test_activate_twice_registers_once() {
        let (provider, sink, source) = setup();
        let session = FakeSession::playing("s1", "Song", "Artist");
        provider.add_session(session.clone());

        source.activate();
        source.activate();
        assert!(source.is_active());
        assert_eq!(session.callback_count(), 1);

        session.emit(MediaSessionEvent::PlaybackStateChanged(PlaybackState::Paused));
        assert_eq!(
            sink.events(),
            vec![NormalizedEvent::MediaPlaybackStateChanged(PlaybackState::Paused)]
        );
    }

    #[test]
    fn test_no_playing_session_reports_lost() {
        let (provider, sink, source) = setup();
        provider.add_session(FakeSession::new("idle", Some(PlaybackState::Stopped), None));

        source.activate();
        assert!(source.is_active());
        assert_eq!(source.bound_session(), None);

        sink.run_deferred();
        assert_eq!(sink.events(), vec![NormalizedEvent::MediaSessionLost]);
    }

    #[test]
    fn test_session_destroyed_releases_binding() {
        let (provider, sink, source) = setup();
        let session = FakeSession::playing("s1", "Song", "Artist");
        provider.add_session(session.clone());
        source.activate();

        session.emit(MediaSessionEvent::SessionDestroyed);

        assert_eq!(sink.events(), vec![NormalizedEvent::MediaSessionLost]);
        assert_eq!(session.callback_count(), 0);
        assert_eq!(source.bound_session(), None);
    }

    #[test]
    fn test_refresh_rebinds_to_new_session() {
        let (provider, sink, source) = setup();
        let first = FakeSession::playing("s1", "One", "Artist");
        provider.add_session(first.clone());
        source.activate();
        assert_eq!(source.bound_session().as_deref(), Some("s1"));

        first.set_state(PlaybackState::Paused);
        let second = FakeSession::playing("s2", "Two", "Artist");
        provider.add_session(second.clone());

        source.request_refresh();
        sink.run_deferred();

        assert_eq!(source.bound_session().as_deref(), Some("s2"));
        assert_eq!(first.callback_count(), 0);
        assert_eq!(second.callback_count(), 1);
    }

    #[test]
    fn test_queue_changed_defers_refresh() {
        let (provider, sink, source) = setup();
        let session = FakeSession::playing("s1", "Song", "Artist");
        provider.add_session(session.clone());
        source.activate();
        sink.run_deferred();
        sink.take_events();

        session.set_metadata(Some(MediaMetadata::new("Next Song", "Artist")));
        session.emit(MediaSessionEvent::QueueChanged);
        assert!(sink.events().is_empty());

        sink.run_deferred();
        assert_eq!(
            sink.events(),
            vec![
                NormalizedEvent::MediaPlaybackStateChanged(PlaybackState::Playing),
                NormalizedEvent::MediaMetadataChanged {
                    title: Some("Next Song".to_string()),
                    artist: Some("Artist".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_deactivate_ignores_late_events() {
        let (provider, sink, source) = setup();
        let session = FakeSession::playing("s1", "Song", "Artist");
        provider.add_session(session.clone());
        source.activate();
        source.deactivate();
        source.deactivate();

        assert!(!source.is_active());
        assert_eq!(session.callback_count(), 0);

        // Pending refresh from activation must not report anything
        sink.run_deferred();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_rejected_registration_stays_inactive() {
        let (provider, _sink, source) = setup();
        let session = FakeSession::playing("s1", "Song", "Artist");
        session.reject_registrations(true);
        provider.add_session(session);

        source.activate();
        assert!(!source.is_active());
    }

    #[test]
    fn test_rescan_during_slow_registration_registers_once() {
        let (provider, sink, source) = setup();
        let session = FakeSession::playing("s1", "Song", "Artist");
        session.set_register_delay(Some(Duration::from_millis(200)));
        provider.add_session(session.clone());

        thread::scope(|scope| {
            scope.spawn(|| source.activate());
            thread::sleep(Duration::from_millis(50));

            // A notification-driven re-scan lands while activation registers
            source.request_refresh();
            sink.run_deferred();
        });

        assert_eq!(session.peak_callback_count(), 1);
        assert_eq!(session.callback_count(), 1);
        assert_eq!(source.bound_session().as_deref(), Some("s1"));

        session.emit(MediaSessionEvent::PlaybackStateChanged(PlaybackState::Paused));
        let paused = sink
            .events()
            .into_iter()
            .filter(|e| *e == NormalizedEvent::MediaPlaybackStateChanged(PlaybackState::Paused))
            .count();
        assert_eq!(paused, 1);
    }

    #[test]
    fn test_panicking_registration_leaves_source_inactive() {
        let (provider, _sink, source) = setup();
        let session = FakeSession::playing("s1", "Song", "Artist");
        session.panic_on_register(true);
        provider.add_session(session.clone());

        let result = catch_unwind(AssertUnwindSafe(|| source.activate()));
        assert!(result.is_err());
        assert!(!source.is_active());

        session.panic_on_register(false);
        source.activate();
        assert!(source.is_active());
        assert_eq!(session.callback_count(), 1);
    }

    #[test]
    fn test_missing_provider() {
        let sink = RecordingSink::new();
        let source = MediaSource::new(None, sink.clone());
        source.activate();
        assert!(!source.is_active());
        assert!(source.playing_session().is_none());
    }
}
