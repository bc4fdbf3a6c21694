//! Aggregation controller - the entry point for quickspace collaborators
//!
//! Composes the three source adapters, the dispatch queue and the listener
//! registry. Its pause/resume lifecycle (`stop`/`start`) follows the
//! visibility of the widget surface.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use quickspace_sources::{
    EventSink, MediaProvider, MediaSource, NormalizedEvent, NotificationProvider,
    NotificationSource, SourceAdapter, SourceError, SourceKind, WeatherProvider, WeatherSource,
};
use tokio::sync::watch;

use crate::config::QuickspaceConfig;
use crate::error::Result;
use crate::model::{ViewModel, WeatherTemp};
use crate::registry::{Added, ListenerRegistry, OnDataListener};
use crate::worker::{queue_channel, spawn_dispatch_queue, Command, QueueHandle};

/// Builder for [`AggregationController`]
///
/// Providers left unset are treated as absent: their adapters stay
/// inactive and contribute nothing.
#[derive(Default)]
pub struct ControllerBuilder {
    config: QuickspaceConfig,
    media: Option<Arc<dyn MediaProvider>>,
    notifications: Option<Arc<dyn NotificationProvider>>,
    weather: Option<Arc<dyn WeatherProvider>>,
}

impl ControllerBuilder {
    pub fn config(mut self, config: QuickspaceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn media_provider(mut self, provider: Arc<dyn MediaProvider>) -> Self {
        self.media = Some(provider);
        self
    }

    pub fn notification_provider(mut self, provider: Arc<dyn NotificationProvider>) -> Self {
        self.notifications = Some(provider);
        self
    }

    pub fn weather_provider(mut self, provider: Arc<dyn WeatherProvider>) -> Self {
        self.weather = Some(provider);
        self
    }

    /// Spawn the dispatch queue and wire the adapters to it
    pub fn build(self) -> Result<AggregationController> {
        let (queue, commands) = queue_channel();
        let registry = Arc::new(ListenerRegistry::new());
        let (published, snapshots) = watch::channel(ViewModel::default());

        let worker = spawn_dispatch_queue(
            self.config.queue_name.clone(),
            queue.clone(),
            commands,
            Arc::clone(&registry),
            published,
        )?;
        let queue_thread = worker.thread().id();

        let sink: Arc<dyn EventSink> = Arc::new(queue.clone());
        let media = Arc::new(MediaSource::new(self.media, Arc::clone(&sink)));
        let notifications = Arc::new(
            NotificationSource::new(self.notifications, Arc::clone(&sink))
                .with_media_refresh(media.refresher()),
        );
        let weather = Arc::new(WeatherSource::new(
            self.weather,
            sink,
            self.config.weather_enabled,
        ));

        tracing::debug!("Aggregation controller built with {:?}", self.config);

        Ok(AggregationController {
            config: self.config,
            media,
            notifications,
            weather,
            registry,
            queue,
            snapshots,
            running: AtomicBool::new(false),
            activations: Arc::new(PendingActivations::default()),
            worker: Mutex::new(Some(worker)),
            queue_thread,
        })
    }
}

/// Aggregates media, notification and weather state for the quickspace widget
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use quickspace_state::{AggregationController, OnDataListener};
///
/// let controller = Arc::new(
///     AggregationController::builder()
///         .media_provider(media)
///         .weather_provider(weather)
///         .build()?,
/// );
///
/// // A strong reference here would keep the controller alive forever
/// let view = Arc::downgrade(&controller);
/// controller.add_listener(Arc::new(move || {
///     let Some(view) = view.upgrade() else { return };
///     if view.is_media_available() {
///         println!("Now playing: {:?} by {:?}", view.current_track(), view.current_artist());
///     }
/// }));
///
/// // Widget hidden / shown again
/// controller.stop();
/// controller.start();
/// ```
pub struct AggregationController {
    config: QuickspaceConfig,
    media: Arc<MediaSource>,
    notifications: Arc<NotificationSource>,
    weather: Arc<WeatherSource>,
    registry: Arc<ListenerRegistry>,
    queue: QueueHandle,
    snapshots: watch::Receiver<ViewModel>,
    running: AtomicBool,
    activations: Arc<PendingActivations>,
    worker: Mutex<Option<JoinHandle<()>>>,
    queue_thread: ThreadId,
}

impl AggregationController {
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }

    pub fn config(&self) -> &QuickspaceConfig {
        &self.config
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Activate all sources and deliver the current snapshot to listeners
    ///
    /// Returns without waiting on providers. Each adapter activates on its
    /// own thread, so a hung, failing or panicking provider stalls only its
    /// own source. The current snapshot is dispatched right away; whatever
    /// the sources report later arrives as ordinary updates.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Controller already running, re-checking sources");
        } else {
            tracing::debug!("Starting aggregation controller");
        }

        for adapter in self.adapters() {
            let kind = adapter.kind();
            self.activations.begin();

            let pending = Arc::clone(&self.activations);
            let activating = Arc::clone(&adapter);
            let spawned = thread::Builder::new()
                .name(format!("quickspace-activate-{}", kind))
                .spawn(move || {
                    activate_isolated(activating.as_ref());
                    pending.finish();
                });

            if let Err(e) = spawned {
                self.activations.finish();
                tracing::warn!(
                    "No activation thread for {} source ({}), activating inline",
                    kind,
                    e
                );
                activate_isolated(adapter.as_ref());
            }
        }

        self.enqueue(Command::Dispatch);
    }

    /// Deactivate all sources
    ///
    /// The last known state stays readable. Safe to call when some sources
    /// never activated.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::debug!("Stopping aggregation controller");
        }

        for adapter in self.adapters() {
            if catch_unwind(AssertUnwindSafe(|| adapter.deactivate())).is_err() {
                tracing::warn!("{} source panicked during deactivation", adapter.kind());
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_source_active(&self, kind: SourceKind) -> bool {
        self.adapters()
            .iter()
            .find(|adapter| adapter.kind() == kind)
            .is_some_and(|adapter| adapter.is_active())
    }

    /// Stop all sources and shut the dispatch queue down
    pub fn shutdown(&self) {
        self.stop();
        self.queue.send(Command::Shutdown);

        if let Some(worker) = self.worker.lock().take() {
            // A listener dropping the controller runs on the queue itself
            if thread::current().id() != self.queue_thread && worker.join().is_err() {
                tracing::warn!("Dispatch queue panicked");
            }
        }
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register an observer
    ///
    /// The first listener starts the controller. Later listeners receive an
    /// immediate notification of their own so they can render current state.
    pub fn add_listener(&self, listener: Arc<dyn OnDataListener>) -> Added {
        let added = self.registry.add(Arc::clone(&listener));
        match added {
            Added::First => self.start(),
            Added::Joined => self.enqueue(Command::Greet(listener)),
            Added::Duplicate => tracing::trace!("Listener already registered"),
        }
        added
    }

    /// Unregister an observer
    ///
    /// Removing the last listener does not stop the controller.
    pub fn remove_listener(&self, listener: &Arc<dyn OnDataListener>) -> bool {
        self.registry.remove(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    /// Channel that yields every changed view-model
    pub fn watch(&self) -> watch::Receiver<ViewModel> {
        self.snapshots.clone()
    }

    // ========================================================================
    // External inputs
    // ========================================================================

    /// Merge the flag computed by the quick-events controller
    pub fn set_quick_event(&self, has_event: bool) {
        self.enqueue(Command::Apply(NormalizedEvent::QuickEventChanged(has_event)));
    }

    /// Re-scan media sessions on the dispatch queue
    pub fn refresh_media(&self) {
        self.media.request_refresh();
    }

    /// Re-query the weather provider on the dispatch queue
    pub fn refresh_weather(&self) {
        self.weather.request_query();
    }

    /// Block until pending source activations have finished and everything
    /// queued so far has been applied and delivered
    ///
    /// Returns false on timeout (including a provider stuck in
    /// registration), when the queue is gone, or when called from a listener
    /// (which runs on the queue and would wait on itself).
    pub fn flush(&self, timeout: Duration) -> bool {
        if thread::current().id() == self.queue_thread {
            return false;
        }

        let deadline = Instant::now() + timeout;
        if !self.activations.wait_until(deadline) {
            return false;
        }

        // Dirty applies queue their dispatch behind the first barrier
        for _ in 0..2 {
            let (tx, rx) = std_mpsc::channel();
            if !self.queue.send(Command::Barrier(tx)) {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if rx.recv_timeout(remaining).is_err() {
                return false;
            }
        }
        true
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Copy of the current view-model
    pub fn snapshot(&self) -> ViewModel {
        self.snapshots.borrow().clone()
    }

    pub fn is_media_available(&self) -> bool {
        self.snapshots.borrow().is_media_available()
    }

    pub fn is_playing(&self) -> bool {
        self.snapshots.borrow().is_playing()
    }

    pub fn current_track(&self) -> Option<String> {
        self.snapshots.borrow().track_title().map(str::to_string)
    }

    pub fn current_artist(&self) -> Option<String> {
        self.snapshots.borrow().artist().map(str::to_string)
    }

    pub fn weather_condition(&self) -> Option<String> {
        self.snapshots.borrow().weather_condition().map(str::to_string)
    }

    pub fn weather_temp(&self) -> Option<WeatherTemp> {
        self.snapshots.borrow().weather_temp().cloned()
    }

    /// Formatted weather line, honoring the `weather_detailed` setting
    pub fn weather_text(&self) -> Option<String> {
        self.snapshots
            .borrow()
            .weather_text(self.config.weather_detailed)
    }

    pub fn is_weather_available(&self) -> bool {
        self.config.weather_enabled && self.snapshots.borrow().is_weather_enabled()
    }

    pub fn has_quick_event(&self) -> bool {
        self.snapshots.borrow().has_quick_event()
    }

    fn adapters(&self) -> [Arc<dyn SourceAdapter>; 3] {
        [
            Arc::clone(&self.media) as Arc<dyn SourceAdapter>,
            Arc::clone(&self.notifications) as Arc<dyn SourceAdapter>,
            Arc::clone(&self.weather) as Arc<dyn SourceAdapter>,
        ]
    }

    fn enqueue(&self, command: Command) {
        if !self.queue.send(command) {
            tracing::warn!("{}", SourceError::QueueClosed);
        }
    }
}

fn activate_isolated(adapter: &dyn SourceAdapter) {
    if catch_unwind(AssertUnwindSafe(|| adapter.activate())).is_err() {
        tracing::warn!("{} source panicked during activation", adapter.kind());
    }
}

/// Number of activation threads that have not returned yet
#[derive(Default)]
struct PendingActivations {
    count: Mutex<usize>,
    settled: Condvar,
}

impl PendingActivations {
    fn begin(&self) {
        *self.count.lock() += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.settled.notify_all();
        }
    }

    /// Wait for every activation to return; false if the deadline passes first
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut count = self.count.lock();
        while *count > 0 {
            if self.settled.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

impl Drop for AggregationController {
    fn drop(&mut self) {
        tracing::debug!(
            "AggregationController dropping, {} listeners registered",
            self.registry.len()
        );
        self.shutdown();
    }
}

impl std::fmt::Debug for AggregationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationController")
            .field("running", &self.is_running())
            .field("listeners", &self.registry.len())
            .field("snapshot", &*self.snapshots.borrow())
            .finish()
    }
}
