//! Dispatch queue
//!
//! A dedicated thread running a single-threaded tokio runtime. It is the
//! only place the view-model is mutated and the only place listeners are
//! invoked, so applies and deliveries never overlap.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::{self, JoinHandle};

use quickspace_sources::{DeferredPull, EventSink, NormalizedEvent, SourceError};
use tokio::sync::{mpsc, watch};

use crate::model::ViewModel;
use crate::reconciler::StateReconciler;
use crate::registry::{ListenerRegistry, OnDataListener};

/// Work items processed by the dispatch queue
pub(crate) enum Command {
    /// Fold one event into the view-model
    Apply(NormalizedEvent),
    /// Run a pull and fold everything it produced
    Defer {
        label: &'static str,
        pull: DeferredPull,
    },
    /// Notify every listener registered when this runs
    Dispatch,
    /// Notify a single newly added listener
    Greet(Arc<dyn OnDataListener>),
    /// Signal once everything queued before it has been processed
    Barrier(std_mpsc::Sender<()>),
    /// Stop the queue
    Shutdown,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Apply(event) => write!(f, "Apply({})", event.name()),
            Command::Defer { label, .. } => write!(f, "Defer({})", label),
            Command::Dispatch => f.write_str("Dispatch"),
            Command::Greet(_) => f.write_str("Greet"),
            Command::Barrier(_) => f.write_str("Barrier"),
            Command::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Sending side of the dispatch queue
///
/// Sends never block, so this is safe to use from provider callback threads.
#[derive(Clone)]
pub(crate) struct QueueHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl QueueHandle {
    pub(crate) fn send(&self, command: Command) -> bool {
        self.tx.send(command).is_ok()
    }
}

impl EventSink for QueueHandle {
    fn push(&self, event: NormalizedEvent) -> quickspace_sources::Result<()> {
        self.tx
            .send(Command::Apply(event))
            .map_err(|_| SourceError::QueueClosed)
    }

    fn defer(&self, label: &'static str, pull: DeferredPull) -> quickspace_sources::Result<()> {
        self.tx
            .send(Command::Defer { label, pull })
            .map_err(|_| SourceError::QueueClosed)
    }
}

/// Create the queue channel
pub(crate) fn queue_channel() -> (QueueHandle, mpsc::UnboundedReceiver<Command>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueHandle { tx }, rx)
}

/// Spawns the dispatch queue thread
///
/// The queue owns the reconciler and publishes every changed view-model on
/// `published` before scheduling a listener dispatch.
pub(crate) fn spawn_dispatch_queue(
    name: String,
    handle: QueueHandle,
    commands: mpsc::UnboundedReceiver<Command>,
    registry: Arc<ListenerRegistry>,
    published: watch::Sender<ViewModel>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name(name).spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Failed to create tokio runtime for dispatch queue: {}", e);
                return;
            }
        };

        rt.block_on(run_queue(handle, commands, registry, published));
    })
}

async fn run_queue(
    handle: QueueHandle,
    mut commands: mpsc::UnboundedReceiver<Command>,
    registry: Arc<ListenerRegistry>,
    published: watch::Sender<ViewModel>,
) {
    let mut reconciler = StateReconciler::new();

    tracing::info!("Dispatch queue started");

    while let Some(command) = commands.recv().await {
        tracing::trace!("Dispatch queue: {:?}", command);

        match command {
            Command::Apply(event) => {
                let name = event.name();
                if reconciler.apply(event) {
                    tracing::debug!("View-model changed by {}", name);
                    publish(&reconciler, &published, &handle);
                }
            }
            Command::Defer { label, pull } => {
                let produced = match catch_unwind(AssertUnwindSafe(pull)) {
                    Ok(events) => events,
                    Err(_) => {
                        tracing::warn!("Deferred pull {} panicked", label);
                        continue;
                    }
                };

                // Coalesce: one dispatch however many events the pull produced
                let mut dirty = false;
                for event in produced {
                    dirty |= reconciler.apply(event);
                }
                if dirty {
                    tracing::debug!("View-model changed by {}", label);
                    publish(&reconciler, &published, &handle);
                }
            }
            Command::Dispatch => {
                let delivered = registry.notify_all();
                tracing::trace!("Delivered update to {} listeners", delivered);
            }
            Command::Greet(listener) => {
                registry.notify_one(&listener);
            }
            Command::Barrier(done) => {
                let _ = done.send(());
            }
            Command::Shutdown => {
                tracing::info!("Dispatch queue received shutdown command");
                break;
            }
        }
    }

    tracing::info!("Dispatch queue shut down");
}

fn publish(reconciler: &StateReconciler, published: &watch::Sender<ViewModel>, handle: &QueueHandle) {
    published.send_replace(reconciler.view().clone());
    handle.send(Command::Dispatch);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn start() -> (QueueHandle, Arc<ListenerRegistry>, watch::Receiver<ViewModel>, JoinHandle<()>) {
        let (handle, rx) = queue_channel();
        let registry = Arc::new(ListenerRegistry::new());
        let (published, snapshots) = watch::channel(ViewModel::default());
        let join = spawn_dispatch_queue(
            "test-dispatch".to_string(),
            handle.clone(),
            rx,
            Arc::clone(&registry),
            published,
        )
        .unwrap();
        (handle, registry, snapshots, join)
    }

    fn drain(handle: &QueueHandle) {
        for _ in 0..2 {
            let (tx, rx) = std_mpsc::channel();
            assert!(handle.send(Command::Barrier(tx)));
            rx.recv_timeout(Duration::from_secs(2)).unwrap();
        }
    }

    #[test]
    fn test_command_debug() {
        let cmd = Command::Apply(NormalizedEvent::MediaSessionLost);
        assert_eq!(format!("{:?}", cmd), "Apply(media_session_lost)");
    }

    #[test]
    fn test_dirty_apply_publishes_and_dispatches() {
        let (handle, registry, snapshots, join) = start();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        registry.add(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        handle.push(NormalizedEvent::QuickEventChanged(true)).unwrap();
        handle.push(NormalizedEvent::QuickEventChanged(true)).unwrap();
        drain(&handle);

        assert!(snapshots.borrow().has_quick_event());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        handle.send(Command::Shutdown);
        join.join().unwrap();
        assert!(handle.push(NormalizedEvent::MediaSessionLost).is_err());
    }

    #[test]
    fn test_panicking_pull_keeps_queue_alive() {
        let (handle, _registry, snapshots, join) = start();

        handle
            .defer(
                "boom",
                Box::new(|| -> Vec<NormalizedEvent> { panic!("provider blew up") }),
            )
            .unwrap();
        handle
            .defer(
                "ok",
                Box::new(|| vec![NormalizedEvent::QuickEventChanged(true)]),
            )
            .unwrap();
        drain(&handle);

        assert!(snapshots.borrow().has_quick_event());

        handle.send(Command::Shutdown);
        join.join().unwrap();
    }

    #[test]
    fn test_dispatch_uses_listeners_present_at_run_time() {
        let (handle, registry, _snapshots, join) = start();

        let removed_count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&removed_count);
        let removed: Arc<dyn OnDataListener> = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        registry.add(Arc::clone(&removed));

        // Hold the queue so the dispatch below stays pending
        let (gate_tx, gate_rx) = std_mpsc::channel::<()>();
        handle
            .defer(
                "gate",
                Box::new(move || {
                    let _ = gate_rx.recv_timeout(Duration::from_secs(2));
                    Vec::new()
                }),
            )
            .unwrap();
        assert!(handle.send(Command::Dispatch));

        let added_count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&added_count);
        registry.remove(&removed);
        registry.add(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        gate_tx.send(()).unwrap();
        drain(&handle);

        assert_eq!(removed_count.load(Ordering::SeqCst), 0);
        assert_eq!(added_count.load(Ordering::SeqCst), 1);

        handle.send(Command::Shutdown);
        join.join().unwrap();
    }
}
