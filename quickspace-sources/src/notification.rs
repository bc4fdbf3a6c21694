//! Notification-service adapter

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::adapter::{SourceAdapter, SourceKind, Subscription};
use crate::error::SourceError;
use crate::event::{NormalizedEvent, NotificationChange, NotificationKey};
use crate::media::MediaRefresher;
use crate::provider::{NotificationCallback, NotificationEvent, NotificationProvider};
use crate::sink::EventSink;

/// Adapter over a [`NotificationProvider`]
///
/// Media sessions usually surface through notifications, so every change
/// also schedules a media re-scan when a [`MediaRefresher`] is attached.
pub struct NotificationSource {
    provider: Option<Arc<dyn NotificationProvider>>,
    sink: Arc<dyn EventSink>,
    media: Option<MediaRefresher>,
    subscription: Mutex<Option<Subscription>>,
    /// Serializes registrations; never taken by `deactivate` or `is_active`
    registering: Mutex<()>,
    wanted: AtomicBool,
}

impl NotificationSource {
    pub fn new(provider: Option<Arc<dyn NotificationProvider>>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            provider,
            sink,
            media: None,
            subscription: Mutex::new(None),
            registering: Mutex::new(()),
            wanted: AtomicBool::new(false),
        }
    }

    /// Re-scan media sessions whenever notifications change
    pub fn with_media_refresh(mut self, media: MediaRefresher) -> Self {
        self.media = Some(media);
        self
    }
}

impl SourceAdapter for NotificationSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Notification
    }

    fn activate(&self) {
        let Some(provider) = self.provider.as_ref() else {
            tracing::debug!("{}", SourceError::ProviderUnavailable(SourceKind::Notification));
            return;
        };

        let _registering = self.registering.lock();
        if self.is_active() {
            tracing::trace!("Notification source already active");
            return;
        }
        self.wanted.store(true, Ordering::SeqCst);

        let sink = Arc::clone(&self.sink);
        let media = self.media.clone();
        let callback: NotificationCallback = Arc::new(move |event| {
            let change = normalize(event);
            tracing::trace!("Notification change: {:?}", change);
            if let Err(e) = sink.push(NormalizedEvent::NotificationChanged(change)) {
                tracing::debug!("Dropping notification event: {}", e);
                return;
            }
            if let Some(media) = &media {
                media.request();
            }
        });

        match provider.add_listener(callback) {
            Ok(token) => {
                let owner = Arc::clone(provider);
                let subscription =
                    Subscription::new(token, move |token| owner.remove_listener(token));

                let discarded = {
                    let mut slot = self.subscription.lock();
                    if self.wanted.load(Ordering::SeqCst) {
                        *slot = Some(subscription);
                        None
                    } else {
                        Some(subscription)
                    }
                };
                match discarded {
                    None => tracing::debug!("Notification source activated"),
                    Some(subscription) => {
                        drop(subscription);
                        tracing::debug!("Notification source deactivated while registering");
                    }
                }
            }
            Err(source) => {
                let e = SourceError::Registration {
                    kind: SourceKind::Notification,
                    source,
                };
                tracing::warn!("Notification source activation failed: {}", e);
            }
        }
    }

    fn deactivate(&self) {
        let subscription = {
            let mut slot = self.subscription.lock();
            self.wanted.store(false, Ordering::SeqCst);
            slot.take()
        };
        if subscription.is_some() {
            drop(subscription);
            tracing::debug!("Notification source deactivated");
        }
    }

    fn is_active(&self) -> bool {
        self.subscription.lock().is_some()
    }
}

fn normalize(event: NotificationEvent) -> NotificationChange {
    match event {
        NotificationEvent::Posted { key, .. } => NotificationChange::Posted(NotificationKey(key)),
        NotificationEvent::Removed { key, .. } => NotificationChange::Removed(NotificationKey(key)),
        NotificationEvent::FullRefresh { active_keys } => NotificationChange::FullRefresh {
            active: active_keys.len(),
        },
    }
}
