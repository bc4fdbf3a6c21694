//! Weather-provider adapter
//!
//! Push events only signal that new data exists; the actual query is
//! deferred to the dispatch queue because providers may block on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::adapter::{SourceAdapter, SourceKind, Subscription};
use crate::error::SourceError;
use crate::event::NormalizedEvent;
use crate::provider::{WeatherCallback, WeatherEvent, WeatherProvider};
use crate::sink::EventSink;

/// Adapter over a [`WeatherProvider`]
pub struct WeatherSource {
    inner: Arc<WeatherInner>,
}

struct WeatherInner {
    provider: Option<Arc<dyn WeatherProvider>>,
    sink: Arc<dyn EventSink>,
    enabled: bool,
    subscription: Mutex<Option<Subscription>>,
    /// Serializes registrations; never taken by `deactivate` or `is_active`
    registering: Mutex<()>,
    wanted: AtomicBool,
}

impl WeatherSource {
    /// Create the adapter
    ///
    /// When `enabled` is false the adapter never subscribes, matching a
    /// widget configured without weather.
    pub fn new(
        provider: Option<Arc<dyn WeatherProvider>>,
        sink: Arc<dyn EventSink>,
        enabled: bool,
    ) -> Self {
        Self {
            inner: Arc::new(WeatherInner {
                provider,
                sink,
                enabled,
                subscription: Mutex::new(None),
                registering: Mutex::new(()),
                wanted: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Schedule a weather query on the dispatch queue
    pub fn request_query(&self) {
        self.inner.request_query();
    }
}

impl SourceAdapter for WeatherSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Weather
    }

    fn activate(&self) {
        let Some(provider) = self.inner.provider.as_ref() else {
            tracing::debug!("{}", SourceError::ProviderUnavailable(SourceKind::Weather));
            return;
        };
        if !self.inner.enabled {
            tracing::debug!("{}", SourceError::ProviderDisabled(SourceKind::Weather));
            return;
        }

        let _registering = self.inner.registering.lock();
        if self.is_active() {
            tracing::trace!("Weather source already active");
            return;
        }
        self.inner.wanted.store(true, Ordering::SeqCst);

        let weak = Arc::downgrade(&self.inner);
        let callback: WeatherCallback = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_event(event);
            }
        });

        let subscription = match provider.add_observer(callback) {
            Ok(token) => {
                let owner = Arc::clone(provider);
                Subscription::new(token, move |token| owner.remove_observer(token))
            }
            Err(source) => {
                let e = SourceError::Registration {
                    kind: SourceKind::Weather,
                    source,
                };
                tracing::warn!("Weather source activation failed: {}", e);
                return;
            }
        };

        let discarded = {
            let mut slot = self.inner.subscription.lock();
            if self.inner.wanted.load(Ordering::SeqCst) {
                *slot = Some(subscription);
                None
            } else {
                Some(subscription)
            }
        };
        if let Some(subscription) = discarded {
            drop(subscription);
            tracing::debug!("Weather source deactivated while registering");
            return;
        }

        tracing::debug!("Weather source activated");
        self.inner.request_query();
    }

    fn deactivate(&self) {
        let subscription = {
            let mut slot = self.inner.subscription.lock();
            self.inner.wanted.store(false, Ordering::SeqCst);
            slot.take()
        };
        if subscription.is_some() {
            drop(subscription);
            tracing::debug!("Weather source deactivated");
        }
    }

    fn is_active(&self) -> bool {
        self.inner.subscription.lock().is_some()
    }
}

impl WeatherInner {
    fn on_event(self: &Arc<Self>, event: WeatherEvent) {
        tracing::trace!("Weather event: {:?}", event);
        match event {
            WeatherEvent::Updated | WeatherEvent::SettingsChanged => self.request_query(),
            WeatherEvent::Error(code) => {
                tracing::debug!("Weather provider reported error {:?}", code);
                if let Err(e) = self.sink.push(NormalizedEvent::WeatherError(code)) {
                    tracing::debug!("Dropping weather error: {}", e);
                }
            }
        }
    }

    fn request_query(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        if let Err(e) = self.sink.defer("weather_query", Box::new(move || inner.query())) {
            tracing::debug!("Weather query not scheduled: {}", e);
        }
    }

    /// Pull the latest weather; failures keep the previous state
    fn query(&self) -> Vec<NormalizedEvent> {
        if self.subscription.lock().is_none() {
            return Vec::new();
        }
        let Some(provider) = self.provider.as_ref() else {
            return Vec::new();
        };

        match provider.query_weather() {
            Ok(Some(snapshot)) => vec![NormalizedEvent::WeatherUpdated(snapshot)],
            Ok(None) => {
                tracing::trace!("Weather provider has no data yet");
                Vec::new()
            }
            Err(e) => {
                let e = SourceError::TransientQueryFailure {
                    kind: SourceKind::Weather,
                    message: e.to_string(),
                };
                tracing::warn!("{}", e);
                Vec::new()
            }
        }
    }
}
