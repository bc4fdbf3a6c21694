//! # Quickspace Sources
//!
//! Adapters that turn three push-driven providers (media sessions, the
//! notification service, a weather provider) into a stream of
//! [`NormalizedEvent`]s.
//!
//! ## Overview
//!
//! Each adapter is constructed with its provider capability injected and an
//! [`EventSink`] to hand events to. Adapters never touch aggregated state:
//! callbacks arriving on provider threads are normalized and pushed to the
//! sink, and slow pulls (weather queries, media re-scans) are deferred to
//! whatever queue sits behind it.
//!
//! ```text
//! MediaProvider        ──▶ MediaSource        ─┐
//! NotificationProvider ──▶ NotificationSource ─┼──▶ EventSink ──▶ dispatch queue
//! WeatherProvider      ──▶ WeatherSource      ─┘
//! ```
//!
//! ## Lifecycle
//!
//! [`SourceAdapter::activate`] and [`SourceAdapter::deactivate`] are
//! idempotent. An adapter holds at most one live [`Subscription`]; a missing
//! provider or a rejected registration is logged and leaves the adapter
//! inactive until the next activation.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quickspace_sources::{MediaSource, SourceAdapter};
//!
//! let media = MediaSource::new(Some(provider), sink);
//! media.activate();
//! media.activate(); // no-op, still one callback registration
//! media.deactivate();
//! ```

pub mod adapter;
pub mod error;
pub mod event;
pub mod media;
pub mod notification;
pub mod provider;
pub mod sink;
pub mod weather;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adapter::{SourceAdapter, SourceKind, Subscription};
pub use error::{ProviderError, Result, SourceError};
pub use event::{
    NormalizedEvent, NotificationChange, NotificationKey, PlaybackState, WeatherErrorCode,
    WeatherSnapshot,
};
pub use media::{MediaRefresher, MediaSource};
pub use notification::NotificationSource;
pub use provider::{
    MediaCallback, MediaMetadata, MediaProvider, MediaSession, MediaSessionEvent,
    NotificationCallback, NotificationEvent, NotificationProvider, ProviderToken, WeatherCallback,
    WeatherEvent, WeatherProvider,
};
pub use sink::{DeferredPull, EventSink};
pub use weather::WeatherSource;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        EventSink, MediaProvider, MediaSource, NormalizedEvent, NotificationProvider,
        NotificationSource, SourceAdapter, SourceKind, WeatherProvider, WeatherSource,
    };
}
