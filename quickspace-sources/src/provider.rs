//! Capability contracts for the external data providers
//!
//! Each adapter receives its provider at construction instead of looking
//! a platform service up. Callbacks may be invoked on any thread.

use std::sync::Arc;

use crate::error::ProviderError;
use crate::event::{PlaybackState, WeatherErrorCode, WeatherSnapshot};

/// Token identifying one callback registration with a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderToken(pub u64);

// ============================================================================
// Media
// ============================================================================

/// Title and artist as read from a session's metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl MediaMetadata {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            artist: Some(artist.into()),
        }
    }
}

/// Push events delivered by a media session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSessionEvent {
    MetadataChanged(Option<MediaMetadata>),
    PlaybackStateChanged(PlaybackState),
    SessionDestroyed,
    QueueChanged,
    ExtrasChanged,
}

pub type MediaCallback = Arc<dyn Fn(MediaSessionEvent) + Send + Sync>;

/// One active media session
pub trait MediaSession: Send + Sync {
    /// Stable identifier for this session
    fn id(&self) -> String;

    fn playback_state(&self) -> Option<PlaybackState>;

    fn metadata(&self) -> Option<MediaMetadata>;

    fn register_callback(&self, callback: MediaCallback) -> Result<ProviderToken, ProviderError>;

    fn unregister_callback(&self, token: ProviderToken);
}

/// Lists the currently active media sessions
pub trait MediaProvider: Send + Sync {
    /// Sessions in provider iteration order
    fn active_sessions(&self) -> Vec<Arc<dyn MediaSession>>;
}

// ============================================================================
// Notifications
// ============================================================================

/// Raw notification-service events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Posted { package: String, key: String },
    Removed { package: String, key: String },
    FullRefresh { active_keys: Vec<String> },
}

pub type NotificationCallback = Arc<dyn Fn(NotificationEvent) + Send + Sync>;

pub trait NotificationProvider: Send + Sync {
    fn add_listener(&self, callback: NotificationCallback) -> Result<ProviderToken, ProviderError>;

    fn remove_listener(&self, token: ProviderToken);
}

// ============================================================================
// Weather
// ============================================================================

/// Push events delivered by a weather provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherEvent {
    Updated,
    Error(WeatherErrorCode),
    /// Provider settings (units, location) changed; data should be re-queried
    SettingsChanged,
}

pub type WeatherCallback = Arc<dyn Fn(WeatherEvent) + Send + Sync>;

pub trait WeatherProvider: Send + Sync {
    /// Pull the latest weather data
    ///
    /// `Ok(None)` means the provider has nothing cached yet. May block.
    fn query_weather(&self) -> Result<Option<WeatherSnapshot>, ProviderError>;

    fn add_observer(&self, callback: WeatherCallback) -> Result<ProviderToken, ProviderError>;

    fn remove_observer(&self, token: ProviderToken);
}
