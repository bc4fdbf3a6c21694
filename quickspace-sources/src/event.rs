//! Normalized events produced by source adapters
//!
//! Every provider callback is translated into one of these before it is
//! handed to the dispatch queue. Payloads carry only what the reconciler
//! needs.

use serde::{Deserialize, Serialize};

/// Playback state reported by a media session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    None,
    Stopped,
    Paused,
    Playing,
    FastForwarding,
    Rewinding,
    Buffering,
    Error,
    Connecting,
    SkippingToPrevious,
    SkippingToNext,
}

impl PlaybackState {
    /// Whether this state marks the session as lost
    ///
    /// Paused and error are deliberately treated alike.
    pub fn marks_lost(self) -> bool {
        matches!(
            self,
            PlaybackState::Paused | PlaybackState::Stopped | PlaybackState::Error
        )
    }
}

/// Opaque per-notification key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationKey(pub String);

impl NotificationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NotificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized notification change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationChange {
    Posted(NotificationKey),
    Removed(NotificationKey),
    /// The full notification set was replaced; carries the new count
    FullRefresh { active: usize },
}

/// Weather provider error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherErrorCode {
    Network,
    NoLocation,
    ProviderDisabled,
    Other(i32),
}

impl WeatherErrorCode {
    /// Map a raw provider error code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => WeatherErrorCode::Network,
            1 => WeatherErrorCode::NoLocation,
            2 => WeatherErrorCode::ProviderDisabled,
            other => WeatherErrorCode::Other(other),
        }
    }
}

/// Result of a weather pull query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Free-form condition text as reported by the provider
    pub condition: String,
    /// Provider condition code, used by renderers to pick an icon
    pub condition_code: i32,
    /// Formatted temperature value
    pub temp: String,
    /// Temperature unit suffix, e.g. "°C"
    pub temp_unit: String,
}

/// Event produced by an adapter and consumed once by the reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizedEvent {
    MediaMetadataChanged {
        title: Option<String>,
        artist: Option<String>,
    },
    MediaPlaybackStateChanged(PlaybackState),
    MediaSessionLost,
    NotificationChanged(NotificationChange),
    WeatherUpdated(WeatherSnapshot),
    WeatherError(WeatherErrorCode),
    /// Flag computed by the external quick-events controller
    QuickEventChanged(bool),
}

impl NormalizedEvent {
    /// Short name used in log output
    pub fn name(&self) -> &'static str {
        match self {
            NormalizedEvent::MediaMetadataChanged { .. } => "media_metadata_changed",
            NormalizedEvent::MediaPlaybackStateChanged(_) => "media_playback_state_changed",
            NormalizedEvent::MediaSessionLost => "media_session_lost",
            NormalizedEvent::NotificationChanged(_) => "notification_changed",
            NormalizedEvent::WeatherUpdated(_) => "weather_updated",
            NormalizedEvent::WeatherError(_) => "weather_error",
            NormalizedEvent::QuickEventChanged(_) => "quick_event_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lost_states() {
        assert!(PlaybackState::Paused.marks_lost());
        assert!(PlaybackState::Stopped.marks_lost());
        assert!(PlaybackState::Error.marks_lost());
        assert!(!PlaybackState::Playing.marks_lost());
        assert!(!PlaybackState::Buffering.marks_lost());
    }

    #[test]
    fn test_weather_error_codes() {
        assert_eq!(WeatherErrorCode::from_code(2), WeatherErrorCode::ProviderDisabled);
        assert_eq!(WeatherErrorCode::from_code(0), WeatherErrorCode::Network);
        assert_eq!(WeatherErrorCode::from_code(42), WeatherErrorCode::Other(42));
    }
}
