//! Merge rules that fold normalized events into the view-model

use quickspace_sources::{NormalizedEvent, PlaybackState, WeatherErrorCode};

use crate::condition::normalize_condition;
use crate::model::{ViewModel, WeatherTemp};

/// Single source of truth for the aggregated view-model
///
/// Not synchronized: the dispatch queue owns it and applies events one at a
/// time.
#[derive(Debug, Default)]
pub struct StateReconciler {
    model: ViewModel,
}

impl StateReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &ViewModel {
        &self.model
    }

    /// Apply one event, returning whether the view-model changed
    pub fn apply(&mut self, event: NormalizedEvent) -> bool {
        let before = self.model.clone();

        match event {
            NormalizedEvent::MediaMetadataChanged { title, artist } => {
                self.model.media_lost = title.is_none() || artist.is_none();
                self.model.track_title = title;
                self.model.artist = artist;
            }
            NormalizedEvent::MediaPlaybackStateChanged(state) => {
                self.model.is_playing = state == PlaybackState::Playing;
                if state == PlaybackState::Playing {
                    self.model.media_lost = false;
                } else if state.marks_lost() {
                    self.model.media_lost = true;
                }
            }
            NormalizedEvent::MediaSessionLost => {
                self.model.clear_media();
                self.model.media_lost = true;
            }
            NormalizedEvent::NotificationChanged(change) => {
                tracing::trace!("Notification change carries no view-model state: {:?}", change);
            }
            NormalizedEvent::WeatherUpdated(snapshot) => {
                self.model.weather_condition = Some(normalize_condition(&snapshot.condition));
                self.model.weather_condition_code = Some(snapshot.condition_code);
                self.model.weather_temp = Some(WeatherTemp {
                    value: snapshot.temp,
                    unit: snapshot.temp_unit,
                });
                self.model.weather_enabled = true;
            }
            NormalizedEvent::WeatherError(WeatherErrorCode::ProviderDisabled) => {
                self.model.clear_weather();
                self.model.weather_enabled = false;
            }
            NormalizedEvent::WeatherError(code) => {
                tracing::debug!("Keeping last weather after provider error {:?}", code);
            }
            NormalizedEvent::QuickEventChanged(flag) => {
                self.model.has_quick_event = flag;
            }
        }

        self.model.media_available =
            self.model.track_title.is_some() && self.model.artist.is_some();

        self.model != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickspace_sources::{NotificationChange, WeatherSnapshot};

    fn metadata(title: Option<&str>, artist: Option<&str>) -> NormalizedEvent {
        NormalizedEvent::MediaMetadataChanged {
            title: title.map(str::to_string),
            artist: artist.map(str::to_string),
        }
    }

    fn weather(condition: &str) -> NormalizedEvent {
        NormalizedEvent::WeatherUpdated(WeatherSnapshot {
            condition: condition.to_string(),
            condition_code: 501,
            temp: "14".to_string(),
            temp_unit: "°C".to_string(),
        })
    }

    #[test]
    fn test_metadata_sets_availability() {
        let mut reconciler = StateReconciler::new();

        assert!(reconciler.apply(metadata(Some("Song"), Some("Artist"))));
        assert!(reconciler.view().is_media_available());
        assert!(!reconciler.view().is_media_lost());
        assert_eq!(reconciler.view().track_title(), Some("Song"));

        assert!(reconciler.apply(metadata(Some("Song"), None)));
        assert!(!reconciler.view().is_media_available());
        assert!(reconciler.view().is_media_lost());
    }

    #[test]
    fn test_same_metadata_is_not_dirty() {
        let mut reconciler = StateReconciler::new();
        assert!(reconciler.apply(metadata(Some("Song"), Some("Artist"))));
        assert!(!reconciler.apply(metadata(Some("Song"), Some("Artist"))));
    }

    #[test]
    fn test_playback_state_rules() {
        let mut reconciler = StateReconciler::new();
        reconciler.apply(metadata(Some("Song"), Some("Artist")));

        reconciler.apply(NormalizedEvent::MediaPlaybackStateChanged(PlaybackState::Paused));
        assert!(reconciler.view().is_media_lost());
        assert!(!reconciler.view().is_playing());
        // Stale metadata stays until the next refresh
        assert_eq!(reconciler.view().track_title(), Some("Song"));

        reconciler.apply(NormalizedEvent::MediaPlaybackStateChanged(PlaybackState::Buffering));
        assert!(reconciler.view().is_media_lost());

        reconciler.apply(NormalizedEvent::MediaPlaybackStateChanged(PlaybackState::Playing));
        assert!(!reconciler.view().is_media_lost());
        assert!(reconciler.view().is_playing());

        reconciler.apply(NormalizedEvent::MediaPlaybackStateChanged(PlaybackState::Error));
        assert!(reconciler.view().is_media_lost());
    }

    #[test]
    fn test_session_lost_clears_media() {
        let mut reconciler = StateReconciler::new();
        reconciler.apply(NormalizedEvent::MediaPlaybackStateChanged(PlaybackState::Playing));
        reconciler.apply(metadata(Some("Song"), Some("Artist")));

        assert!(reconciler.apply(NormalizedEvent::MediaSessionLost));
        let view = reconciler.view();
        assert!(!view.is_media_available());
        assert!(!view.is_playing());
        assert!(view.track_title().is_none());
        assert!(view.artist().is_none());
    }

    #[test]
    fn test_notification_is_never_dirty() {
        let mut reconciler = StateReconciler::new();
        assert!(!reconciler.apply(NormalizedEvent::NotificationChanged(
            NotificationChange::FullRefresh { active: 3 }
        )));
    }

    #[test]
    fn test_weather_update_normalizes_condition() {
        let mut reconciler = StateReconciler::new();
        assert!(reconciler.apply(weather("Heavy Rain Showers")));

        let view = reconciler.view();
        assert_eq!(view.weather_condition(), Some("Rainy"));
        assert_eq!(view.weather_condition_code(), Some(501));
        assert_eq!(view.weather_temp().map(|t| t.to_string()).as_deref(), Some("14°C"));
        assert!(view.is_weather_enabled());
    }

    #[test]
    fn test_weather_errors() {
        let mut reconciler = StateReconciler::new();
        reconciler.apply(weather("hazy"));

        assert!(!reconciler.apply(NormalizedEvent::WeatherError(WeatherErrorCode::Network)));
        assert_eq!(reconciler.view().weather_condition(), Some("hazy"));

        assert!(reconciler.apply(NormalizedEvent::WeatherError(
            WeatherErrorCode::ProviderDisabled
        )));
        let view = reconciler.view();
        assert!(!view.is_weather_enabled());
        assert!(view.weather_condition().is_none());
        assert!(view.weather_temp().is_none());
        assert!(view.weather_condition_code().is_none());
    }

    #[test]
    fn test_quick_event_flag() {
        let mut reconciler = StateReconciler::new();
        assert!(reconciler.apply(NormalizedEvent::QuickEventChanged(true)));
        assert!(reconciler.view().has_quick_event());
        assert!(!reconciler.apply(NormalizedEvent::QuickEventChanged(true)));
    }
}
