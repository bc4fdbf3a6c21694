//! Aggregated view-model read by quickspace observers

use std::fmt;

use serde::Serialize;

/// Temperature value and unit as reported by the weather provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeatherTemp {
    pub value: String,
    pub unit: String,
}

impl fmt::Display for WeatherTemp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

/// Current aggregated state of all three sources
///
/// Only the reconciler mutates it. Observers receive clones, so a snapshot
/// never changes underneath a reader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    pub(crate) track_title: Option<String>,
    pub(crate) artist: Option<String>,
    pub(crate) is_playing: bool,
    pub(crate) media_available: bool,
    pub(crate) media_lost: bool,

    pub(crate) weather_condition: Option<String>,
    pub(crate) weather_condition_code: Option<i32>,
    pub(crate) weather_temp: Option<WeatherTemp>,
    pub(crate) weather_enabled: bool,

    pub(crate) has_quick_event: bool,
}

impl ViewModel {
    pub fn track_title(&self) -> Option<&str> {
        self.track_title.as_deref()
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// True exactly when both title and artist are known
    pub fn is_media_available(&self) -> bool {
        self.media_available
    }

    /// Whether the last media signal marked the session as gone or idle
    ///
    /// Stale metadata can still be present while this is set.
    pub fn is_media_lost(&self) -> bool {
        self.media_lost
    }

    /// Normalized condition category
    pub fn weather_condition(&self) -> Option<&str> {
        self.weather_condition.as_deref()
    }

    pub fn weather_condition_code(&self) -> Option<i32> {
        self.weather_condition_code
    }

    pub fn weather_temp(&self) -> Option<&WeatherTemp> {
        self.weather_temp.as_ref()
    }

    pub fn is_weather_enabled(&self) -> bool {
        self.weather_enabled
    }

    pub fn has_quick_event(&self) -> bool {
        self.has_quick_event
    }

    /// Temperature text, optionally followed by the condition
    ///
    /// `"21°C"` or, when `detailed`, `"21°C - Sunny"`.
    pub fn weather_text(&self, detailed: bool) -> Option<String> {
        let temp = self.weather_temp.as_ref()?;
        match (&self.weather_condition, detailed) {
            (Some(condition), true) => Some(format!("{} - {}", temp, condition)),
            _ => Some(temp.to_string()),
        }
    }

    pub(crate) fn clear_media(&mut self) {
        self.track_title = None;
        self.artist = None;
        self.is_playing = false;
    }

    pub(crate) fn clear_weather(&mut self) {
        self.weather_condition = None;
        self.weather_condition_code = None;
        self.weather_temp = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_weather() -> ViewModel {
        ViewModel {
            weather_condition: Some("Sunny".to_string()),
            weather_temp: Some(WeatherTemp {
                value: "21".to_string(),
                unit: "°C".to_string(),
            }),
            weather_enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_weather_text() {
        let model = with_weather();
        assert_eq!(model.weather_text(false).as_deref(), Some("21°C"));
        assert_eq!(model.weather_text(true).as_deref(), Some("21°C - Sunny"));
    }

    #[test]
    fn test_weather_text_absent() {
        assert_eq!(ViewModel::default().weather_text(true), None);
    }

    #[test]
    fn test_default_is_empty() {
        let model = ViewModel::default();
        assert!(!model.is_media_available());
        assert!(model.track_title().is_none());
        assert!(!model.is_weather_enabled());
        assert!(!model.has_quick_event());
    }
}
