//! Configuration for the aggregation controller

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings for [`AggregationController`](crate::AggregationController)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickspaceConfig {
    /// Subscribe to the weather provider at all
    /// Default: true
    pub weather_enabled: bool,

    /// Append the condition to the temperature text ("21°C - Sunny")
    /// Default: false
    pub weather_detailed: bool,

    /// Thread name for the dispatch queue
    /// Default: "quickspace-dispatch"
    pub queue_name: String,
}

impl Default for QuickspaceConfig {
    fn default() -> Self {
        Self {
            weather_enabled: true,
            weather_detailed: false,
            queue_name: "quickspace-dispatch".to_string(),
        }
    }
}

impl QuickspaceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON settings document; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_weather_enabled(mut self, enabled: bool) -> Self {
        self.weather_enabled = enabled;
        self
    }

    pub fn with_weather_detailed(mut self, detailed: bool) -> Self {
        self.weather_detailed = detailed;
        self
    }

    pub fn with_queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }
}
