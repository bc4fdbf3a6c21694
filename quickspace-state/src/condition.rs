//! Weather condition normalization

/// Substring-to-category table, checked in order; first match wins
///
/// `cloud` also covers "clouds" and "partly cloudy".
const CONDITION_CATEGORIES: &[(&str, &str)] = &[
    ("cloud", "Cloudy"),
    ("rain", "Rainy"),
    ("clear", "Sunny"),
    ("storm", "Stormy"),
    ("snow", "Snowy"),
    ("wind", "Windy"),
    ("mist", "Misty"),
];

/// Map free-form provider condition text to a display category
///
/// Matching is case-insensitive. Unmapped conditions pass through verbatim.
pub fn normalize_condition(raw: &str) -> String {
    let lower = raw.to_lowercase();
    CONDITION_CATEGORIES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, category)| (*category).to_string())
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_conditions() {
        assert_eq!(normalize_condition("Heavy Rain Showers"), "Rainy");
        assert_eq!(normalize_condition("partly cloudy"), "Cloudy");
        assert_eq!(normalize_condition("Broken clouds"), "Cloudy");
        assert_eq!(normalize_condition("CLEAR SKY"), "Sunny");
        assert_eq!(normalize_condition("Thunderstorm"), "Stormy");
        assert_eq!(normalize_condition("light snow"), "Snowy");
        assert_eq!(normalize_condition("Windy"), "Windy");
        assert_eq!(normalize_condition("mist"), "Misty");
    }

    #[test]
    fn test_unmapped_passes_through() {
        assert_eq!(normalize_condition("hazy"), "hazy");
        assert_eq!(normalize_condition("Fog"), "Fog");
        assert_eq!(normalize_condition(""), "");
    }

    #[test]
    fn test_first_match_wins() {
        // Both "clouds" and "rain" appear; clouds is checked first
        assert_eq!(normalize_condition("rain clouds"), "Cloudy");
        // Both "rain" and "storm"; rain is checked first
        assert_eq!(normalize_condition("Rainstorm"), "Rainy");
    }
}
