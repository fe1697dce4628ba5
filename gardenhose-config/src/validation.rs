//! Custom validation functions for configuration.
//!
//! Shared validation logic used across the configuration sections.

use std::sync::OnceLock;

use regex::Regex;
use validator::ValidationError;

use crate::filter::GeoBox;

fn language_tag() -> Option<&'static Regex> {
    static TAG: OnceLock<Option<Regex>> = OnceLock::new();
    TAG.get_or_init(|| Regex::new("^[a-z]{2,3}(-[A-Za-z0-9]{2,8})?$").ok())
        .as_ref()
}

/// Validate that every entry looks like a language tag (`en`, `pt-BR`, ...).
pub fn validate_languages(languages: &[String]) -> Result<(), ValidationError> {
    let re = language_tag().ok_or_else(|| ValidationError::new("invalid_regex"))?;
    if languages.iter().all(|lang| re.is_match(lang)) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_language_tag"))
    }
}

/// Validate that track keywords are non-blank and within the 60 byte limit
/// the streaming endpoint enforces per phrase.
pub fn validate_track_words(words: &[String]) -> Result<(), ValidationError> {
    if words.iter().all(|w| !w.trim().is_empty() && w.len() <= 60) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_track_word"))
    }
}

/// Validate bounding boxes: coordinates in range, south-west corner strictly
/// below and left of the north-east corner.
pub fn validate_locations(boxes: &[GeoBox]) -> Result<(), ValidationError> {
    for geo in boxes {
        let lons = [geo.sw_lon, geo.ne_lon];
        let lats = [geo.sw_lat, geo.ne_lat];
        if lons.iter().any(|lon| !(-180.0..=180.0).contains(lon))
            || lats.iter().any(|lat| !(-90.0..=90.0).contains(lat))
        {
            return Err(ValidationError::new("coordinate_out_of_range"));
        }
        if geo.sw_lon >= geo.ne_lon || geo.sw_lat >= geo.ne_lat {
            return Err(ValidationError::new("inverted_bounding_box"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_regional_language_tags() {
        let langs = vec!["en".to_string(), "pt-BR".to_string(), "jp".to_string()];
        assert!(validate_languages(&langs).is_ok());
    }

    #[test]
    fn rejects_malformed_language_tags() {
        assert!(validate_languages(&["English".to_string()]).is_err());
        assert!(validate_languages(&["".to_string()]).is_err());
    }

    #[test]
    fn rejects_blank_track_words() {
        assert!(validate_track_words(&["rust".into(), "  ".into()]).is_err());
    }

    #[test]
    fn rejects_inverted_box() {
        let geo = GeoBox {
            sw_lon: -73.0,
            sw_lat: 41.0,
            ne_lon: -74.0,
            ne_lat: 40.0,
        };
        assert!(validate_locations(&[geo]).is_err());
    }

    #[test]
    fn rejects_out_of_range_latitude() {
        let geo = GeoBox {
            sw_lon: -10.0,
            sw_lat: -95.0,
            ne_lon: 10.0,
            ne_lat: 10.0,
        };
        assert!(validate_locations(&[geo]).is_err());
    }
}
