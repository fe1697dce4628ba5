//! Stream filter configuration.
//!
//! Selects which public posts the streaming endpoint delivers:
//! - Track keywords
//! - Language list
//! - Geographic bounding boxes (take precedence over keywords)

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// Filter predicates sent to the streaming endpoint.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct FilterConfig {
    /// Keywords to track.
    #[serde(default = "default_words")]
    #[validate(custom(function = validation::validate_track_words))]
    pub words: Vec<String>,

    /// Languages to accept.
    #[serde(default = "default_languages")]
    #[validate(custom(function = validation::validate_languages))]
    pub languages: Vec<String>,

    /// Bounding boxes. When non-empty, keyword tracking is not used.
    #[serde(default)]
    #[validate(custom(function = validation::validate_locations))]
    pub locations: Vec<GeoBox>,
}

/// A longitude/latitude bounding box, south-west corner first.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GeoBox {
    pub sw_lon: f64,
    pub sw_lat: f64,
    pub ne_lon: f64,
    pub ne_lat: f64,
}

impl GeoBox {
    /// Builds boxes from a flat coordinate list, four values per box.
    ///
    /// Returns `None` if the list length is not a multiple of four.
    pub fn from_flat(coords: &[f64]) -> Option<Vec<GeoBox>> {
        if coords.len() % 4 != 0 {
            return None;
        }
        Some(
            coords
                .chunks_exact(4)
                .map(|c| GeoBox {
                    sw_lon: c[0],
                    sw_lat: c[1],
                    ne_lon: c[2],
                    ne_lat: c[3],
                })
                .collect(),
        )
    }
}

fn default_words() -> Vec<String> {
    ["the", "i", "to", "a", "and", "is", "in", "it", "you", "of"]
        .iter()
        .map(|w| w.to_string())
        .collect()
}

fn default_languages() -> Vec<String> {
    ["en", "es", "zh", "jp", "pt", "ru", "ar"]
        .iter()
        .map(|l| l.to_string())
        .collect()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            words: default_words(),
            languages: default_languages(),
            locations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_coordinates_group_by_four() {
        let boxes = GeoBox::from_flat(&[-122.75, 36.8, -121.75, 37.8, -74.0, 40.0, -73.0, 41.0])
            .unwrap();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[1].sw_lon, -74.0);
        assert_eq!(boxes[1].ne_lat, 41.0);
    }

    #[test]
    fn flat_coordinates_reject_partial_box() {
        assert!(GeoBox::from_flat(&[1.0, 2.0, 3.0]).is_none());
    }
}
