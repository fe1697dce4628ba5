//! Filter predicates for the streaming endpoint.

use gardenhose_config::{FilterConfig, GeoBox};

use crate::StreamError;

/// What the subscription selects on. Keywords and boxes are mutually exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Track(Vec<String>),
    Locations(Vec<GeoBox>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamFilter {
    pub predicate: Predicate,
    pub languages: Vec<String>,
}

impl StreamFilter {
    /// Bounding boxes win over keywords when both are configured.
    pub fn from_config(config: &FilterConfig) -> Result<Self, StreamError> {
        let predicate = if !config.locations.is_empty() {
            Predicate::Locations(config.locations.clone())
        } else {
            let words: Vec<String> = config
                .words
                .iter()
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty())
                .collect();
            if words.is_empty() {
                return Err(StreamError::EmptyFilter);
            }
            Predicate::Track(words)
        };

        Ok(Self {
            predicate,
            languages: config
                .languages
                .iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        })
    }

    /// Form-encoded request parameters, in the order they are sent.
    pub fn form_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(2);
        match &self.predicate {
            Predicate::Track(words) => params.push(("track".into(), words.join(","))),
            Predicate::Locations(boxes) => {
                let coords: Vec<String> = boxes
                    .iter()
                    .flat_map(|b| [b.sw_lon, b.sw_lat, b.ne_lon, b.ne_lat])
                    .map(|c| c.to_string())
                    .collect();
                params.push(("locations".into(), coords.join(",")));
            }
        }
        if !self.languages.is_empty() {
            params.push(("language".into(), self.languages.join(",")));
        }
        params
    }
}
