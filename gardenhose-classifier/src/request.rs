//! Request and response shapes for a classification call.

use std::time::Duration;

use serde::Serialize;

/// Fixed metadata attached to every batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyTags {
    /// Routes results downstream.
    pub namespace: String,
    pub source_language: String,
    pub sentiment: bool,
}

impl ClassifyTags {
    /// Tags with automatic language detection.
    pub fn new(namespace: impl Into<String>, sentiment: bool) -> Self {
        Self {
            namespace: namespace.into(),
            source_language: "auto".into(),
            sentiment,
        }
    }
}

/// Outcome of a successful call.
#[derive(Debug, Clone)]
pub struct Classification {
    pub results: serde_json::Value,
    pub duration: Duration,
}

#[derive(Serialize)]
pub(crate) struct SocialRequest<'a> {
    pub social: &'a [String],
    pub stream_meta: StreamMeta<'a>,
    pub source_language: &'a str,
    pub sentiment: bool,
}

#[derive(Serialize)]
pub(crate) struct StreamMeta<'a> {
    pub namespace: &'a str,
}

impl<'a> SocialRequest<'a> {
    pub fn new(texts: &'a [String], tags: &'a ClassifyTags) -> Self {
        Self {
            social: texts,
            stream_meta: StreamMeta {
                namespace: &tags.namespace,
            },
            source_language: &tags.source_language,
            sentiment: tags.sentiment,
        }
    }
}
