//! Decoding of newline-delimited stream messages.

use gardenhose_core::Post;
use serde_json::Value;

/// Control messages interleaved with posts.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Delete { id: Option<String> },
    Limit { undelivered: u64 },
    Disconnect { code: Option<u64>, reason: String },
    Warning { code: Option<String>, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Status(Post),
    Notice(Notice),
}

/// Parses one line of the stream.
///
/// Blank keep-alive lines and unrecognised objects yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<StreamMessage>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line)?;

    if let Some(delete) = value.get("delete") {
        let id = delete
            .pointer("/status/id_str")
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(Some(StreamMessage::Notice(Notice::Delete { id })));
    }
    if let Some(limit) = value.get("limit") {
        let undelivered = limit.get("track").and_then(Value::as_u64).unwrap_or(0);
        return Ok(Some(StreamMessage::Notice(Notice::Limit { undelivered })));
    }
    if let Some(disconnect) = value.get("disconnect") {
        return Ok(Some(StreamMessage::Notice(Notice::Disconnect {
            code: disconnect.get("code").and_then(Value::as_u64),
            reason: string_field(disconnect, "reason"),
        })));
    }
    if let Some(warning) = value.get("warning") {
        return Ok(Some(StreamMessage::Notice(Notice::Warning {
            code: warning.get("code").and_then(Value::as_str).map(str::to_string),
            message: string_field(warning, "message"),
        })));
    }

    Ok(status_text(&value).map(|text| {
        StreamMessage::Status(Post {
            id: value.get("id_str").and_then(Value::as_str).map(str::to_string),
            text,
            lang: value.get("lang").and_then(Value::as_str).map(str::to_string),
            meta: value.clone(),
        })
    }))
}

/// Prefers the untruncated text of extended posts.
fn status_text(value: &Value) -> Option<String> {
    value
        .pointer("/extended_tweet/full_text")
        .or_else(|| value.get("full_text"))
        .or_else(|| value.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
