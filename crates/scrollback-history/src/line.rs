//! Log lines and the server-time tag convention

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tag::{find_tag, MessageTag, TIME_TAG};

/// One recorded message: a timestamp, the message tags, and the raw line.
///
/// Lines are stored in insertion order, which is also non-decreasing in
/// timestamp in normal operation. Queries hand out deep copies (`Clone`), so
/// a returned snapshot is never affected by later mutation of the live log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// Origin time in seconds since the epoch, taken from the `time` tag
    pub t: i64,
    /// Message tags, in arrival order
    pub tags: Vec<MessageTag>,
    /// The raw line text
    pub text: String,
}

impl LogLine {
    /// Build a line from raw tags and text.
    ///
    /// If a `time` tag is present its value becomes the line's timestamp.
    /// If absent, one is synthesized from `now` in server-time format and
    /// appended to the tag list. A `time` value that fails to parse falls
    /// back to `now` as well.
    pub fn new(now: DateTime<Utc>, tags: &[MessageTag], text: impl Into<String>) -> Self {
        let mut tags = tags.to_vec();
        let t = match find_tag(&tags, TIME_TAG) {
            Some(tag) => tag
                .value
                .as_deref()
                .and_then(parse_server_time)
                .unwrap_or_else(|| now.timestamp()),
            None => {
                tags.push(MessageTag::new(TIME_TAG, format_server_time(now)));
                now.timestamp()
            }
        };

        Self {
            t,
            tags,
            text: text.into(),
        }
    }
}

/// Format a time in server-time style: ISO-8601 with millisecond precision
/// and a `Z` suffix, e.g. `2024-03-01T12:34:56.789Z`.
pub fn format_server_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parse a server-time value back into an epoch second.
pub fn parse_server_time(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.timestamp())
}
