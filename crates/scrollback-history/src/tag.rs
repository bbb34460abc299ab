//! Message tags attached to history lines

use serde::{Deserialize, Serialize};

/// Name of the tag carrying the line's origin timestamp.
pub const TIME_TAG: &str = "time";

/// A single message tag: a name with an optional value.
///
/// Tags are carried verbatim through the store and returned with query
/// snapshots, so clients replaying history see the original metadata
/// (`msgid`, `account`, `time`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTag {
    /// Tag name, e.g. `"time"` or `"msgid"`
    pub name: String,
    /// Tag value; `None` for valueless tags
    pub value: Option<String>,
}

impl MessageTag {
    /// Create a tag with a value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Create a valueless tag.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// Find the first tag with the given name.
pub fn find_tag<'a>(tags: &'a [MessageTag], name: &str) -> Option<&'a MessageTag> {
    tags.iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_tag() {
        let tags = vec![
            MessageTag::new("msgid", "abc123"),
            MessageTag::named("bot"),
            MessageTag::new("time", "2024-01-01T00:00:00.000Z"),
        ];

        assert_eq!(find_tag(&tags, "msgid").unwrap().value.as_deref(), Some("abc123"));
        assert!(find_tag(&tags, "bot").unwrap().value.is_none());
        assert!(find_tag(&tags, "account").is_none());
    }

    #[test]
    fn test_find_tag_returns_first_match() {
        let tags = vec![MessageTag::new("x", "1"), MessageTag::new("x", "2")];
        assert_eq!(find_tag(&tags, "x").unwrap().value.as_deref(), Some("1"));
    }
}
