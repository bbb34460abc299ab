//! Query filters and replay snapshots

use serde::{Deserialize, Serialize};

use crate::line::LogLine;

/// Filter for a history request: "the last N lines within the last T
/// seconds".
///
/// A filter can be more restrictive than the object's own retention limits
/// but never more permissive; the store clamps it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryFilter {
    /// Age window in seconds; 0 means "no window beyond the object's
    /// `max_time`"
    pub last_seconds: i64,
    /// Maximum number of lines returned, taken from the end of the log
    pub last_lines: usize,
}

impl HistoryFilter {
    /// An empty filter (object limits only, zero-line cap).
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to lines younger than `secs` seconds.
    pub fn last_seconds(mut self, secs: i64) -> Self {
        self.last_seconds = secs;
        self
    }

    /// Return at most the final `n` matching lines.
    pub fn last_lines(mut self, n: usize) -> Self {
        self.last_lines = n;
        self
    }
}

/// A replay snapshot: deep copies of the matching lines, oldest first.
///
/// The caller owns the result; later mutations of the live log never alter
/// it. An empty `lines` is a real answer ("history exists, nothing
/// matched") — "no such object" is signalled by the store returning no
/// result at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResult {
    /// Name of the object the snapshot was taken from
    pub object: String,
    /// Matching lines, oldest first
    pub lines: Vec<LogLine>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_builder() {
        let f = HistoryFilter::new().last_seconds(3600).last_lines(50);
        assert_eq!(f.last_seconds, 3600);
        assert_eq!(f.last_lines, 50);
    }
}
