//! The in-memory history store
//!
//! Owns the hash index of per-object logs, the clock, and the cleaner
//! cursor. All mutation funnels through `&mut self`; the host drives the
//! store from its single event loop, so there is no interior locking.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::clock::{Clock, SystemClock};
use crate::filter::{HistoryFilter, HistoryResult};
use crate::index::{ObjectIndex, BUCKET_COUNT};
use crate::line::LogLine;
use crate::object::LogObject;
use crate::tag::MessageTag;

/// Line cap applied when ingest self-heals an unconfigured object.
pub const DEFAULT_MAX_LINES: usize = 50;

/// Age cap in seconds applied when ingest self-heals an unconfigured object.
pub const DEFAULT_MAX_TIME_SECS: i64 = 86_400;

/// How many sweeps it takes to cover the whole bucket array once.
pub const CLEAN_SPREAD: usize = 60;

/// Ceiling on how stale retention (and persistence) may get, in seconds.
pub const MAX_OFF_SECS: u64 = 300;

/// Interval at which the host should call [`MemoryStore::sweep`].
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(MAX_OFF_SECS / CLEAN_SPREAD as u64);

/// Buckets visited per sweep.
pub const CLEAN_PER_SWEEP: usize = (BUCKET_COUNT + CLEAN_SPREAD - 1) / CLEAN_SPREAD;

/// Hash-indexed store of per-object message history.
pub struct MemoryStore {
    index: ObjectIndex,
    clock: Arc<dyn Clock>,
    cursor: usize,
}

impl MemoryStore {
    /// Create a store running on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store with an injected clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            index: ObjectIndex::new(),
            clock,
            cursor: 0,
        }
    }

    /// Record a line for `object`.
    ///
    /// Creates the object if needed. An object that never received limits is
    /// a host programming error: debug builds panic, release builds warn the
    /// operator and self-heal to the documented defaults.
    pub fn add(&mut self, object: &str, tags: &[MessageTag], text: &str) {
        let now = self.clock.now();
        let obj = self.index.find_or_add(object);

        if obj.max_lines() == 0 {
            warn!(
                object = %obj.name(),
                "history add for an object with no limits configured"
            );
            if cfg!(debug_assertions) {
                panic!("history add for '{object}' which has no limits configured");
            }
            obj.set_limits(DEFAULT_MAX_LINES, DEFAULT_MAX_TIME_SECS);
        }

        if obj.num_lines() >= obj.max_lines() {
            obj.drop_head();
        }
        obj.push_line(LogLine::new(now, tags, text));
    }

    /// Build a filtered replay snapshot for `object`.
    ///
    /// Returns `None` when no such object exists ("no history"), which is
    /// distinct from a result with zero lines.
    pub fn request(&self, object: &str, filter: &HistoryFilter) -> Option<HistoryResult> {
        let obj = self.index.find(object)?;
        let now = self.clock.now().timestamp();

        // The filter may tighten the age window but never widen it past the
        // object's own retention.
        let redline = if filter.last_seconds > 0 && filter.last_seconds < obj.max_time() {
            now - filter.last_seconds
        } else {
            now - obj.max_time()
        };

        let sendable = obj.lines().filter(|l| l.t >= redline).count();
        let skip = sendable.saturating_sub(filter.last_lines);

        let lines: Vec<LogLine> = obj
            .lines()
            .filter(|l| l.t >= redline)
            .skip(skip)
            .cloned()
            .collect();

        Some(HistoryResult {
            object: obj.name().to_string(),
            lines,
        })
    }

    /// Assign retention limits to `object`, creating it if needed, and
    /// enforce them immediately.
    pub fn set_limit(&mut self, object: &str, max_lines: usize, max_time: i64) {
        let now = self.clock.now().timestamp();
        let obj = self.index.find_or_add(object);
        obj.set_limits(max_lines, max_time);
        obj.enforce_retention(now);
    }

    /// Remove `object` and free its lines.
    ///
    /// Returns `false` when no such object exists. Removing the on-disk file
    /// is the persistence layer's job and happens before this call.
    pub fn destroy(&mut self, object: &str) -> bool {
        self.index.remove(object).is_some()
    }

    /// Run retention on `object` now. Returns `false` when it doesn't exist.
    pub fn cleanup(&mut self, object: &str) -> bool {
        let now = self.clock.now().timestamp();
        match self.index.find_mut(object) {
            Some(obj) => {
                obj.enforce_retention(now);
                true
            }
            None => false,
        }
    }

    /// One cleaner sweep: visit the next [`CLEAN_PER_SWEEP`] buckets, run
    /// retention on every object in them, and hand each object to `visit`
    /// (the persistence layer writes dirty ones there).
    ///
    /// The cursor survives across calls, so delayed sweeps resume where the
    /// previous one left off and the table is covered once every
    /// [`CLEAN_SPREAD`] sweeps.
    pub fn sweep(&mut self, mut visit: impl FnMut(&mut LogObject)) {
        let now = self.clock.now().timestamp();
        for _ in 0..CLEAN_PER_SWEEP {
            for obj in self.index.bucket_mut(self.cursor).iter_mut() {
                obj.enforce_retention(now);
                visit(obj);
            }
            self.cursor = (self.cursor + 1) % BUCKET_COUNT;
        }
    }

    /// Look up an object by name.
    pub fn find(&self, object: &str) -> Option<&LogObject> {
        self.index.find(object)
    }

    /// Look up an object by name, mutably.
    pub fn find_mut(&mut self, object: &str) -> Option<&mut LogObject> {
        self.index.find_mut(object)
    }

    /// Iterate all objects.
    pub fn objects(&self) -> impl Iterator<Item = &LogObject> {
        self.index.iter()
    }

    /// Iterate all objects mutably (used to flush every dirty object).
    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut LogObject> {
        self.index.iter_mut()
    }

    /// Number of objects currently tracked.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the store tracks no objects.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
