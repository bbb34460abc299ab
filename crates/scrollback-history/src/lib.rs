//! # Scrollback History
//!
//! In-memory message-history store for chat objects (typically channels).
//!
//! Each object keeps a bounded log of recent lines: bounded in count
//! (`max_lines`) and in age (`max_time`). Per-object metadata (line count,
//! oldest timestamp) is cached so the frequent retention checks are cheap.
//!
//! ## Features
//!
//! - **MemoryStore**: hash-indexed collection of per-object logs
//! - **Retention**: line-count and age caps enforced on ingest and by an
//!   amortized cleaner sweep
//! - **Query**: filtered replay snapshots ("last N lines within T seconds")
//! - **Clock**: injectable time source, with a manual clock for tests
//!
//! ## Example
//!
//! ```rust
//! use scrollback_history::{HistoryFilter, MemoryStore, MessageTag};
//!
//! let mut store = MemoryStore::new();
//! store.set_limit("#rust", 100, 86_400);
//! store.add("#rust", &[MessageTag::named("msgid")], ":alice PRIVMSG #rust :hello");
//!
//! let result = store
//!     .request("#rust", &HistoryFilter::new().last_lines(50))
//!     .expect("history exists");
//! assert_eq!(result.lines.len(), 1);
//! ```

pub mod clock;
pub mod filter;
pub mod index;
pub mod line;
pub mod object;
pub mod store;
pub mod tag;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use filter::{HistoryFilter, HistoryResult};
pub use index::{ObjectIndex, BUCKET_COUNT};
pub use line::{format_server_time, parse_server_time, LogLine};
pub use object::LogObject;
pub use store::{
    MemoryStore, CLEAN_PER_SWEEP, CLEAN_SPREAD, DEFAULT_MAX_LINES, DEFAULT_MAX_TIME_SECS,
    MAX_OFF_SECS, SWEEP_INTERVAL,
};
pub use tag::{find_tag, MessageTag, TIME_TAG};
