//! # Scrollback Backend
//!
//! The host-facing channel-history backend.
//!
//! The host hands every broadcastable message to [`HistoryBackend::add`]
//! and asks for a filtered replay on join or scroll-back via
//! [`HistoryBackend::request`]. A periodic [`MemBackend::tick`] amortizes
//! retention across the object table and, when persistence is configured,
//! writes dirty objects to encrypted per-object files.
//!
//! ## Example
//!
//! ```rust
//! use scrollback_backend::{HistoryBackend, HistoryConfig, MemBackend};
//! use scrollback_history::HistoryFilter;
//!
//! let mut backend = MemBackend::new(
//!     HistoryConfig::new(),
//!     Box::new(|_object: &str| false),
//! )
//! .expect("defaults validate");
//!
//! backend.set_limit("#rust", 100, 86_400);
//! backend.add("#rust", &[], ":alice PRIVMSG #rust :hello");
//!
//! let replay = backend
//!     .request("#rust", &HistoryFilter::new().last_lines(50))
//!     .expect("history exists");
//! assert_eq!(replay.lines.len(), 1);
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod registry;

// Re-exports
pub use backend::{Capability, HistoryBackend, MemBackend, PersistenceEligibility};
pub use config::{HistoryConfig, DEFAULT_DIRECTORY, MASTER_DB_NAME};
pub use error::{BackendError, ConfigError};
pub use registry::BackendRegistry;
