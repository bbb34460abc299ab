//! The memory history backend
//!
//! Ties the in-memory store to the encrypted persistence layer and exposes
//! the surface the host consumes: the four [`HistoryBackend`] entry points,
//! the periodic cleaner tick, and the mode / rehash / capability hooks.

use std::sync::Arc;

use tracing::{info, warn};

use scrollback_db::{delete_object_file, load_directory, write_object, MasterDb};
use scrollback_history::{
    Clock, HistoryFilter, HistoryResult, MemoryStore, MessageTag, SWEEP_INTERVAL,
};

use crate::config::HistoryConfig;
use crate::error::{BackendError, ConfigError};

/// The four entry points a history backend provides to the host.
pub trait HistoryBackend {
    /// Record a line for `object`.
    fn add(&mut self, object: &str, tags: &[MessageTag], line: &str);

    /// Build a filtered replay snapshot. `None` means "no history for this
    /// object", distinct from an empty result.
    fn request(&self, object: &str, filter: &HistoryFilter) -> Option<HistoryResult>;

    /// Drop `object` and everything stored for it. Returns `false` when the
    /// object was unknown.
    fn destroy(&mut self, object: &str) -> bool;

    /// Assign retention limits, creating the object if needed.
    fn set_limit(&mut self, object: &str, max_lines: usize, max_time: i64);
}

/// The host's answer to "may this object's history be written to disk?".
///
/// In the reference host this is "the channel exists and has mode `+P`".
pub trait PersistenceEligibility {
    /// Whether `object` is currently persistence-eligible.
    fn is_persistent(&self, object: &str) -> bool;
}

impl<F: Fn(&str) -> bool> PersistenceEligibility for F {
    fn is_persistent(&self, object: &str) -> bool {
        self(object)
    }
}

/// A client capability advertised by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    /// Capability name
    pub name: &'static str,
    /// Capability parameter shown to clients
    pub parameter: &'static str,
}

/// The `"mem"` history backend: in-memory logs, optionally persisted.
pub struct MemBackend {
    store: MemoryStore,
    cfg: HistoryConfig,
    master: Option<MasterDb>,
    eligibility: Box<dyn PersistenceEligibility>,
    loaded: bool,
}

impl MemBackend {
    /// Name this backend registers under.
    pub const NAME: &'static str = "mem";

    /// Capability name advertised to clients.
    pub const CAPABILITY_NAME: &'static str = "unrealircd.org/history-storage";

    /// Boot a backend on the system clock.
    ///
    /// Validates the configuration, creates the history directory, and
    /// loads or creates the master database. Any failure here refuses boot.
    pub fn new(
        cfg: HistoryConfig,
        eligibility: Box<dyn PersistenceEligibility>,
    ) -> Result<Self, BackendError> {
        Self::with_clock(Arc::new(scrollback_history::SystemClock), cfg, eligibility)
    }

    /// Boot a backend on an injected clock.
    pub fn with_clock(
        clock: Arc<dyn Clock>,
        cfg: HistoryConfig,
        eligibility: Box<dyn PersistenceEligibility>,
    ) -> Result<Self, BackendError> {
        cfg.validate()?;

        let master = match (&cfg.db_secret, cfg.persist) {
            (Some(secret), true) => {
                std::fs::create_dir_all(&cfg.directory).map_err(|source| {
                    ConfigError::Directory {
                        path: cfg.directory.clone(),
                        source,
                    }
                })?;
                Some(MasterDb::load_or_create(&cfg.master_db_path(), secret)?)
            }
            _ => None,
        };

        Ok(Self {
            store: MemoryStore::with_clock(clock),
            cfg,
            master,
            eligibility,
            loaded: false,
        })
    }

    /// How often the host should call [`MemBackend::tick`].
    pub fn tick_interval() -> std::time::Duration {
        SWEEP_INTERVAL
    }

    /// One-time deferred load of the history directory.
    ///
    /// Runs on the first tick rather than at construction so the host has
    /// registered every object's limits (via `set_limit`) by the time files
    /// are replayed; files for unregistered objects are deleted.
    pub fn init(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        if let (Some(master), Some(secret), true) = (
            self.master.as_ref(),
            self.cfg.db_secret.as_deref(),
            self.cfg.persist,
        ) {
            let stats = load_directory(&self.cfg.directory, secret, master, &mut self.store);
            info!(
                loaded = stats.loaded,
                quarantined = stats.quarantined,
                "history backend finished initial load"
            );
        }
    }

    /// Periodic cleaner tick: retention on a slice of the table, then a
    /// write-back of every dirty, persistence-eligible object visited.
    ///
    /// Write failures keep the object dirty; the next pass over its bucket
    /// retries. The first call performs the deferred initial load.
    pub fn tick(&mut self) {
        self.init();

        let Self {
            store,
            cfg,
            master,
            eligibility,
            ..
        } = self;

        store.sweep(|obj| {
            if !cfg.persist || !obj.is_dirty() {
                return;
            }
            let (Some(master), Some(secret)) = (master.as_ref(), cfg.db_secret.as_deref()) else {
                return;
            };
            if !eligibility.is_persistent(obj.name()) {
                return;
            }
            match write_object(&cfg.directory, master, secret, obj) {
                Ok(()) => obj.clear_dirty(),
                Err(e) => warn!(
                    object = %obj.name(),
                    error = %e,
                    "error writing history database, keeping dirty for retry"
                ),
            }
        });
    }

    /// Write every dirty, persistence-eligible object now (graceful
    /// shutdown; the cleaner's pacing is bypassed).
    pub fn flush(&mut self) {
        let Self {
            store,
            cfg,
            master,
            eligibility,
            ..
        } = self;

        if !cfg.persist {
            return;
        }
        let (Some(master), Some(secret)) = (master.as_ref(), cfg.db_secret.as_deref()) else {
            return;
        };

        for obj in store.objects_mut() {
            if !obj.is_dirty() || !eligibility.is_persistent(obj.name()) {
                continue;
            }
            match write_object(&cfg.directory, master, secret, obj) {
                Ok(()) => obj.clear_dirty(),
                Err(e) => warn!(
                    object = %obj.name(),
                    error = %e,
                    "error writing history database during flush"
                ),
            }
        }
    }

    /// Host hook: a channel mode character was removed.
    ///
    /// Losing `+P` deletes the on-disk file immediately. The object is
    /// marked dirty so a later re-enable rewrites the file on the next
    /// sweep even if nobody speaks in the meantime.
    pub fn mode_char_del(&mut self, object: &str, modechar: char) {
        if !self.cfg.persist || modechar != 'P' {
            return;
        }
        let Some(master) = self.master.as_ref() else {
            return;
        };
        if self.store.find(object).is_none() {
            return;
        }
        if let Err(e) = delete_object_file(&self.cfg.directory, master, object) {
            warn!(object = %object, error = %e, "error deleting history database");
        }
        if let Some(obj) = self.store.find_mut(object) {
            obj.mark_dirty();
        }
    }

    /// Host hook: configuration was rehashed.
    ///
    /// Swaps in the freshly parsed configuration and re-reads the master
    /// database under it. The salts are never rotated; existing per-object
    /// files stay valid. The in-memory logs are untouched.
    pub fn rehash(&mut self, cfg: HistoryConfig) -> Result<(), BackendError> {
        cfg.validate()?;

        let master = match (&cfg.db_secret, cfg.persist) {
            (Some(secret), true) => {
                std::fs::create_dir_all(&cfg.directory).map_err(|source| {
                    ConfigError::Directory {
                        path: cfg.directory.clone(),
                        source,
                    }
                })?;
                Some(MasterDb::load_or_create(&cfg.master_db_path(), secret)?)
            }
            _ => None,
        };

        self.cfg = cfg;
        self.master = master;
        Ok(())
    }

    /// The capability advertised to clients, reflecting persistence.
    pub fn capability(&self) -> Capability {
        Capability {
            name: Self::CAPABILITY_NAME,
            parameter: if self.cfg.persist {
                "memory,disk=encrypted"
            } else {
                "memory"
            },
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &HistoryConfig {
        &self.cfg
    }

    /// The underlying store (inspection and tests).
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl HistoryBackend for MemBackend {
    fn add(&mut self, object: &str, tags: &[MessageTag], line: &str) {
        self.store.add(object, tags, line);
    }

    fn request(&self, object: &str, filter: &HistoryFilter) -> Option<HistoryResult> {
        self.store.request(object, filter)
    }

    fn destroy(&mut self, object: &str) -> bool {
        if self.cfg.persist {
            if let Some(master) = self.master.as_ref() {
                if self.store.find(object).is_some() {
                    if let Err(e) = delete_object_file(&self.cfg.directory, master, object) {
                        warn!(object = %object, error = %e, "error deleting history database");
                    }
                }
            }
        }
        self.store.destroy(object)
    }

    fn set_limit(&mut self, object: &str, max_lines: usize, max_time: i64) {
        self.store.set_limit(object, max_lines, max_time);
    }
}
