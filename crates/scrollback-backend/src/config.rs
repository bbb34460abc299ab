//! Configuration for the channel-history backend
//!
//! Maps the host's `set.history.channel` subtree. Parsing is the host's
//! concern; this type carries the recognized keys, applies defaults, and
//! runs the post-test validation that gates boot.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Default history directory, relative to the host's permanent-data root.
pub const DEFAULT_DIRECTORY: &str = "history";

/// Filename of the master database inside the history directory.
pub const MASTER_DB_NAME: &str = "master.db";

/// Recognized `set.history.channel` options.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct HistoryConfig {
    /// Whether history is written to disk at all
    #[serde(default)]
    pub persist: bool,

    /// Root directory for the master and per-object files
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Passphrase for the encrypted database files
    #[serde(default)]
    pub db_secret: Option<String>,
}

fn default_directory() -> PathBuf {
    PathBuf::from(DEFAULT_DIRECTORY)
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            persist: false,
            directory: default_directory(),
            db_secret: None,
        }
    }
}

impl HistoryConfig {
    /// The defaults: in-memory only, directory `"history"`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the master database under the configured directory.
    pub fn master_db_path(&self) -> PathBuf {
        self.directory.join(MASTER_DB_NAME)
    }

    /// Anchor a relative directory to the host's permanent-data root.
    pub fn resolve(&mut self, permdata_root: &Path) {
        if self.directory.is_relative() {
            self.directory = permdata_root.join(&self.directory);
        }
    }

    /// The post-test matrix: `db-secret` and `persist` require each other,
    /// and the secret must pass the primitive's checks.
    ///
    /// Directory creation and the master-database probe happen at backend
    /// construction, where their failures also refuse boot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.db_secret, self.persist) {
            (Some(_), false) => Err(ConfigError::SecretWithoutPersist),
            (None, true) => Err(ConfigError::PersistWithoutSecret),
            (Some(secret), true) => scrollback_db::validate_secret(secret)
                .map_err(|e| ConfigError::BadSecret(e.to_string())),
            (None, false) => Ok(()),
        }
    }
}
