//! Error types for the backend layer

use std::path::PathBuf;

use thiserror::Error;

use scrollback_db::DbError;

/// Configuration problems, surfaced before the backend boots.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `db-secret` given without `persist`
    #[error("db-secret is set but persist is disabled; enable persist or remove db-secret")]
    SecretWithoutPersist,

    /// `persist` given without `db-secret`
    #[error("persist is enabled but db-secret is not set")]
    PersistWithoutSecret,

    /// The secret failed the primitive's checks
    #[error("db-secret rejected: {0}")]
    BadSecret(String),

    /// The history directory is missing and could not be created
    #[error("history directory {} does not exist and could not be created: {}", .path.display(), .source)]
    Directory {
        /// The configured directory
        path: PathBuf,
        /// The underlying failure
        source: std::io::Error,
    },
}

/// Errors raised by backend construction and host hooks.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The configuration failed validation
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The master database could not be opened or created
    #[error("master database error: {0}")]
    MasterDb(#[from] DbError),

    /// A backend with this name already exists in the registry
    #[error("history backend '{0}' is already registered")]
    DuplicateBackend(String),
}
