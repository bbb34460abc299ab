//! Error types for the database layer

use std::path::PathBuf;

use thiserror::Error;

/// Errors from reading or writing encrypted history databases.
#[derive(Debug, Error)]
pub enum DbError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not exist (distinct from other open failures: an
    /// absent master database means "first boot", not "refuse to boot")
    #[error("database file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Sealing the record buffer failed
    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// Authentication failed: wrong secret or a tampered file
    #[error("decryption failed (wrong secret or tampered file)")]
    Decrypt,

    /// Structurally invalid content
    #[error("corrupt database: {0}")]
    Corrupt(String),

    /// A record was cut short
    #[error("unexpected end of database file")]
    UnexpectedEof,

    /// File format predates the oldest version we can read
    #[error("database version {0} is too old")]
    VersionTooOld(u32),

    /// File format postdates this build
    #[error("database version {0} is from a newer build")]
    VersionTooNew(u32),

    /// A string record exceeds what the length prefix can carry
    #[error("string record exceeds the format's length limit")]
    StringTooLong,

    /// The configured secret fails basic strength checks
    #[error("db-secret must be at least {0} characters")]
    WeakSecret(usize),
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
