//! # Scrollback DB
//!
//! Encrypted on-disk persistence for scrollback history.
//!
//! Every file is a stream of typed records sealed under ChaCha20-Poly1305
//! with a key derived from the configured `db-secret`. One master database
//! holds the format version and two random salts; each history object gets
//! its own file named by a salted SHA-256 of the object name, so directory
//! listings reveal neither names nor membership across installations.
//!
//! ## Features
//!
//! - **DbWriter / DbReader**: the authenticated record-file primitive
//! - **MasterDb**: version gate and filename salts, created on first boot
//! - **Per-object files**: strict binary layout, atomic write-then-rename
//! - **Reconciliation**: startup directory walk with corruption quarantine

pub mod error;
pub mod file;
pub mod load;
pub mod master;
pub mod object_db;

// Re-exports
pub use error::{DbError, DbResult};
pub use file::{validate_secret, DbReader, DbWriter, MIN_SECRET_LEN};
pub use load::{load_directory, quarantine, LoadStats, BAD_SUBDIR};
pub use master::{MasterDb, DB_VERSION, DB_VERSION_FLOOR, SALT_LEN};
pub use object_db::{
    delete_object_file, object_db_path, read_object_file, write_object, ReadOutcome,
    MAGIC_ENTRY_END, MAGIC_ENTRY_START, MAGIC_FILE_END, MAGIC_FILE_START,
};
