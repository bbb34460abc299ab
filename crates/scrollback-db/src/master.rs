//! The master database
//!
//! One small encrypted file holding the format version and the two random
//! salts that bind every per-object file to this installation. Generated on
//! first boot, re-read on rehash, never rotated.

use std::path::Path;

use rand::distr::Alphanumeric;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::file::{DbReader, DbWriter};

/// Current database format version.
pub const DB_VERSION: u32 = 5000;

/// Oldest format version this build still reads.
pub const DB_VERSION_FLOOR: u32 = 4999;

/// Length of each filename salt, in alphanumeric characters.
pub const SALT_LEN: usize = 128;

/// The master database: format version plus the filename salts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterDb {
    /// Format version the installation is on
    pub version: u32,
    /// Salt hashed before the object name in filenames
    pub prehash: String,
    /// Salt hashed after the object name in filenames
    pub posthash: String,
}

impl MasterDb {
    /// Load the master database, creating it on first boot.
    ///
    /// Any failure other than "file absent" is surfaced to the caller, which
    /// treats it as a fatal configuration error.
    pub fn load_or_create(path: &Path, secret: &str) -> DbResult<Self> {
        match Self::load(path, secret) {
            Ok(db) => {
                debug!(path = %path.display(), "loaded master database");
                Ok(db)
            }
            Err(DbError::NotFound(_)) => {
                warn!(
                    path = %path.display(),
                    "no master database present, starting a new one"
                );
                let db = Self::generate();
                db.write(path, secret)?;
                Ok(db)
            }
            Err(e) => Err(e),
        }
    }

    /// Read an existing master database.
    pub fn load(path: &Path, secret: &str) -> DbResult<Self> {
        let mut r = DbReader::open(path, secret)?;
        let version = r.read_u32()?;
        if version < DB_VERSION_FLOOR {
            return Err(DbError::VersionTooOld(version));
        }
        if version > DB_VERSION {
            return Err(DbError::VersionTooNew(version));
        }
        let prehash = r
            .read_str()?
            .ok_or_else(|| DbError::Corrupt("master prehash is null".into()))?;
        let posthash = r
            .read_str()?
            .ok_or_else(|| DbError::Corrupt("master posthash is null".into()))?;

        Ok(Self {
            version,
            prehash,
            posthash,
        })
    }

    /// Write the master database to `path`.
    pub fn write(&self, path: &Path, secret: &str) -> DbResult<()> {
        let mut w = DbWriter::create(path, secret);
        w.write_u32(self.version);
        w.write_str(Some(&self.prehash))?;
        w.write_str(Some(&self.posthash))?;
        w.commit()
    }

    fn generate() -> Self {
        Self {
            version: DB_VERSION,
            prehash: random_salt(),
            posthash: random_salt(),
        }
    }
}

fn random_salt() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect()
}
