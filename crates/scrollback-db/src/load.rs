//! Startup reconciliation of the history directory
//!
//! Walks the configured directory once, replaying every per-object file
//! into the live store. Files that cannot be trusted are moved into the
//! `bad/` subdirectory for forensics; files for objects the host no longer
//! registers are deleted; files sealed by a different installation are left
//! alone.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use scrollback_history::MemoryStore;

use crate::error::{DbError, DbResult};
use crate::master::MasterDb;
use crate::object_db::{read_object_file, ReadOutcome};

/// Subdirectory quarantined files move into.
pub const BAD_SUBDIR: &str = "bad";

/// Counters from one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Files replayed successfully
    pub loaded: usize,
    /// Files left in place (unreadable or foreign installation)
    pub skipped: usize,
    /// Files moved to `bad/`
    pub quarantined: usize,
    /// Files for unregistered objects, deleted
    pub deleted: usize,
}

/// Replay every `*.db` file under `directory` into `store`.
///
/// `master.db` and the `bad/` subdirectory are never touched. The pass
/// keeps going past individual bad files; an unreadable directory yields
/// empty stats.
pub fn load_directory(
    directory: &Path,
    secret: &str,
    master: &MasterDb,
    store: &mut MemoryStore,
) -> LoadStats {
    let mut stats = LoadStats::default();

    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                directory = %directory.display(),
                error = %e,
                "unable to read history directory"
            );
            return stats;
        }
    };

    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".db") || name == "master.db" {
            continue;
        }

        match read_object_file(&path, secret, master, store) {
            Ok(ReadOutcome::Loaded { object, lines }) => {
                debug!(object = %object, lines = lines, "replayed history database");
                stats.loaded += 1;
            }
            Ok(ReadOutcome::ForeignInstallation) => {
                warn!(
                    path = %path.display(),
                    "database does not belong to our master database, ignoring"
                );
                stats.skipped += 1;
            }
            Ok(ReadOutcome::UnknownObject { object }) => {
                warn!(
                    object = %object,
                    "no live object registered for stored history, deleting file"
                );
                let _ = fs::remove_file(&path);
                stats.deleted += 1;
            }
            Err(e @ (DbError::Io(_) | DbError::NotFound(_))) => {
                warn!(path = %path.display(), error = %e, "unable to open database, skipping");
                stats.skipped += 1;
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "corrupt history database, quarantining"
                );
                match quarantine(directory, &path) {
                    Ok(_) => stats.quarantined += 1,
                    Err(qe) => {
                        warn!(path = %path.display(), error = %qe, "quarantine failed");
                        stats.skipped += 1;
                    }
                }
            }
        }
    }

    info!(
        loaded = stats.loaded,
        skipped = stats.skipped,
        quarantined = stats.quarantined,
        deleted = stats.deleted,
        "finished loading history databases"
    );
    stats
}

/// Move a suspect file into `directory/bad/`, replacing any previous file
/// of the same name.
pub fn quarantine(directory: &Path, path: &Path) -> DbResult<PathBuf> {
    let bad_dir = directory.join(BAD_SUBDIR);
    fs::create_dir_all(&bad_dir)?;

    let basename = path
        .file_name()
        .ok_or_else(|| DbError::Corrupt("quarantine target has no filename".into()))?;
    let dest = bad_dir.join(basename);
    let _ = fs::remove_file(&dest);
    fs::rename(path, &dest)?;
    Ok(dest)
}
