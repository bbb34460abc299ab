//! Per-object database files
//!
//! One encrypted file per object, named by a keyed hash so object names are
//! not recoverable from a directory listing. Writes go to a temporary file
//! that is renamed over the target only after a fully successful commit, so
//! a failed write never shadows the previous good file.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use scrollback_history::{LogObject, MemoryStore, MessageTag};

use crate::error::{DbError, DbResult};
use crate::file::{DbReader, DbWriter};
use crate::master::{MasterDb, DB_VERSION, DB_VERSION_FLOOR};

/// First record of every per-object file.
pub const MAGIC_FILE_START: u32 = 0xFEFE_FEFE;
/// Final record of every per-object file.
pub const MAGIC_FILE_END: u32 = 0xEFEF_EFEF;
/// Record opening each stored line.
pub const MAGIC_ENTRY_START: u32 = 0xFFFF_FFFF;
/// Record closing each stored line.
pub const MAGIC_ENTRY_END: u32 = 0xEEEE_EEEE;

/// Derive the on-disk path for an object's database file.
///
/// `SHA256(prehash ++ " " ++ lowercase(name) ++ " " ++ posthash)`, hex
/// encoded, with a `.db` suffix. Depends only on the lowercased name and
/// the master salts, so renames of casing map to the same file and files
/// cannot be matched across installations.
pub fn object_db_path(directory: &Path, master: &MasterDb, object: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(master.prehash.as_bytes());
    hasher.update(b" ");
    hasher.update(object.to_ascii_lowercase().as_bytes());
    hasher.update(b" ");
    hasher.update(master.posthash.as_bytes());
    directory.join(format!("{}.db", hex::encode(hasher.finalize())))
}

/// Write one object's history to its database file.
///
/// On any failure the previous file (if any) is left intact and the
/// temporary file is removed; the caller keeps the object dirty and retries
/// on a later sweep.
pub fn write_object(
    directory: &Path,
    master: &MasterDb,
    secret: &str,
    obj: &LogObject,
) -> DbResult<()> {
    let target = object_db_path(directory, master, obj.name());
    let mut tmp = target.clone().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut w = DbWriter::create(&tmp, secret);
    w.write_u32(MAGIC_FILE_START);
    w.write_u32(DB_VERSION);
    w.write_str(Some(&master.prehash))?;
    w.write_str(Some(&master.posthash))?;
    w.write_str(Some(obj.name()))?;
    w.write_u64(obj.max_lines() as u64);
    w.write_u64(obj.max_time() as u64);

    for line in obj.lines() {
        w.write_u32(MAGIC_ENTRY_START);
        w.write_u64(line.t as u64);
        for tag in &line.tags {
            w.write_str(Some(&tag.name))?;
            w.write_str(tag.value.as_deref())?;
        }
        w.write_str(None)?;
        w.write_str(None)?;
        w.write_str(Some(&line.text))?;
        w.write_u32(MAGIC_ENTRY_END);
    }
    w.write_u32(MAGIC_FILE_END);

    if let Err(e) = w.commit() {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    // Windows cannot rename over an existing file.
    #[cfg(windows)]
    let _ = std::fs::remove_file(&target);

    if let Err(e) = std::fs::rename(&tmp, &target) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Remove an object's database file. An absent file is not an error.
pub fn delete_object_file(directory: &Path, master: &MasterDb, object: &str) -> DbResult<()> {
    let path = object_db_path(directory, master, object);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// What became of a per-object file during replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Lines replayed into the live object, which is now in sync with disk
    Loaded {
        /// Object name from the file header
        object: String,
        /// Number of lines replayed
        lines: usize,
    },
    /// The salts do not match our master database; the file belongs to a
    /// different installation and was left untouched
    ForeignInstallation,
    /// No live object is registered under this name; the caller deletes the
    /// file
    UnknownObject {
        /// Object name from the file header
        object: String,
    },
}

/// Decode one per-object file and replay its lines into the live store.
///
/// The object's live limits (registered by the host before load) govern the
/// replay; the limits recorded in the file are decoded but not applied.
/// Structural errors return `Err` and the caller quarantines the file.
pub fn read_object_file(
    path: &Path,
    secret: &str,
    master: &MasterDb,
    store: &mut MemoryStore,
) -> DbResult<ReadOutcome> {
    let mut r = DbReader::open(path, secret)?;

    let magic = r.read_u32()?;
    if magic != MAGIC_FILE_START {
        return Err(DbError::Corrupt(format!(
            "wrong file-start magic 0x{magic:08x}"
        )));
    }

    let version = r.read_u32()?;
    if version < DB_VERSION_FLOOR {
        return Err(DbError::VersionTooOld(version));
    }
    if version > DB_VERSION {
        return Err(DbError::VersionTooNew(version));
    }

    let prehash = r.read_str()?;
    let posthash = r.read_str()?;
    if prehash.as_deref() != Some(master.prehash.as_str())
        || posthash.as_deref() != Some(master.posthash.as_str())
    {
        return Ok(ReadOutcome::ForeignInstallation);
    }

    let object = r
        .read_str()?
        .ok_or_else(|| DbError::Corrupt("object name is null".into()))?;
    let _max_lines = r.read_u64()?;
    let _max_time = r.read_u64()?;

    if store.find(&object).is_none() {
        return Ok(ReadOutcome::UnknownObject { object });
    }

    let mut lines = 0usize;
    loop {
        let magic = r.read_u32()?;
        if magic == MAGIC_FILE_END {
            break;
        }
        if magic != MAGIC_ENTRY_START {
            return Err(DbError::Corrupt(format!(
                "wrong entry-start magic 0x{magic:08x}"
            )));
        }

        // The authoritative line time travels in the `time` tag; this field
        // is present for forward tooling.
        let _line_ts = r.read_u64()?;

        let mut tags = Vec::new();
        loop {
            let name = r.read_str()?;
            let value = r.read_str()?;
            match (name, value) {
                (None, None) => break,
                (Some(name), value) => tags.push(MessageTag { name, value }),
                (None, Some(_)) => {
                    return Err(DbError::Corrupt("tag value without a name".into()))
                }
            }
        }

        let text = r
            .read_str()?
            .ok_or_else(|| DbError::Corrupt("line text is null".into()))?;

        let magic = r.read_u32()?;
        if magic != MAGIC_ENTRY_END {
            return Err(DbError::Corrupt(format!(
                "wrong entry-end magic 0x{magic:08x}"
            )));
        }

        store.add(&object, &tags, &text);
        lines += 1;
    }

    // The store now matches the file; don't rewrite it on the next sweep.
    if let Some(obj) = store.find_mut(&object) {
        obj.clear_dirty();
    }

    Ok(ReadOutcome::Loaded { object, lines })
}
