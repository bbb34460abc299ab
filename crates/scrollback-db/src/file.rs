//! The encrypted record-file primitive
//!
//! Every scrollback database is a stream of typed records (ints and
//! optional strings) sealed inside one ChaCha20-Poly1305 envelope:
//!
//! ```text
//! magic (8) || format (1) || kdf salt (16) || nonce (12) || ciphertext
//! ```
//!
//! The file key is derived per file with BLAKE3 from the configured secret
//! and the salt, so two files written with the same secret never share a
//! key stream. The single AEAD tag covers the whole record stream: any
//! altered byte inside the envelope fails authentication on open.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use crate::error::{DbError, DbResult};

const FILE_MAGIC: &[u8; 8] = b"SCRLBKDB";
const FORMAT_V1: u8 = 1;
const KDF_SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KDF_CONTEXT: &str = "scrollback 2024-06 db file key v1";

/// Length prefix that encodes a null string record.
const NULL_MARKER: u32 = u32::MAX;

/// Minimum accepted `db-secret` length.
pub const MIN_SECRET_LEN: usize = 8;

/// Basic strength check on a configured secret, for config post-test.
pub fn validate_secret(secret: &str) -> DbResult<()> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(DbError::WeakSecret(MIN_SECRET_LEN));
    }
    Ok(())
}

fn derive_key(secret: &str, salt: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT);
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Buffers typed records and seals them to a file on [`DbWriter::commit`].
///
/// No I/O happens before `commit`, so an abandoned writer leaves nothing
/// on disk and a failed commit leaves at most a partial file at the writer's
/// own path (callers write to a temporary path and rename).
pub struct DbWriter {
    path: PathBuf,
    secret: String,
    buf: Vec<u8>,
}

impl DbWriter {
    /// Start a record stream destined for `path`.
    pub fn create(path: impl Into<PathBuf>, secret: &str) -> Self {
        Self {
            path: path.into(),
            secret: secret.to_string(),
            buf: Vec::new(),
        }
    }

    /// Append a `u32` record.
    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Append a `u64` record.
    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Append an optional string record. `None` is a distinct null marker,
    /// not an empty string.
    pub fn write_str(&mut self, v: Option<&str>) -> DbResult<()> {
        match v {
            None => self.write_u32(NULL_MARKER),
            Some(s) => {
                if s.len() >= NULL_MARKER as usize {
                    return Err(DbError::StringTooLong);
                }
                self.write_u32(s.len() as u32);
                self.buf.extend_from_slice(s.as_bytes());
            }
        }
        Ok(())
    }

    /// Seal the buffered records and write the file in one pass.
    pub fn commit(self) -> DbResult<()> {
        let mut salt = [0u8; KDF_SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        let key = derive_key(&self.secret, &salt);

        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| DbError::Encrypt(e.to_string()))?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, self.buf.as_slice())
            .map_err(|e| DbError::Encrypt(e.to_string()))?;

        let mut file = File::create(&self.path)?;
        file.write_all(FILE_MAGIC)?;
        file.write_all(&[FORMAT_V1])?;
        file.write_all(&salt)?;
        file.write_all(&nonce_bytes)?;
        file.write_all(&ciphertext)?;
        file.sync_all()?;
        Ok(())
    }
}

/// Opens, authenticates, and decodes a record file.
pub struct DbReader {
    buf: Vec<u8>,
    pos: usize,
}

impl DbReader {
    /// Open and decrypt `path` with the given secret.
    ///
    /// An absent file is [`DbError::NotFound`]; a damaged envelope is
    /// [`DbError::Corrupt`]; an authentication failure is
    /// [`DbError::Decrypt`].
    pub fn open(path: &Path, secret: &str) -> DbResult<Self> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DbError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let header_len = FILE_MAGIC.len() + 1 + KDF_SALT_LEN + NONCE_LEN;
        if data.len() < header_len {
            return Err(DbError::Corrupt("file too short for envelope".into()));
        }
        let (magic, rest) = data.split_at(FILE_MAGIC.len());
        if magic != FILE_MAGIC {
            return Err(DbError::Corrupt("bad envelope magic".into()));
        }
        let (format, rest) = rest.split_at(1);
        if format[0] != FORMAT_V1 {
            return Err(DbError::Corrupt(format!(
                "unknown envelope format {}",
                format[0]
            )));
        }
        let (salt, rest) = rest.split_at(KDF_SALT_LEN);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

        let key = derive_key(secret, salt);
        let cipher =
            ChaCha20Poly1305::new_from_slice(&key).map_err(|e| DbError::Encrypt(e.to_string()))?;
        let nonce = Nonce::from_slice(nonce_bytes);
        let buf = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| DbError::Decrypt)?;

        Ok(Self { buf, pos: 0 })
    }

    fn take(&mut self, n: usize) -> DbResult<&[u8]> {
        if self.buf.len() - self.pos < n {
            return Err(DbError::UnexpectedEof);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a `u32` record.
    pub fn read_u32(&mut self) -> DbResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a `u64` record.
    pub fn read_u64(&mut self) -> DbResult<u64> {
        let bytes = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(arr))
    }

    /// Read an optional string record.
    pub fn read_str(&mut self) -> DbResult<Option<String>> {
        let len = self.read_u32()?;
        if len == NULL_MARKER {
            return Ok(None);
        }
        let bytes = self.take(len as usize)?.to_vec();
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| DbError::Corrupt("invalid UTF-8 in string record".into()))
    }

    /// Whether every record has been consumed.
    pub fn at_end(&self) -> bool {
        self.pos == self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SECRET: &str = "correct horse battery staple";

    fn write_sample(path: &Path) {
        let mut w = DbWriter::create(path, SECRET);
        w.write_u32(0xDEAD_BEEF);
        w.write_u64(42);
        w.write_str(Some("hello")).unwrap();
        w.write_str(None).unwrap();
        w.write_str(Some("")).unwrap();
        w.commit().unwrap();
    }

    #[test]
    fn test_record_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        write_sample(&path);

        let mut r = DbReader::open(&path, SECRET).unwrap();
        assert_eq!(r.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_u64().unwrap(), 42);
        assert_eq!(r.read_str().unwrap().as_deref(), Some("hello"));
        assert_eq!(r.read_str().unwrap(), None);
        assert_eq!(r.read_str().unwrap().as_deref(), Some(""));
        assert!(r.at_end());
    }

    #[test]
    fn test_wrong_secret_fails_authentication() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        write_sample(&path);

        assert!(matches!(
            DbReader::open(&path, "a different secret"),
            Err(DbError::Decrypt)
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            DbReader::open(&dir.path().join("absent.db"), SECRET),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_any_flipped_ciphertext_byte_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        write_sample(&path);

        let original = std::fs::read(&path).unwrap();
        let header_len = FILE_MAGIC.len() + 1 + KDF_SALT_LEN + NONCE_LEN;
        for i in header_len..original.len() {
            let mut tampered = original.clone();
            tampered[i] ^= 0x01;
            std::fs::write(&path, &tampered).unwrap();
            assert!(
                matches!(DbReader::open(&path, SECRET), Err(DbError::Decrypt)),
                "byte {i} flip not detected"
            );
        }
    }

    #[test]
    fn test_damaged_envelope_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        write_sample(&path);

        let mut data = std::fs::read(&path).unwrap();
        data[0] ^= 0xFF;
        std::fs::write(&path, &data).unwrap();
        assert!(matches!(
            DbReader::open(&path, SECRET),
            Err(DbError::Corrupt(_))
        ));

        std::fs::write(&path, b"abc").unwrap();
        assert!(matches!(
            DbReader::open(&path, SECRET),
            Err(DbError::Corrupt(_))
        ));
    }

    #[test]
    fn test_truncated_record_stream() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");

        let mut w = DbWriter::create(&path, SECRET);
        w.write_u32(7);
        w.commit().unwrap();

        let mut r = DbReader::open(&path, SECRET).unwrap();
        assert_eq!(r.read_u32().unwrap(), 7);
        assert!(matches!(r.read_u64(), Err(DbError::UnexpectedEof)));
    }

    #[test]
    fn test_string_claiming_more_than_remains() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");

        let mut w = DbWriter::create(&path, SECRET);
        w.write_u32(1000); // length prefix with no payload behind it
        w.commit().unwrap();

        let mut r = DbReader::open(&path, SECRET).unwrap();
        assert!(matches!(r.read_str(), Err(DbError::UnexpectedEof)));
    }

    #[test]
    fn test_validate_secret() {
        assert!(validate_secret("long enough secret").is_ok());
        assert!(matches!(
            validate_secret("short"),
            Err(DbError::WeakSecret(_))
        ));
    }
}
