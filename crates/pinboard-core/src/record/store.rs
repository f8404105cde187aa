//! Binary record files.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ magic: [u8; 8] = b"PINREC\0\0"       │
//! │ version: u32 (little endian)         │
//! ├──────────────────────────────────────┤
//! │ bincode-serialized Record            │
//! │  (fixed-width integers, LE, enum     │
//! │   tag as u32 variant index)          │
//! └──────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use bincode::Options;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::model::Record;
use crate::{Error, Result};

/// Magic bytes identifying a record file.
pub const MAGIC: &[u8; 8] = b"PINREC\0\0";

/// Current record format version.
pub const VERSION: u32 = 1;

/// Upper bound on an encoded record.
const MAX_RECORD_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Serialize)]
struct Envelope<'a> {
    magic: [u8; 8],
    version: u32,
    record: &'a Record,
}

#[derive(Deserialize)]
struct OwnedEnvelope {
    magic: [u8; 8],
    version: u32,
    record: Record,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_RECORD_SIZE)
        .reject_trailing_bytes()
}

/// Saves and loads records in one directory.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the record files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path a record is saved under.
    #[must_use]
    pub fn path_for(&self, record: &Record) -> PathBuf {
        self.dir.join(record.filename())
    }

    /// Writes a record to [`Record::filename`] in the store directory,
    /// replacing any file of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory or file cannot be written.
    pub fn save(&self, record: &Record) -> Result<PathBuf> {
        let path = self.path_for(record);
        let bytes = encode(record).map_err(|e| Error::io(&path, e))?;

        std::fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        std::fs::write(&path, &bytes).map_err(|e| Error::io(&path, e))?;

        info!(path = %path.display(), bytes = bytes.len(), "Record saved");
        Ok(path)
    }

    /// Reads a record. Relative names are resolved against the store
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, and
    /// [`Error::Decode`] if it is not a complete record of this version.
    pub fn load(&self, filename: impl AsRef<Path>) -> Result<Record> {
        let path = self.dir.join(filename);
        let data = std::fs::read(&path).map_err(|e| Error::io(&path, e))?;

        let record = decode(&data).map_err(|reason| Error::Decode {
            path: path.clone(),
            reason,
        })?;

        debug!(path = %path.display(), sender = %record.sender_name, "Record loaded");
        Ok(record)
    }
}

fn encode(record: &Record) -> std::io::Result<Vec<u8>> {
    let envelope = Envelope {
        magic: *MAGIC,
        version: VERSION,
        record,
    };
    codec()
        .serialize(&envelope)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

fn decode(data: &[u8]) -> std::result::Result<Record, String> {
    if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
        return Err("Invalid magic bytes".into());
    }

    let envelope: OwnedEnvelope = codec()
        .deserialize(data)
        .map_err(|e| format!("Record deserialization failed: {e}"))?;

    if envelope.magic != *MAGIC {
        return Err("Invalid magic bytes".into());
    }
    if envelope.version != VERSION {
        return Err(format!(
            "Incompatible version: expected {VERSION}, found {}",
            envelope.version
        ));
    }
    Ok(envelope.record)
}
