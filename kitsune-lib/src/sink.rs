//! Key-storage sinks that verified blobs are forwarded to.

use crate::error::SinkError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Capability to store one key record, addressed by device identity.
///
/// Both arguments are uppercase hex. A put is treated as idempotent: storing
/// the same identity again overwrites or duplicates, never conflicts.
pub trait KeySink {
    fn put(&mut self, identity: &str, key_material: &str) -> Result<(), SinkError>;
}

impl<S: KeySink + ?Sized> KeySink for &mut S {
    fn put(&mut self, identity: &str, key_material: &str) -> Result<(), SinkError> {
        (**self).put(identity, key_material)
    }
}

impl<S: KeySink + ?Sized> KeySink for Box<S> {
    fn put(&mut self, identity: &str, key_material: &str) -> Result<(), SinkError> {
        (**self).put(identity, key_material)
    }
}

/// A stored key record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub device_id: String,
    pub aes_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<DateTime<Utc>>,
}

/// In-memory key store; last put for an identity wins.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: HashMap<String, String>,
    puts: usize,
    reject: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that refuses every put
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn get(&self, identity: &str) -> Option<&str> {
        self.records.get(identity).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of accepted puts, including overwrites
    pub fn put_count(&self) -> usize {
        self.puts
    }
}

impl KeySink for MemorySink {
    fn put(&mut self, identity: &str, key_material: &str) -> Result<(), SinkError> {
        if self.reject {
            return Err(SinkError::Rejected(identity.to_string()));
        }
        self.records.insert(identity.to_string(), key_material.to_string());
        self.puts += 1;
        Ok(())
    }
}

/// Append-only JSON-lines key store, one [`KeyRecord`] per line.
pub struct FileKeyStore {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileKeyStore {
    /// Open (or create) the store, appending to any existing records
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record currently in a store file
    pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<KeyRecord>, SinkError> {
        let contents = std::fs::read_to_string(path)?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(SinkError::from))
            .collect()
    }
}

impl KeySink for FileKeyStore {
    fn put(&mut self, identity: &str, key_material: &str) -> Result<(), SinkError> {
        let record = KeyRecord {
            device_id: identity.to_string(),
            aes_key: key_material.to_string(),
            stored_at: Some(Utc::now()),
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        debug!(device_id = identity, path = ?self.path, "Stored key record");
        Ok(())
    }
}
