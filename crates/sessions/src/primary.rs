//! Primary session store.
//!
//! A small key/value index: partition `cv`, row = session id, value = a JSON
//! envelope of named properties. The store enforces a hard per-property size
//! limit the way a cloud table service would; oversized writes are refused
//! with a typed error and the caller is expected to offload first.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::{Map, Value};

use cvt_domain::error::{Error, Result};

/// One persisted session envelope: named properties, each individually
/// subject to the size limit.
pub type Envelope = Map<String, Value>;

/// Primary-store contract. `put_raw` must refuse envelopes with any property
/// whose serialized size exceeds the limit.
pub trait PrimaryStore: Send + Sync {
    fn get_raw(&self, session_id: &str) -> Result<Option<Envelope>>;
    fn put_raw(&self, session_id: &str, envelope: &Envelope) -> Result<()>;
    fn delete(&self, session_id: &str) -> Result<()>;
    fn list_ids(&self) -> Result<Vec<String>>;
    fn property_limit(&self) -> usize;
}

/// Serialized size of a single property value.
pub fn property_size(value: &Value) -> usize {
    serde_json::to_vec(value).map(|b| b.len()).unwrap_or(usize::MAX)
}

/// The largest property in an envelope, by serialized size.
pub fn oversized_properties(envelope: &Envelope, limit: usize) -> Vec<(String, usize)> {
    let mut found: Vec<(String, usize)> = envelope
        .iter()
        .map(|(k, v)| (k.clone(), property_size(v)))
        .filter(|(_, size)| *size > limit)
        .collect();
    found.sort_by(|a, b| b.1.cmp(&a.1));
    found
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File-backed implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One JSON file per session under `{state_path}/sessions/`, plus an
/// in-process lock serializing writes.
pub struct FilePrimaryStore {
    dir: PathBuf,
    property_limit: usize,
    write_lock: RwLock<()>,
}

impl FilePrimaryStore {
    pub fn new(state_path: &Path, property_limit: usize) -> Result<Self> {
        let dir = state_path.join("sessions");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        tracing::info!(path = %dir.display(), property_limit, "primary store ready");
        Ok(Self {
            dir,
            property_limit,
            write_lock: RwLock::new(()),
        })
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        if session_id.is_empty()
            || session_id
                .chars()
                .any(|c| !c.is_ascii_alphanumeric() && c != '-')
        {
            return Err(Error::Other(format!("invalid session id: {session_id}")));
        }
        Ok(self.dir.join(format!("{session_id}.json")))
    }
}

impl PrimaryStore for FilePrimaryStore {
    fn get_raw(&self, session_id: &str) -> Result<Option<Envelope>> {
        let path = self.path_for(session_id)?;
        let _guard = self.write_lock.read();
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn put_raw(&self, session_id: &str, envelope: &Envelope) -> Result<()> {
        let oversized = oversized_properties(envelope, self.property_limit);
        if let Some((property, size)) = oversized.first() {
            tracing::debug!(session_id, property, size, "property over limit");
            return Err(Error::SizeLimitExceeded { bytes: *size });
        }

        let path = self.path_for(session_id)?;
        let json = serde_json::to_string(envelope)?;
        let _guard = self.write_lock.write();
        std::fs::write(&path, json).map_err(Error::Io)?;
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<()> {
        let path = self.path_for(session_id)?;
        let _guard = self.write_lock.write();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn list_ids(&self) -> Result<Vec<String>> {
        let _guard = self.write_lock.read();
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(Error::Io)? {
            let entry = entry.map_err(Error::Io)?;
            let name = entry.file_name();
            if let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) {
                ids.push(stem.to_owned());
            }
        }
        Ok(ids)
    }

    fn property_limit(&self) -> usize {
        self.property_limit
    }
}
