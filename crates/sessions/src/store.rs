//! Size-aware session store.
//!
//! Composes the primary store and the blob store. Writes go through the
//! offload discipline: any field too large for a primary-store property is
//! moved to the blob store and replaced by an [`OffloadRef`] pointer; reads
//! transparently re-expand the pointers. Version numbers implement optimistic
//! concurrency — a stale writer gets a [`Error::VersionConflict`] and must
//! retry from a fresh read.

use std::sync::Arc;

use serde_json::{Map, Value};

use cvt_domain::error::{Error, Result};
use cvt_domain::session::{OffloadRef, SessionRecord};
use cvt_domain::signature;
use cvt_domain::trace::TraceEvent;

use crate::blob::BlobStore;
use crate::primary::{property_size, Envelope, PrimaryStore};

/// Fields eligible for offload, in the order they are considered. Dotted
/// paths address into the envelope (two levels are all we need).
const OFFLOAD_PATHS: &[&str] = &[
    "cv_data",
    "metadata.cv_state_snapshots",
    "metadata.proposal_cache",
    "metadata.docx_prefill_unconfirmed",
    "metadata.event_log",
    "metadata.prompt_provenance",
];

/// Entries kept when the event log is shrunk as a last resort.
const SHRUNK_EVENT_LOG: usize = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SessionStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionStore {
    primary: Arc<dyn PrimaryStore>,
    blobs: Arc<dyn BlobStore>,
    write_retries: u32,
}

impl SessionStore {
    pub fn new(
        primary: Arc<dyn PrimaryStore>,
        blobs: Arc<dyn BlobStore>,
        write_retries: u32,
    ) -> Self {
        Self {
            primary,
            blobs,
            write_retries,
        }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    // ── Write path ─────────────────────────────────────────────────

    /// Persist a session record.
    ///
    /// Bumps `version` (optimistic concurrency against the stored copy),
    /// then writes with the offload discipline: oversized fields move to the
    /// blob store largest-first until the envelope fits; if it still does not
    /// fit, metadata is shrunk once; a terminal failure emits
    /// `PERSIST_FAILED` and returns [`Error::SizeLimitExceeded`] — the caller
    /// keeps its in-memory record and still answers the request.
    pub fn put(&self, record: &mut SessionRecord) -> Result<()> {
        let session_id = record.session_id.to_string();

        if let Some(stored) = self.primary.get_raw(&session_id)? {
            let stored_version = stored
                .get("metadata")
                .and_then(|m| m.get("version"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            if stored_version != record.metadata.version {
                return Err(Error::VersionConflict {
                    expected: record.metadata.version,
                    found: stored_version,
                });
            }
        }
        record.metadata.version += 1;

        let mut envelope = to_envelope(record)?;
        let limit = self.primary.property_limit();

        let mut last_size = 0;
        for _ in 0..=self.write_retries {
            match self.primary.put_raw(&session_id, &envelope) {
                Ok(()) => return Ok(()),
                Err(Error::SizeLimitExceeded { bytes }) => {
                    last_size = bytes;
                    if !self.offload_largest(&session_id, &mut envelope, limit)? {
                        break;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        // Last resort: drop non-essential metadata and retry once.
        shrink_metadata(&mut envelope);
        match self.primary.put_raw(&session_id, &envelope) {
            Ok(()) => Ok(()),
            Err(Error::SizeLimitExceeded { bytes }) => {
                TraceEvent::PersistFailed {
                    session_id,
                    bytes,
                    reason: "size limit after offload and shrink".into(),
                }
                .emit();
                Err(Error::SizeLimitExceeded {
                    bytes: bytes.max(last_size),
                })
            }
            Err(e) => {
                TraceEvent::PersistFailed {
                    session_id,
                    bytes: last_size,
                    reason: e.to_string(),
                }
                .emit();
                Err(e)
            }
        }
    }

    /// Offload the single largest oversized offloadable field. Returns false
    /// when nothing is left to offload.
    fn offload_largest(
        &self,
        session_id: &str,
        envelope: &mut Envelope,
        limit: usize,
    ) -> Result<bool> {
        let mut candidate: Option<(&str, usize)> = None;
        for path in OFFLOAD_PATHS {
            let Some(value) = get_path(envelope, path) else {
                continue;
            };
            if OffloadRef::matches(value) || value.is_null() {
                continue;
            }
            let size = property_size(value);
            if size > limit && candidate.map(|(_, s)| size > s).unwrap_or(true) {
                candidate = Some((path, size));
            }
        }

        // Nothing individually oversized: offload the largest remaining
        // candidate anyway — the envelope as a whole may still be too big
        // for its parent property.
        if candidate.is_none() {
            for path in OFFLOAD_PATHS {
                let Some(value) = get_path(envelope, path) else {
                    continue;
                };
                if OffloadRef::matches(value) || value.is_null() {
                    continue;
                }
                let size = property_size(value);
                if candidate.map(|(_, s)| size > s).unwrap_or(true) {
                    candidate = Some((path, size));
                }
            }
        }

        let Some((path, _)) = candidate else {
            return Ok(false);
        };

        let value = get_path(envelope, path).cloned().unwrap_or(Value::Null);
        let bytes = serde_json::to_vec(&value)?;
        let sha = signature::sha256_hex(&bytes);
        let field = path.replace('.', "_");
        let key = format!("cv-artifacts/{session_id}/{field}_{}.json", &sha[..16]);
        self.blobs.put(&key, &bytes)?;

        TraceEvent::OffloadWritten {
            session_id: session_id.to_owned(),
            key: key.clone(),
            bytes: bytes.len(),
        }
        .emit();

        let pointer = serde_json::to_value(OffloadRef::new(key, sha, bytes.len()))?;
        set_path(envelope, path, pointer);
        Ok(true)
    }

    // ── Read path ──────────────────────────────────────────────────

    /// Blob-aware read: load the envelope, expand every offload pointer,
    /// deserialize. On a blob read failure the pointer stays in place and a
    /// warning is emitted; deserialization then proceeds best-effort.
    pub fn get(&self, session_id: &str) -> Result<SessionRecord> {
        let mut envelope = self
            .primary
            .get_raw(session_id)?
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;

        self.expand(&mut envelope);
        let record: SessionRecord = serde_json::from_value(Value::Object(envelope))?;
        Ok(record)
    }

    /// Raw read without pointer expansion. Diagnostics only — orchestrator
    /// paths never use this.
    pub fn get_raw(&self, session_id: &str) -> Result<Option<Envelope>> {
        self.primary.get_raw(session_id)
    }

    fn expand(&self, envelope: &mut Envelope) {
        for path in OFFLOAD_PATHS {
            let Some(value) = get_path(envelope, path) else {
                continue;
            };
            if !OffloadRef::matches(value) {
                continue;
            }
            let Ok(pointer) = serde_json::from_value::<OffloadRef>(value.clone()) else {
                continue;
            };
            match self.blobs.get(&pointer.key) {
                Ok(bytes) => {
                    if signature::sha256_hex(&bytes) != pointer.sha256 {
                        TraceEvent::BlobReadFailed {
                            key: pointer.key.clone(),
                            reason: "checksum mismatch".into(),
                        }
                        .emit();
                        continue;
                    }
                    match serde_json::from_slice::<Value>(&bytes) {
                        Ok(expanded) => set_path(envelope, path, expanded),
                        Err(e) => TraceEvent::BlobReadFailed {
                            key: pointer.key.clone(),
                            reason: e.to_string(),
                        }
                        .emit(),
                    }
                }
                Err(e) => {
                    TraceEvent::BlobReadFailed {
                        key: pointer.key.clone(),
                        reason: e.to_string(),
                    }
                    .emit();
                }
            }
        }
    }

    // ── Maintenance ────────────────────────────────────────────────

    pub fn delete(&self, session_id: &str) -> Result<()> {
        self.primary.delete(session_id)
    }

    pub fn list_ids(&self) -> Result<Vec<String>> {
        self.primary.list_ids()
    }

    /// Load every session that still deserializes; unreadable records are
    /// skipped, not fatal.
    pub fn list_records(&self) -> Vec<SessionRecord> {
        let Ok(ids) = self.list_ids() else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.get(id).ok())
            .collect()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Envelope helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn to_envelope(record: &SessionRecord) -> Result<Envelope> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Other("session record did not serialize to an object".into())),
    }
}

/// Resolve a one- or two-segment dotted path inside the envelope.
fn get_path<'a>(envelope: &'a Envelope, path: &str) -> Option<&'a Value> {
    match path.split_once('.') {
        None => envelope.get(path),
        Some((head, rest)) => envelope.get(head)?.get(rest),
    }
}

fn set_path(envelope: &mut Envelope, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            envelope.insert(path.to_owned(), value);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = envelope.get_mut(head) {
                inner.insert(rest.to_owned(), value);
            }
        }
    }
}

/// Drop non-essential metadata keys: proposal cache, raw prefill, most of
/// the event log, provenance ring.
fn shrink_metadata(envelope: &mut Envelope) {
    let Some(Value::Object(metadata)) = envelope.get_mut("metadata") else {
        return;
    };
    metadata.insert("proposal_cache".into(), Value::Object(Map::new()));
    metadata.remove("docx_prefill_unconfirmed");
    metadata.insert("prompt_provenance".into(), Value::Array(Vec::new()));
    if let Some(Value::Array(log)) = metadata.get_mut("event_log") {
        let len = log.len();
        if len > SHRUNK_EVENT_LOG {
            log.drain(..len - SHRUNK_EVENT_LOG);
        }
    }
}
