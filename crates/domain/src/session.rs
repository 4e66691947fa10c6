//! The session record — one résumé workflow, owned by the orchestrator.
//!
//! A session is created by the bootstrap action, mutated only through the
//! dispatcher, and expires after a configurable TTL. The record is persisted
//! through the size-aware store; large fields inside it may be replaced by
//! [`OffloadRef`] pointers on disk and are re-expanded on read.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::cv::{CvData, Language};
use crate::signature;
use crate::stage::WizardStage;

/// Event-log ring capacity (most recent entries win).
pub const EVENT_LOG_CAP: usize = 50;
/// Stage-history bound; old entries roll off the front.
pub const STAGE_HISTORY_CAP: usize = 100;
/// Prompt-provenance ring capacity.
pub const PROVENANCE_CAP: usize = 50;

/// Snapshot key for the pristine pre-translation state.
pub const SNAPSHOT_ORIGINAL: &str = "original";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Offload pointer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pointer left behind in the primary record when an oversized field was
/// moved to the blob store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffloadRef {
    /// Always `"offload-ref"`.
    pub kind: String,
    /// Blob key the payload was written under.
    pub key: String,
    /// Hex SHA-256 of the offloaded bytes.
    pub sha256: String,
    /// Size of the offloaded payload.
    pub bytes: usize,
}

impl OffloadRef {
    pub const KIND: &'static str = "offload-ref";

    pub fn new(key: String, sha256: String, bytes: usize) -> Self {
        Self {
            kind: Self::KIND.to_owned(),
            key,
            sha256,
            bytes,
        }
    }

    /// Cheap structural test for "is this JSON value an offload pointer".
    pub fn matches(value: &Value) -> bool {
        value.get("kind").and_then(Value::as_str) == Some(Self::KIND)
            && value.get("key").is_some()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PDF references
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compact reference to a blob-stored PDF. The bytes never live in the
/// session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfRef {
    pub blob_key: String,
    pub content_signature: String,
    pub page_count: u32,
    pub bytes: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PdfRefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv: Option<PdfRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<PdfRef>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Confirmation flags & event log
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// User confirmations the readiness gate requires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfirmedFlags {
    #[serde(default)]
    pub contact_confirmed: bool,
    #[serde(default)]
    pub education_confirmed: bool,
    #[serde(default)]
    pub language_confirmed: bool,
}

/// One dispatched action, as recorded in the bounded event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub ts: DateTime<Utc>,
    pub action_id: String,
    pub stage_before: WizardStage,
    pub stage_after: WizardStage,
    pub result: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Proposals
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lifecycle of a stage-engine proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProposalPhase {
    #[default]
    Idle,
    Preview,
    Accepted,
}

/// A proposal awaiting user action (or already committed), keyed by stage
/// family in [`SessionMetadata::pending_proposals`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingProposal {
    pub stage: WizardStage,
    pub phase: ProposalPhase,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prompt provenance
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Audit record of one LLM call; stateless traffic stays traceable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptProvenance {
    pub stage: String,
    pub effective_system_prompt_hash: String,
    pub stage_prompt_source: String,
    pub user_payload_hash: String,
    pub ts: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session metadata + record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<Language>,
    /// Bounded snapshot of fields extracted from the uploaded document.
    /// Read-only reference until a confirmation action copies it over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docx_prefill_unconfirmed: Option<Value>,
    #[serde(default)]
    pub confirmed_flags: ConfirmedFlags,
    pub stage: WizardStage,
    #[serde(default)]
    pub stage_history: Vec<WizardStage>,
    /// Accepted job-posting extraction, input to the tailoring stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_summary: Option<Value>,
    /// Signature of the posting text `job_summary` was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_signature: Option<String>,
    /// Keyed by `{stage}:{job_signature}:{base_cv_signature}`.
    #[serde(default)]
    pub proposal_cache: HashMap<String, Value>,
    /// Keyed by stage family (e.g. `"work-experience"`).
    #[serde(default)]
    pub pending_proposals: HashMap<String, PendingProposal>,
    #[serde(default)]
    pub pdf_refs: PdfRefs,
    /// Bounded ring of the last [`EVENT_LOG_CAP`] dispatched actions.
    #[serde(default)]
    pub event_log: Vec<EventLogEntry>,
    /// Immutable snapshots keyed by purpose (`original`, `translated_<lang>`).
    #[serde(default)]
    pub cv_state_snapshots: HashMap<String, CvData>,
    /// Always resolves to a key of `cv_state_snapshots`.
    pub active_state_id: String,
    #[serde(default)]
    pub prompt_provenance: Vec<PromptProvenance>,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub content_signature: String,
    pub expires_at: DateTime<Utc>,
}

/// A session binds a single résumé workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub cv_data: CvData,
    pub metadata: SessionMetadata,
}

impl SessionRecord {
    /// Create a fresh session: blank canonical object, `original` snapshot,
    /// wizard at the first stage. Version starts at 0 and is bumped by the
    /// store on every persisted mutation.
    pub fn bootstrap(ttl_hours: i64, now: DateTime<Utc>) -> Self {
        let cv_data = CvData::blank();
        let mut snapshots = HashMap::new();
        snapshots.insert(SNAPSHOT_ORIGINAL.to_owned(), cv_data.clone());

        let content_signature = signature::cv_signature(&cv_data);
        Self {
            session_id: Uuid::new_v4(),
            cv_data,
            metadata: SessionMetadata {
                target_language: None,
                source_language: None,
                docx_prefill_unconfirmed: None,
                confirmed_flags: ConfirmedFlags::default(),
                stage: WizardStage::LanguageSelection,
                stage_history: vec![WizardStage::LanguageSelection],
                job_summary: None,
                job_signature: None,
                proposal_cache: HashMap::new(),
                pending_proposals: HashMap::new(),
                pdf_refs: PdfRefs::default(),
                event_log: Vec::new(),
                cv_state_snapshots: snapshots,
                active_state_id: SNAPSHOT_ORIGINAL.to_owned(),
                prompt_provenance: Vec::new(),
                version: 0,
                updated_at: now,
                content_signature,
                expires_at: now + Duration::hours(ttl_hours),
            },
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.metadata.expires_at
    }

    /// Append a dispatched action to the event-log ring.
    pub fn push_event(&mut self, entry: EventLogEntry) {
        self.metadata.event_log.push(entry);
        let len = self.metadata.event_log.len();
        if len > EVENT_LOG_CAP {
            self.metadata.event_log.drain(..len - EVENT_LOG_CAP);
        }
    }

    /// Record a stage transition: event log + stage history + stage field.
    pub fn record_transition(
        &mut self,
        action_id: &str,
        stage_after: WizardStage,
        result: &str,
        now: DateTime<Utc>,
    ) {
        let stage_before = self.metadata.stage;
        self.push_event(EventLogEntry {
            ts: now,
            action_id: action_id.to_owned(),
            stage_before,
            stage_after,
            result: result.to_owned(),
        });
        self.metadata.stage = stage_after;
        if self.metadata.stage_history.last() != Some(&stage_after) {
            self.metadata.stage_history.push(stage_after);
            let len = self.metadata.stage_history.len();
            if len > STAGE_HISTORY_CAP {
                self.metadata.stage_history.drain(..len - STAGE_HISTORY_CAP);
            }
        }
    }

    /// Snapshot the current `cv_data` under `id` if no snapshot with that key
    /// exists yet. Snapshots are append-only; an existing snapshot is never
    /// silently overwritten.
    pub fn snapshot_if_absent(&mut self, id: &str) {
        if !self.metadata.cv_state_snapshots.contains_key(id) {
            self.metadata
                .cv_state_snapshots
                .insert(id.to_owned(), self.cv_data.clone());
        }
    }

    /// Install a new immutable snapshot and make it active. Fails if a
    /// snapshot with that key already exists with different content.
    pub fn install_snapshot(&mut self, id: &str, cv: CvData) -> crate::error::Result<()> {
        if let Some(existing) = self.metadata.cv_state_snapshots.get(id) {
            if existing != &cv {
                return Err(crate::error::Error::Other(format!(
                    "snapshot {id} already exists with different content"
                )));
            }
        } else {
            self.metadata
                .cv_state_snapshots
                .insert(id.to_owned(), cv.clone());
        }
        self.cv_data = cv;
        self.metadata.active_state_id = id.to_owned();
        Ok(())
    }

    /// Flip the active state to an existing snapshot. The working `cv_data`
    /// becomes a copy of that snapshot; no LLM call is involved.
    pub fn activate_snapshot(&mut self, id: &str) -> crate::error::Result<()> {
        let snap = self
            .metadata
            .cv_state_snapshots
            .get(id)
            .ok_or_else(|| crate::error::Error::NotFound(format!("snapshot {id}")))?;
        self.cv_data = snap.clone();
        self.metadata.active_state_id = id.to_owned();
        Ok(())
    }

    /// Record one LLM call's provenance hashes (bounded ring).
    pub fn push_provenance(&mut self, entry: PromptProvenance) {
        self.metadata.prompt_provenance.push(entry);
        let len = self.metadata.prompt_provenance.len();
        if len > PROVENANCE_CAP {
            self.metadata.prompt_provenance.drain(..len - PROVENANCE_CAP);
        }
    }

    /// Refresh `updated_at` and the content signature of the working state.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.updated_at = now;
        self.metadata.content_signature = signature::cv_signature(&self.cv_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SessionRecord {
        SessionRecord::bootstrap(24, Utc::now())
    }

    #[test]
    fn bootstrap_starts_blank_with_original_snapshot() {
        let r = record();
        assert!(r.cv_data.is_blank());
        assert_eq!(r.metadata.active_state_id, SNAPSHOT_ORIGINAL);
        assert!(r
            .metadata
            .cv_state_snapshots
            .contains_key(SNAPSHOT_ORIGINAL));
        assert_eq!(r.metadata.stage, WizardStage::LanguageSelection);
        assert_eq!(r.metadata.version, 0);
    }

    #[test]
    fn event_log_is_a_ring() {
        let mut r = record();
        for i in 0..60 {
            r.push_event(EventLogEntry {
                ts: Utc::now(),
                action_id: format!("a{i}"),
                stage_before: WizardStage::Contact,
                stage_after: WizardStage::Contact,
                result: "ok".into(),
            });
        }
        assert_eq!(r.metadata.event_log.len(), EVENT_LOG_CAP);
        assert_eq!(r.metadata.event_log[0].action_id, "a10");
    }

    #[test]
    fn transition_updates_history_and_stage() {
        let mut r = record();
        r.record_transition("LANGUAGE_SELECT", WizardStage::BulkTranslation, "ok", Utc::now());
        assert_eq!(r.metadata.stage, WizardStage::BulkTranslation);
        assert_eq!(
            r.metadata.stage_history.last(),
            Some(&WizardStage::BulkTranslation)
        );
    }

    #[test]
    fn activate_unknown_snapshot_fails() {
        let mut r = record();
        assert!(r.activate_snapshot("translated_en").is_err());
    }

    #[test]
    fn snapshots_are_append_only() {
        let mut r = record();
        r.cv_data.full_name = "Jane".into();
        // A second snapshot under the same key must not overwrite the blank
        // original.
        r.snapshot_if_absent(SNAPSHOT_ORIGINAL);
        assert!(r.metadata.cv_state_snapshots[SNAPSHOT_ORIGINAL]
            .full_name
            .is_empty());
    }

    #[test]
    fn offload_ref_matches_its_own_json() {
        let r = OffloadRef::new("cv-artifacts/x".into(), "ab".into(), 10);
        let v = serde_json::to_value(&r).unwrap();
        assert!(OffloadRef::matches(&v));
        assert!(!OffloadRef::matches(&serde_json::json!({"kind": "other"})));
    }
}
