//! Proposal lifecycle helpers.
//!
//! Each stage family moves `idle → preview → accepted`: a run puts the
//! engine's output into preview, the accept action commits it into
//! `cv_data` and marks the family accepted. Back-navigation drops a family
//! back to preview of the restored snapshot.

use chrono::Utc;
use serde_json::Value;

use cvt_domain::error::{Error, Result};
use cvt_domain::session::{PendingProposal, ProposalPhase, SessionRecord};
use cvt_domain::WizardStage;

/// Cache key for a stage proposal: `{stage}:{job_signature}:{base_signature}`.
pub fn cache_key(stage: &str, job_signature: &str, base_signature: &str) -> String {
    format!("{stage}:{job_signature}:{base_signature}")
}

/// Store a freshly generated proposal in preview.
pub fn set_preview(record: &mut SessionRecord, stage: WizardStage, payload: Value) {
    record.metadata.pending_proposals.insert(
        stage.as_str().to_owned(),
        PendingProposal {
            stage,
            phase: ProposalPhase::Preview,
            payload,
            created_at: Utc::now(),
        },
    );
}

/// Fetch the proposal a user is about to accept. It must be in preview.
pub fn preview_payload(record: &SessionRecord, stage: WizardStage) -> Result<Value> {
    let pending = record
        .metadata
        .pending_proposals
        .get(stage.as_str())
        .ok_or_else(|| Error::NotFound(format!("no proposal for stage {stage}")))?;
    if pending.phase != ProposalPhase::Preview {
        return Err(Error::StageViolation {
            action: "accept".into(),
            stage: format!("{stage} (proposal is {:?})", pending.phase),
        });
    }
    Ok(pending.payload.clone())
}

/// Mark a family's proposal as committed.
pub fn mark_accepted(record: &mut SessionRecord, stage: WizardStage) {
    if let Some(pending) = record
        .metadata
        .pending_proposals
        .get_mut(stage.as_str())
    {
        pending.phase = ProposalPhase::Accepted;
    }
}

/// Whether any proposal is still waiting on the user. Generation is gated on
/// this being false.
pub fn any_preview_outstanding(record: &SessionRecord) -> bool {
    record
        .metadata
        .pending_proposals
        .values()
        .any(|p| p.phase == ProposalPhase::Preview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn preview_then_accept_lifecycle() {
        let mut record = SessionRecord::bootstrap(24, Utc::now());
        let stage = WizardStage::WorkExperience;

        assert!(preview_payload(&record, stage).is_err());
        set_preview(&mut record, stage, serde_json::json!({"roles": []}));
        assert!(any_preview_outstanding(&record));

        let payload = preview_payload(&record, stage).unwrap();
        assert_eq!(payload["roles"], serde_json::json!([]));

        mark_accepted(&mut record, stage);
        assert!(!any_preview_outstanding(&record));
        // Accepting twice is a stage violation.
        assert!(preview_payload(&record, stage).is_err());
    }
}
