//! Bulk translation stage.
//!
//! Translates the whole canonical résumé into the target language as a new
//! immutable snapshot (`translated_<lang>`). The original snapshot is never
//! overwritten; accepting flips `active_state_id`. Cached by
//! `(source_signature, target_language)` — re-running over an unchanged
//! source reuses the existing snapshot without a provider call.

use serde_json::{json, Value};

use cvt_domain::cv::{CvData, Language};
use cvt_domain::error::Result;
use cvt_domain::session::{SessionRecord, SNAPSHOT_ORIGINAL};
use cvt_domain::signature;
use cvt_providers::{StageCall, StageCaller};

use crate::prompts;
use crate::proposal;

pub const STAGE: &str = "bulk_translation";

/// Snapshot key for a translated state.
pub fn snapshot_id(language: Language) -> String {
    format!("translated_{language}")
}

fn schema() -> Value {
    json!({
        "type": "object",
        "description": "the full résumé object with every text field translated",
        "properties": {
            "full_name": { "type": "string" },
            "profile": { "type": "string" },
            "work_experience": { "type": "array" },
            "education": { "type": "array" },
            "languages": { "type": "array" }
        },
        "required": ["work_experience", "education"]
    })
}

/// Structure must survive translation: same section counts, same bullet
/// counts, contacts unchanged.
fn check(source: &CvData) -> impl Fn(&CvData) -> Vec<String> + '_ {
    move |translated| {
        let mut violations = Vec::new();
        if translated.work_experience.len() != source.work_experience.len() {
            violations.push(format!(
                "work_experience has {} roles, input has {}",
                translated.work_experience.len(),
                source.work_experience.len()
            ));
        }
        for (i, (ours, theirs)) in source
            .work_experience
            .iter()
            .zip(&translated.work_experience)
            .enumerate()
        {
            if ours.bullets.len() != theirs.bullets.len() {
                violations.push(format!(
                    "work_experience[{i}] bullet count changed from {} to {}",
                    ours.bullets.len(),
                    theirs.bullets.len()
                ));
            }
        }
        if translated.education.len() != source.education.len() {
            violations.push(format!(
                "education has {} entries, input has {}",
                translated.education.len(),
                source.education.len()
            ));
        }
        if translated.email != source.email {
            violations.push("email must not change in translation".to_owned());
        }
        violations
    }
}

/// Translate the active state into `target`, installing the result as the
/// active snapshot. Returns the snapshot id.
pub async fn run(
    caller: &StageCaller,
    record: &mut SessionRecord,
    target: Language,
) -> Result<String> {
    let source = record.cv_data.clone();
    let source_signature = signature::cv_signature(&source);
    let snapshot = snapshot_id(target);
    let key = proposal::cache_key(STAGE, &source_signature, target.as_str());

    // Snapshot already produced from this exact source: flip, don't call.
    if record.metadata.proposal_cache.contains_key(&key)
        && record.metadata.cv_state_snapshots.contains_key(&snapshot)
    {
        tracing::debug!(%snapshot, "translation cache hit");
        record.snapshot_if_absent(SNAPSHOT_ORIGINAL);
        record.activate_snapshot(&snapshot)?;
        return Ok(snapshot);
    }

    let payload = serde_json::to_string(&source)?;
    let out = caller
        .call_stage::<CvData, _>(
            StageCall {
                stage: STAGE.into(),
                stage_prompt: prompts::with_language(prompts::BULK_TRANSLATION, target),
                payload,
                schema: schema(),
            },
            check(&source),
        )
        .await?;

    let mut translated = out.value;
    translated.language = target;
    // Contact details and the photo never pass through the model unchanged
    // reliably; carry them over from the source.
    translated.email = source.email.clone();
    translated.phone = source.phone.clone();
    translated.photo_url = source.photo_url.clone();

    record.snapshot_if_absent(SNAPSHOT_ORIGINAL);
    // A re-translation over an edited source supersedes the derived
    // snapshot; only `original` is immutable user state.
    record.metadata.cv_state_snapshots.remove(&snapshot);
    record.install_snapshot(&snapshot, translated)?;
    record.metadata.source_language = Some(source.language);
    record.metadata.target_language = Some(target);
    record
        .metadata
        .proposal_cache
        .insert(key, json!({ "snapshot": snapshot }));
    record.push_provenance(out.provenance);

    Ok(snapshot)
}
