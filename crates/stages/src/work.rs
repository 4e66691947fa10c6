//! Work-experience tailoring stage.
//!
//! Builds the tailoring payload from the job summary, the candidate profile,
//! the current roles, and the user's notes/feedback; the proposal must stay
//! inside the counts (3–4 roles, 2–4 bullets each, 8–12 bullets total) and
//! may not invent employers, date ranges, or metrics. Accepting is a
//! replace-all of `cv_data.work_experience`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use cvt_domain::cv::WorkRole;
use cvt_domain::error::{Error, Result};
use cvt_domain::session::SessionRecord;
use cvt_domain::signature;
use cvt_domain::WizardStage;
use cvt_providers::{sanitize_text, StageCall, StageCaller};
use cvt_validator::limits::MAX_BULLET_LEN;

use crate::guards::{check_no_new_metrics, check_no_new_names, InputCorpus};
use crate::job_posting;
use crate::prompts;
use crate::proposal;

pub const STAGE: &str = "work_experience";

pub const MIN_ROLES: usize = 3;
pub const MAX_ROLES: usize = 4;
pub const MIN_BULLETS_PER_ROLE: usize = 2;
pub const MAX_BULLETS_PER_ROLE: usize = 4;
pub const MIN_TOTAL_BULLETS: usize = 8;
pub const MAX_TOTAL_BULLETS: usize = 12;

/// The tailoring proposal: a full replacement list of roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkProposal {
    #[serde(default)]
    pub roles: Vec<WorkRole>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "roles": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "date_range": { "type": "string" },
                        "employer": { "type": "string" },
                        "location": { "type": "string" },
                        "title": { "type": "string" },
                        "bullets": {
                            "type": "array",
                            "items": { "type": "string", "maxLength": MAX_BULLET_LEN }
                        }
                    },
                    "required": ["date_range", "employer", "title", "bullets"]
                }
            }
        },
        "required": ["roles"]
    })
}

/// Count and grounding rules. `input_roles` is the candidate's current role
/// count; with a sparse history the lower bounds scale down to what is
/// actually achievable without inventing anything.
fn check(corpus: &InputCorpus, input_roles: usize) -> impl Fn(&WorkProposal) -> Vec<String> + '_ {
    move |p| {
        let mut violations = Vec::new();

        let min_roles = MIN_ROLES.min(input_roles.max(1));
        if p.roles.len() < min_roles || p.roles.len() > MAX_ROLES {
            violations.push(format!(
                "proposal has {} roles, expected {min_roles}–{MAX_ROLES}",
                p.roles.len()
            ));
        }

        let mut total_bullets = 0;
        for (i, role) in p.roles.iter().enumerate() {
            total_bullets += role.bullets.len();
            if role.bullets.len() < MIN_BULLETS_PER_ROLE
                || role.bullets.len() > MAX_BULLETS_PER_ROLE
            {
                violations.push(format!(
                    "roles[{i}] has {} bullets, expected {MIN_BULLETS_PER_ROLE}–{MAX_BULLETS_PER_ROLE}",
                    role.bullets.len()
                ));
            }
            for (j, bullet) in role.bullets.iter().enumerate() {
                let len = bullet.chars().count();
                if len > MAX_BULLET_LEN {
                    violations.push(format!(
                        "roles[{i}].bullets[{j}] is {len} chars, hard limit {MAX_BULLET_LEN}"
                    ));
                }
            }
        }
        if input_roles >= MIN_ROLES
            && (total_bullets < MIN_TOTAL_BULLETS || total_bullets > MAX_TOTAL_BULLETS)
        {
            violations.push(format!(
                "proposal has {total_bullets} bullets in total, expected {MIN_TOTAL_BULLETS}–{MAX_TOTAL_BULLETS}"
            ));
        }

        violations.extend(check_no_new_names(
            corpus,
            p.roles.iter().map(|r| r.employer.as_str()),
            "employer",
        ));
        violations.extend(check_no_new_names(
            corpus,
            p.roles.iter().map(|r| r.date_range.as_str()),
            "date range",
        ));
        violations.extend(check_no_new_metrics(
            corpus,
            p.roles
                .iter()
                .flat_map(|r| r.bullets.iter().map(String::as_str)),
        ));

        violations
    }
}

/// Run tailoring and park the result in preview.
///
/// Cached by `(job_signature, base_cv_signature)` — repeating the run over
/// unchanged inputs re-serves the same proposal.
pub async fn run(
    caller: &StageCaller,
    record: &mut SessionRecord,
    user_notes: &str,
    user_feedback: &str,
) -> Result<WorkProposal> {
    let Some(summary) = job_posting::stored_summary(record) else {
        return Err(Error::ValidationFailed {
            summary: "no job posting extracted yet".into(),
            details: json!([{ "field_path": "metadata.job_summary" }]),
        });
    };
    let job_signature = record
        .metadata
        .job_signature
        .clone()
        .unwrap_or_default();
    let base_signature = signature::cv_signature(&record.cv_data);
    let key = proposal::cache_key(STAGE, &job_signature, &base_signature);

    if let Some(cached) = record.metadata.proposal_cache.get(&key) {
        if let Ok(proposal_value) = serde_json::from_value::<WorkProposal>(cached.clone()) {
            tracing::debug!("work tailoring cache hit");
            proposal::set_preview(record, WizardStage::WorkExperience, cached.clone());
            return Ok(proposal_value);
        }
    }

    let notes = sanitize_text(user_notes);
    let feedback = sanitize_text(user_feedback);
    let current_work = serde_json::to_string(&record.cv_data.work_experience)?;

    // Grounding corpus: candidate materials only. The posting is an input to
    // the call, but employers, dates, and metrics must come from the
    // candidate side.
    let corpus = InputCorpus::new([
        current_work.as_str(),
        record.cv_data.profile.as_str(),
        notes.as_str(),
        feedback.as_str(),
    ]);
    let input_roles = record.cv_data.work_experience.len();

    let payload = json!({
        "job_summary": summary,
        "profile": record.cv_data.profile,
        "target_role": record.cv_data.target_role,
        "user_notes": notes,
        "user_feedback": feedback,
        "current_work_experience": record.cv_data.work_experience,
    })
    .to_string();

    let target = record
        .metadata
        .target_language
        .unwrap_or(record.cv_data.language);
    let out = caller
        .call_stage::<WorkProposal, _>(
            StageCall {
                stage: STAGE.into(),
                stage_prompt: prompts::with_language(prompts::WORK_EXPERIENCE, target),
                payload,
                schema: schema(),
            },
            check(&corpus, input_roles),
        )
        .await?;

    let proposal_value = serde_json::to_value(&out.value)?;
    record
        .metadata
        .proposal_cache
        .insert(key, proposal_value.clone());
    proposal::set_preview(record, WizardStage::WorkExperience, proposal_value);
    record.push_provenance(out.provenance);

    Ok(out.value)
}

/// Commit the previewed proposal: replace-all of the work section.
pub fn accept(record: &mut SessionRecord) -> Result<Vec<WorkRole>> {
    let payload = proposal::preview_payload(record, WizardStage::WorkExperience)?;
    let proposal_value: WorkProposal = serde_json::from_value(payload)?;
    record.cv_data.work_experience = proposal_value.roles.clone();
    proposal::mark_accepted(record, WizardStage::WorkExperience);
    Ok(proposal_value.roles)
}
