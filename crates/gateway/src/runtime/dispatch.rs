//! Action dispatcher — the wizard FSM.
//!
//! Every session mutation flows through [`dispatch`]: the action is gated
//! against the current stage, routed to its handler through an explicit
//! match (no reflection, no tool recursion), and the transition is recorded
//! in the event log. Handlers mutate the in-memory record; the entry point
//! persists it once at turn end.

use serde::Serialize;
use serde_json::{json, Value};

use chrono::Utc;
use cvt_domain::action::ActionId;
use cvt_domain::cv::Language;
use cvt_domain::error::{Error, Result};
use cvt_domain::session::SessionRecord;
use cvt_domain::trace::TraceEvent;
use cvt_domain::WizardStage;
use cvt_stages::{
    correction, cover_letter, education, further, job_posting, proposal, skills, translate, work,
};
use cvt_validator::ValidationIssue;

use crate::runtime::readiness;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One action the client may offer next.
#[derive(Debug, Clone, Serialize)]
pub struct UiAction {
    pub name: String,
    pub args: Value,
}

impl UiAction {
    fn new(action: ActionId) -> Self {
        Self {
            name: action.as_wire().to_owned(),
            args: Value::Object(serde_json::Map::new()),
        }
    }
}

/// What a dispatched action produced.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_text: Option<String>,
    pub result: Value,
    pub stage: WizardStage,
    pub next_ui_actions: Vec<UiAction>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dispatch one action against an existing session.
pub async fn dispatch(
    state: &AppState,
    record: &mut SessionRecord,
    action: ActionId,
    payload: &Value,
) -> Result<DispatchOutcome> {
    let stage_before = record.metadata.stage;

    // Bootstrap is idempotent: it never runs against an existing session.
    if action == ActionId::ExtractAndStoreCv {
        record.push_event(cvt_domain::session::EventLogEntry {
            ts: Utc::now(),
            action_id: action.as_wire().to_owned(),
            stage_before,
            stage_after: stage_before,
            result: "rejected".into(),
        });
        return Err(Error::StageViolation {
            action: action.as_wire().to_owned(),
            stage: "session already exists".into(),
        });
    }

    if !action.permitted_in(stage_before) {
        record.push_event(cvt_domain::session::EventLogEntry {
            ts: Utc::now(),
            action_id: action.as_wire().to_owned(),
            stage_before,
            stage_after: stage_before,
            result: "rejected".into(),
        });
        return Err(Error::StageViolation {
            action: action.as_wire().to_owned(),
            stage: stage_before.as_str().to_owned(),
        });
    }

    let (result, assistant_text, stage_after) = run_handler(state, record, action, payload).await?;

    record.record_transition(action.as_wire(), stage_after, "ok", Utc::now());
    TraceEvent::StageTransition {
        session_id: record.session_id.to_string(),
        action_id: action.as_wire().to_owned(),
        stage_before: stage_before.as_str().to_owned(),
        stage_after: stage_after.as_str().to_owned(),
        result: "ok".into(),
    }
    .emit();

    Ok(DispatchOutcome {
        assistant_text,
        result,
        stage: stage_after,
        next_ui_actions: next_ui_actions(record, stage_after),
    })
}

/// The explicit action → handler map.
async fn run_handler(
    state: &AppState,
    record: &mut SessionRecord,
    action: ActionId,
    payload: &Value,
) -> Result<(Value, Option<String>, WizardStage)> {
    match action {
        ActionId::ExtractAndStoreCv => unreachable!("rejected before routing"),

        // ── Navigation ─────────────────────────────────────────────
        ActionId::WizardGotoStage => goto_stage(record, payload),

        // ── Language & translation ─────────────────────────────────
        ActionId::LanguageSelect => {
            let raw = payload
                .get("target_language")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let target = Language::parse(raw).ok_or_else(|| Error::ValidationFailed {
                summary: format!("unsupported language \"{raw}\""),
                details: json!([{ "field_path": "target_language" }]),
            })?;
            record.metadata.target_language = Some(target);
            record.metadata.source_language = Some(record.cv_data.language);
            record.metadata.confirmed_flags.language_confirmed = true;

            // Same language: translation has nothing to do.
            let next = if target == record.cv_data.language {
                WizardStage::Contact
            } else {
                WizardStage::BulkTranslation
            };
            Ok((
                json!({ "target_language": target }),
                Some(format!("Target language set to {target}.")),
                next,
            ))
        }
        ActionId::TranslateRun => {
            let target = record.metadata.target_language.ok_or_else(|| {
                Error::ValidationFailed {
                    summary: "select a target language first".into(),
                    details: json!([{ "field_path": "metadata.target_language" }]),
                }
            })?;
            let snapshot = translate::run(&state.caller, record, target).await?;
            Ok((
                json!({ "snapshot": snapshot, "active_state_id": record.metadata.active_state_id }),
                Some("Translation ready for review.".into()),
                WizardStage::BulkTranslation,
            ))
        }
        ActionId::TranslateAccept => Ok((
            json!({ "active_state_id": record.metadata.active_state_id }),
            None,
            WizardStage::Contact,
        )),

        // ── Contact ────────────────────────────────────────────────
        ActionId::ContactUpdate => {
            let applied = apply_edits(record, payload)?;
            Ok((
                json!({ "updated": applied }),
                None,
                WizardStage::Contact,
            ))
        }
        ActionId::ContactConfirm => {
            merge_prefill_contact(record);
            record.metadata.confirmed_flags.contact_confirmed = true;
            Ok((
                json!({ "contact_confirmed": true }),
                None,
                WizardStage::Education,
            ))
        }

        // ── Education ──────────────────────────────────────────────
        ActionId::EducationUpdate => {
            let applied = apply_edits(record, payload)?;
            Ok((
                json!({ "updated": applied }),
                None,
                WizardStage::Education,
            ))
        }
        ActionId::EducationTranslate => {
            let target = record.metadata.target_language.ok_or_else(|| {
                Error::ValidationFailed {
                    summary: "select a target language first".into(),
                    details: json!([{ "field_path": "metadata.target_language" }]),
                }
            })?;
            let translated = education::run(&state.caller, record, target).await?;
            Ok((
                serde_json::to_value(&translated)?,
                Some("Translated education entries ready for review.".into()),
                WizardStage::Education,
            ))
        }
        ActionId::EducationConfirm => {
            // A previewed translation is committed by the confirmation.
            if proposal::preview_payload(record, WizardStage::Education).is_ok() {
                education::accept(record)?;
            }
            record.metadata.confirmed_flags.education_confirmed = true;
            Ok((
                json!({ "education_confirmed": true }),
                None,
                WizardStage::JobPosting,
            ))
        }

        // ── Job posting ────────────────────────────────────────────
        ActionId::JobPostingExtract => {
            let posting = payload
                .get("posting_text")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let summary = job_posting::run(&state.caller, record, posting).await?;
            Ok((
                serde_json::to_value(&summary)?,
                Some(format!(
                    "Extracted the posting for \"{}\".",
                    summary.role_title
                )),
                WizardStage::WorkExperience,
            ))
        }

        // ── Work experience ────────────────────────────────────────
        ActionId::WorkTailorRun => {
            let notes = str_field(payload, "user_notes");
            let feedback = str_field(payload, "user_feedback");
            let proposal = work::run(&state.caller, record, notes, feedback).await?;
            Ok((
                serde_json::to_value(&proposal)?,
                Some("Tailored work experience ready for review.".into()),
                WizardStage::WorkExperience,
            ))
        }
        ActionId::WorkTailorAccept => {
            let roles = work::accept(record)?;
            Ok((
                json!({ "work_experience": roles }),
                None,
                WizardStage::FurtherExperience,
            ))
        }
        ActionId::WorkTailorEdit => {
            let applied = apply_edits(record, payload)?;
            // A manual edit may break a hard limit; fix via the compact
            // correction path rather than bouncing the whole proposal.
            let report = cvt_validator::validate(&record.cv_data);
            let work_issues: Vec<ValidationIssue> = report
                .errors
                .iter()
                .filter(|e| e.field_path.starts_with("work_experience["))
                .cloned()
                .collect();
            let corrected = if work_issues.is_empty() {
                0
            } else {
                correction::correct_work_roles(&state.caller, record, &work_issues).await?
            };
            Ok((
                json!({ "updated": applied, "corrected_roles": corrected }),
                None,
                WizardStage::WorkExperience,
            ))
        }

        // ── Further experience ─────────────────────────────────────
        ActionId::FurtherRun => {
            let notes = str_field(payload, "user_notes");
            let proposal = further::run(&state.caller, record, notes).await?;
            Ok((
                serde_json::to_value(&proposal)?,
                None,
                WizardStage::FurtherExperience,
            ))
        }
        ActionId::FurtherAccept => {
            let projects = further::accept(record)?;
            Ok((
                json!({ "further_experience": projects }),
                None,
                WizardStage::Skills,
            ))
        }

        // ── Skills ─────────────────────────────────────────────────
        ActionId::SkillsRun => {
            let notes = str_field(payload, "user_notes");
            let proposal = skills::run(&state.caller, record, notes).await?;
            Ok((
                serde_json::to_value(&proposal)?,
                None,
                WizardStage::Skills,
            ))
        }
        ActionId::SkillsAccept => {
            let committed = skills::accept(record)?;
            Ok((
                serde_json::to_value(&committed)?,
                None,
                WizardStage::ReviewFinal,
            ))
        }

        // ── Review & cover letter ──────────────────────────────────
        ActionId::ReviewValidate => {
            let report = cvt_validator::validate(&record.cv_data);
            let gate = readiness::evaluate(record, &report);
            let text = if gate.can_generate {
                "Everything checks out — the CV is ready to generate.".to_owned()
            } else {
                format!("Not ready yet: {}.", gate.missing.join(", "))
            };
            Ok((
                json!({ "validation": report, "readiness": gate }),
                Some(text),
                WizardStage::ReviewFinal,
            ))
        }
        ActionId::CoverLetterRun => {
            let notes = str_field(payload, "user_notes");
            let letter = cover_letter::run(&state.caller, record, notes).await?;
            Ok((
                serde_json::to_value(&letter)?,
                Some("Cover letter drafted.".into()),
                WizardStage::CoverLetter,
            ))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn str_field<'a>(payload: &'a Value, name: &str) -> &'a str {
    payload.get(name).and_then(Value::as_str).unwrap_or_default()
}

/// Accepts `{ path, value }` or `{ edits: [{ path, value }, ...] }` and
/// applies each to the canonical object. The stateless-turn contract: user
/// content is persisted in the same turn it arrives.
pub fn apply_edits(record: &mut SessionRecord, payload: &Value) -> Result<usize> {
    let edits: Vec<(String, Value)> = if let Some(list) = payload.get("edits").and_then(Value::as_array) {
        list.iter()
            .map(|edit| {
                let path = edit
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::ValidationFailed {
                        summary: "edit missing \"path\"".into(),
                        details: json!([]),
                    })?;
                Ok((path.to_owned(), edit.get("value").cloned().unwrap_or(Value::Null)))
            })
            .collect::<Result<_>>()?
    } else if let Some(path) = payload.get("path").and_then(Value::as_str) {
        vec![(
            path.to_owned(),
            payload.get("value").cloned().unwrap_or(Value::Null),
        )]
    } else {
        return Err(Error::ValidationFailed {
            summary: "payload carries neither \"path\" nor \"edits\"".into(),
            details: json!([]),
        });
    };

    let count = edits.len();
    for (path, value) in edits {
        super::paths::apply_update(&mut record.cv_data, &path, value)?;
    }
    Ok(count)
}

/// On confirmation — and only then — copy still-empty contact fields over
/// from the document prefill.
fn merge_prefill_contact(record: &mut SessionRecord) {
    let Some(prefill) = record.metadata.docx_prefill_unconfirmed.clone() else {
        return;
    };
    let cv = &mut record.cv_data;
    for (field, slot) in [
        ("full_name", &mut cv.full_name),
        ("email", &mut cv.email),
        ("phone", &mut cv.phone),
    ] {
        if slot.is_empty() {
            if let Some(value) = prefill.get(field).and_then(Value::as_str) {
                *slot = value.to_owned();
            }
        }
    }
}

/// Back-navigation: target must be a visited stage (or a declared jump);
/// an optional `state_id` flips the active snapshot — nothing is lost,
/// snapshots are immutable.
fn goto_stage(
    record: &mut SessionRecord,
    payload: &Value,
) -> Result<(Value, Option<String>, WizardStage)> {
    let raw = payload
        .get("stage")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let target: WizardStage = serde_json::from_value(Value::String(raw.to_owned()))
        .map_err(|_| Error::ValidationFailed {
            summary: format!("unknown stage \"{raw}\""),
            details: json!([{ "field_path": "stage" }]),
        })?;

    let visited = record.metadata.stage_history.contains(&target);
    if !visited && !record.metadata.stage.can_jump_to(target) {
        return Err(Error::StageViolation {
            action: ActionId::WizardGotoStage.as_wire().to_owned(),
            stage: format!("{} -> {target} not permitted", record.metadata.stage),
        });
    }

    if let Some(state_id) = payload.get("state_id").and_then(Value::as_str) {
        record.activate_snapshot(state_id)?;
    }

    // A previously accepted proposal for the target family drops back to
    // preview so the user re-confirms against the restored state.
    if let Some(pending) = record
        .metadata
        .pending_proposals
        .get_mut(target.as_str())
    {
        pending.phase = cvt_domain::session::ProposalPhase::Preview;
    }

    Ok((
        json!({
            "stage": target,
            "active_state_id": record.metadata.active_state_id,
        }),
        None,
        target,
    ))
}

/// The actions the client should offer from a stage.
fn next_ui_actions(record: &SessionRecord, stage: WizardStage) -> Vec<UiAction> {
    let mut actions: Vec<UiAction> = match stage {
        WizardStage::LanguageSelection => vec![UiAction::new(ActionId::LanguageSelect)],
        WizardStage::BulkTranslation => vec![
            UiAction::new(ActionId::TranslateRun),
            UiAction::new(ActionId::TranslateAccept),
        ],
        WizardStage::Contact => vec![
            UiAction::new(ActionId::ContactUpdate),
            UiAction::new(ActionId::ContactConfirm),
        ],
        WizardStage::Education => vec![
            UiAction::new(ActionId::EducationUpdate),
            UiAction::new(ActionId::EducationTranslate),
            UiAction::new(ActionId::EducationConfirm),
        ],
        WizardStage::JobPosting => vec![UiAction::new(ActionId::JobPostingExtract)],
        WizardStage::WorkExperience => vec![
            UiAction::new(ActionId::WorkTailorRun),
            UiAction::new(ActionId::WorkTailorAccept),
            UiAction::new(ActionId::WorkTailorEdit),
        ],
        WizardStage::FurtherExperience => vec![
            UiAction::new(ActionId::FurtherRun),
            UiAction::new(ActionId::FurtherAccept),
        ],
        WizardStage::Skills => vec![
            UiAction::new(ActionId::SkillsRun),
            UiAction::new(ActionId::SkillsAccept),
        ],
        WizardStage::ReviewFinal => vec![UiAction::new(ActionId::ReviewValidate)],
        WizardStage::CoverLetter => vec![UiAction::new(ActionId::CoverLetterRun)],
    };
    // Navigation is always on the table once any stage has been visited.
    if record.metadata.stage_history.len() > 1 {
        actions.push(UiAction::new(ActionId::WizardGotoStage));
    }
    actions
}
