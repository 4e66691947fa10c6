//! Skills unification stage.
//!
//! One call produces both skill lists: `it_ai_skills` and
//! `technical_operational_skills`, 5–8 entries each, disjoint, grounded in
//! the candidate's materials.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use cvt_domain::error::Result;
use cvt_domain::session::SessionRecord;
use cvt_domain::signature;
use cvt_domain::WizardStage;
use cvt_providers::{sanitize_text, StageCall, StageCaller};
use cvt_validator::limits::{MAX_SKILLS, MAX_SKILL_LEN, MIN_SKILLS};

use crate::guards::{check_no_new_tools, InputCorpus};
use crate::prompts;
use crate::proposal;

pub const STAGE: &str = "skills";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SkillsProposal {
    #[serde(default)]
    pub it_ai_skills: Vec<String>,
    #[serde(default)]
    pub technical_operational_skills: Vec<String>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "it_ai_skills": {
                "type": "array",
                "items": { "type": "string", "maxLength": MAX_SKILL_LEN },
                "minItems": MIN_SKILLS,
                "maxItems": MAX_SKILLS
            },
            "technical_operational_skills": {
                "type": "array",
                "items": { "type": "string", "maxLength": MAX_SKILL_LEN },
                "minItems": MIN_SKILLS,
                "maxItems": MAX_SKILLS
            }
        },
        "required": ["it_ai_skills", "technical_operational_skills"]
    })
}

fn check(corpus: &InputCorpus) -> impl Fn(&SkillsProposal) -> Vec<String> + '_ {
    move |p| {
        let mut violations = Vec::new();

        for (name, list) in [
            ("it_ai_skills", &p.it_ai_skills),
            ("technical_operational_skills", &p.technical_operational_skills),
        ] {
            if list.len() < MIN_SKILLS || list.len() > MAX_SKILLS {
                violations.push(format!(
                    "{name} has {} items, expected {MIN_SKILLS}–{MAX_SKILLS}",
                    list.len()
                ));
            }
            for (i, skill) in list.iter().enumerate() {
                let len = skill.chars().count();
                if len > MAX_SKILL_LEN {
                    violations.push(format!(
                        "{name}[{i}] is {len} chars, limit {MAX_SKILL_LEN}"
                    ));
                }
            }
        }

        // The two lists must not share entries (case-insensitive).
        let it_set: HashSet<String> =
            p.it_ai_skills.iter().map(|s| s.to_lowercase()).collect();
        for skill in &p.technical_operational_skills {
            if it_set.contains(&skill.to_lowercase()) {
                violations.push(format!("\"{skill}\" appears in both skill lists"));
            }
        }

        violations.extend(check_no_new_tools(
            corpus,
            p.it_ai_skills
                .iter()
                .chain(&p.technical_operational_skills)
                .map(String::as_str),
        ));

        violations
    }
}

/// Run unification over everything the candidate has stated and park the
/// result in preview.
pub async fn run(
    caller: &StageCaller,
    record: &mut SessionRecord,
    user_notes: &str,
) -> Result<SkillsProposal> {
    let job_signature = record
        .metadata
        .job_signature
        .clone()
        .unwrap_or_else(|| "-".into());
    let base_signature = signature::cv_signature(&record.cv_data);
    let key = proposal::cache_key(STAGE, &job_signature, &base_signature);

    if let Some(cached) = record.metadata.proposal_cache.get(&key) {
        if let Ok(cached_proposal) = serde_json::from_value::<SkillsProposal>(cached.clone()) {
            tracing::debug!("skills cache hit");
            proposal::set_preview(record, WizardStage::Skills, cached.clone());
            return Ok(cached_proposal);
        }
    }

    let notes = sanitize_text(user_notes);
    let work_text = serde_json::to_string(&record.cv_data.work_experience)?;
    let prefill_text = record
        .metadata
        .docx_prefill_unconfirmed
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_default();

    let corpus = InputCorpus::new([
        record.cv_data.it_ai_skills.join("\n").as_str(),
        record
            .cv_data
            .technical_operational_skills
            .join("\n")
            .as_str(),
        record.cv_data.profile.as_str(),
        work_text.as_str(),
        prefill_text.as_str(),
        notes.as_str(),
    ]);

    let payload = json!({
        "current_it_ai_skills": record.cv_data.it_ai_skills,
        "current_technical_operational_skills": record.cv_data.technical_operational_skills,
        "profile": record.cv_data.profile,
        "work_experience": record.cv_data.work_experience,
        "job_summary": record.metadata.job_summary,
        "user_notes": notes,
    })
    .to_string();

    let target = record
        .metadata
        .target_language
        .unwrap_or(record.cv_data.language);
    let out = caller
        .call_stage::<SkillsProposal, _>(
            StageCall {
                stage: STAGE.into(),
                stage_prompt: prompts::with_language(prompts::SKILLS, target),
                payload,
                schema: schema(),
            },
            check(&corpus),
        )
        .await?;

    let proposal_value = serde_json::to_value(&out.value)?;
    record
        .metadata
        .proposal_cache
        .insert(key, proposal_value.clone());
    proposal::set_preview(record, WizardStage::Skills, proposal_value);
    record.push_provenance(out.provenance);

    Ok(out.value)
}

/// Commit the previewed skill lists.
pub fn accept(record: &mut SessionRecord) -> Result<SkillsProposal> {
    let payload = proposal::preview_payload(record, WizardStage::Skills)?;
    let proposal_value: SkillsProposal = serde_json::from_value(payload)?;
    record.cv_data.it_ai_skills = proposal_value.it_ai_skills.clone();
    record.cv_data.technical_operational_skills =
        proposal_value.technical_operational_skills.clone();
    proposal::mark_accepted(record, WizardStage::Skills);
    Ok(proposal_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cvt_domain::config::LlmConfig;
    use cvt_providers::MockProvider;
    use std::sync::Arc;

    fn record_with_skills() -> SessionRecord {
        let mut record = SessionRecord::bootstrap(24, Utc::now());
        record.cv_data.profile =
            "Engineer using Python, SQL, Excel, SAP, Power BI, Jira, Git and Docker daily; \
             strong in process design, stakeholder management and forecasting."
                .into();
        record
    }

    fn valid_fixture() -> Value {
        json!({
            "it_ai_skills": ["Python", "SQL", "Excel", "Power BI", "Docker"],
            "technical_operational_skills":
                ["SAP", "Jira", "Git", "Process design", "Forecasting"]
        })
    }

    #[tokio::test]
    async fn unification_fills_both_lists() {
        let mut record = record_with_skills();
        let mock = Arc::new(MockProvider::new());
        mock.stage_fixture(STAGE, valid_fixture());
        let caller = StageCaller::new(mock, LlmConfig::default());

        run(&caller, &mut record, "").await.unwrap();
        let committed = accept(&mut record).unwrap();
        assert_eq!(committed.it_ai_skills.len(), 5);
        assert_eq!(record.cv_data.technical_operational_skills.len(), 5);
    }

    #[tokio::test]
    async fn duplicate_across_lists_is_a_violation() {
        let mut record = record_with_skills();
        let mock = Arc::new(MockProvider::new());
        mock.stage_fixture(
            STAGE,
            json!({
                "it_ai_skills": ["Python", "SQL", "Excel", "Power BI", "Docker"],
                "technical_operational_skills":
                    ["python", "Jira", "Git", "Process design", "Forecasting"]
            }),
        );
        let caller = StageCaller::new(mock.clone(), LlmConfig::default());

        let err = run(&caller, &mut record, "").await.unwrap_err();
        assert_eq!(err.kind(), "llm_invalid");
        assert_eq!(mock.call_count(Some(STAGE)), 2);
    }

    #[tokio::test]
    async fn unknown_tool_is_a_violation() {
        let mut record = record_with_skills();
        let mock = Arc::new(MockProvider::new());
        mock.stage_fixture(
            STAGE,
            json!({
                "it_ai_skills": ["Python", "SQL", "Excel", "Power BI", "Kubernetes"],
                "technical_operational_skills":
                    ["SAP", "Jira", "Git", "Process design", "Forecasting"]
            }),
        );
        let caller = StageCaller::new(mock.clone(), LlmConfig::default());

        let err = run(&caller, &mut record, "").await.unwrap_err();
        match err {
            cvt_domain::Error::LlmInvalid { details, .. } => {
                assert!(details.contains("Kubernetes"));
            }
            other => panic!("expected LlmInvalid, got {other:?}"),
        }
    }
}
