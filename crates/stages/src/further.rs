//! Further-experience stage.
//!
//! Condenses projects, volunteering, and side work into at most 3 entries.
//! Accept is a replace-all, the same commit semantics as work experience.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use cvt_domain::cv::Project;
use cvt_domain::error::Result;
use cvt_domain::session::SessionRecord;
use cvt_domain::signature;
use cvt_domain::WizardStage;
use cvt_providers::{sanitize_text, StageCall, StageCaller};
use cvt_validator::limits::{MAX_BULLET_LEN, MAX_FURTHER_PROJECTS, MAX_PROJECT_BULLETS};

use crate::guards::{check_no_new_names, InputCorpus};
use crate::prompts;
use crate::proposal;

pub const STAGE: &str = "further_experience";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FurtherProposal {
    #[serde(default)]
    pub projects: Vec<Project>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "projects": {
                "type": "array",
                "maxItems": MAX_FURTHER_PROJECTS,
                "items": {
                    "type": "object",
                    "properties": {
                        "date_range": { "type": "string" },
                        "organization": { "type": "string" },
                        "title": { "type": "string" },
                        "bullets": {
                            "type": "array",
                            "maxItems": MAX_PROJECT_BULLETS,
                            "items": { "type": "string", "maxLength": MAX_BULLET_LEN }
                        }
                    },
                    "required": ["organization", "title"]
                }
            }
        },
        "required": ["projects"]
    })
}

fn check(corpus: &InputCorpus) -> impl Fn(&FurtherProposal) -> Vec<String> + '_ {
    move |p| {
        let mut violations = Vec::new();
        if p.projects.len() > MAX_FURTHER_PROJECTS {
            violations.push(format!(
                "proposal has {} projects, limit {MAX_FURTHER_PROJECTS}",
                p.projects.len()
            ));
        }
        for (i, project) in p.projects.iter().enumerate() {
            if project.bullets.len() > MAX_PROJECT_BULLETS {
                violations.push(format!(
                    "projects[{i}] has {} bullets, limit {MAX_PROJECT_BULLETS}",
                    project.bullets.len()
                ));
            }
            for (j, bullet) in project.bullets.iter().enumerate() {
                let len = bullet.chars().count();
                if len > MAX_BULLET_LEN {
                    violations.push(format!(
                        "projects[{i}].bullets[{j}] is {len} chars, hard limit {MAX_BULLET_LEN}"
                    ));
                }
            }
        }
        violations.extend(check_no_new_names(
            corpus,
            p.projects.iter().map(|pr| pr.organization.as_str()),
            "organization",
        ));
        violations
    }
}

/// Run the condensing call and park the result in preview.
pub async fn run(
    caller: &StageCaller,
    record: &mut SessionRecord,
    user_notes: &str,
) -> Result<FurtherProposal> {
    let job_signature = record
        .metadata
        .job_signature
        .clone()
        .unwrap_or_else(|| "-".into());
    let base_signature = signature::cv_signature(&record.cv_data);
    let key = proposal::cache_key(STAGE, &job_signature, &base_signature);

    if let Some(cached) = record.metadata.proposal_cache.get(&key) {
        if let Ok(cached_proposal) = serde_json::from_value::<FurtherProposal>(cached.clone()) {
            proposal::set_preview(record, WizardStage::FurtherExperience, cached.clone());
            return Ok(cached_proposal);
        }
    }

    let notes = sanitize_text(user_notes);
    let current = serde_json::to_string(&record.cv_data.further_experience)?;
    let corpus = InputCorpus::new([
        current.as_str(),
        record.cv_data.profile.as_str(),
        notes.as_str(),
    ]);

    let payload = json!({
        "current_further_experience": record.cv_data.further_experience,
        "profile": record.cv_data.profile,
        "job_summary": record.metadata.job_summary,
        "user_notes": notes,
    })
    .to_string();

    let target = record
        .metadata
        .target_language
        .unwrap_or(record.cv_data.language);
    let out = caller
        .call_stage::<FurtherProposal, _>(
            StageCall {
                stage: STAGE.into(),
                stage_prompt: prompts::with_language(prompts::FURTHER_EXPERIENCE, target),
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
    proposal::set_preview(record, WizardStage::FurtherExperience, proposal_value);
    record.push_provenance(out.provenance);

    Ok(out.value)
}

/// Commit the previewed projects: replace-all of the section.
pub fn accept(record: &mut SessionRecord) -> Result<Vec<Project>> {
    let payload = proposal::preview_payload(record, WizardStage::FurtherExperience)?;
    let proposal_value: FurtherProposal = serde_json::from_value(payload)?;
    record.cv_data.further_experience = proposal_value.projects.clone();
    proposal::mark_accepted(record, WizardStage::FurtherExperience);
    Ok(proposal_value.projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cvt_domain::config::LlmConfig;
    use cvt_providers::MockProvider;
    use std::sync::Arc;

    #[tokio::test]
    async fn accept_replaces_all_projects() {
        let mut record = SessionRecord::bootstrap(24, Utc::now());
        record.cv_data.further_experience = vec![
            Project {
                date_range: None,
                organization: "Chess Club".into(),
                title: "Treasurer".into(),
                bullets: vec![],
            },
            Project {
                date_range: None,
                organization: "Food Bank".into(),
                title: "Volunteer".into(),
                bullets: vec![],
            },
        ];

        let mock = Arc::new(MockProvider::new());
        mock.stage_fixture(
            STAGE,
            json!({ "projects": [
                { "organization": "Food Bank", "title": "Volunteer",
                  "bullets": ["Coordinated weekend logistics"] }
            ]}),
        );
        let caller = StageCaller::new(mock, LlmConfig::default());

        run(&caller, &mut record, "").await.unwrap();
        accept(&mut record).unwrap();
        assert_eq!(record.cv_data.further_experience.len(), 1);
        assert_eq!(record.cv_data.further_experience[0].organization, "Food Bank");
    }

    #[tokio::test]
    async fn invented_organization_is_rejected() {
        let mut record = SessionRecord::bootstrap(24, Utc::now());
        record.cv_data.profile = "Volunteer at the Food Bank.".into();
        let mock = Arc::new(MockProvider::new());
        mock.stage_fixture(
            STAGE,
            json!({ "projects": [
                { "organization": "NASA", "title": "Consultant", "bullets": [] }
            ]}),
        );
        let caller = StageCaller::new(mock, LlmConfig::default());

        let err = run(&caller, &mut record, "").await.unwrap_err();
        assert_eq!(err.kind(), "llm_invalid");
    }
}
