//! Education translation stage.
//!
//! Education entries are usually confirmed early and only need translating
//! when the target language differs. Entry count and ordering must survive;
//! institution names stay untranslated.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use cvt_domain::cv::{EducationEntry, Language};
use cvt_domain::error::Result;
use cvt_domain::session::SessionRecord;
use cvt_domain::WizardStage;
use cvt_providers::{StageCall, StageCaller};
use cvt_validator::limits::MAX_EDUCATION_DETAILS;

use crate::prompts;
use crate::proposal;

pub const STAGE: &str = "education";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EducationProposal {
    #[serde(default)]
    pub education: Vec<EducationEntry>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "education": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "date_range": { "type": "string" },
                        "institution": { "type": "string" },
                        "title": { "type": "string" },
                        "details": {
                            "type": "array",
                            "maxItems": MAX_EDUCATION_DETAILS,
                            "items": { "type": "string" }
                        }
                    },
                    "required": ["date_range", "institution", "title"]
                }
            }
        },
        "required": ["education"]
    })
}

fn check(source: &[EducationEntry]) -> impl Fn(&EducationProposal) -> Vec<String> + '_ {
    move |p| {
        let mut violations = Vec::new();
        if p.education.len() != source.len() {
            violations.push(format!(
                "education has {} entries, input has {}",
                p.education.len(),
                source.len()
            ));
            return violations;
        }
        for (i, (ours, theirs)) in source.iter().zip(&p.education).enumerate() {
            if ours.institution != theirs.institution {
                violations.push(format!(
                    "education[{i}].institution must stay \"{}\"",
                    ours.institution
                ));
            }
            if theirs.details.len() > MAX_EDUCATION_DETAILS {
                violations.push(format!(
                    "education[{i}] has {} details, limit {MAX_EDUCATION_DETAILS}",
                    theirs.details.len()
                ));
            }
        }
        violations
    }
}

/// Translate the education section into `target` and park it in preview.
pub async fn run(
    caller: &StageCaller,
    record: &mut SessionRecord,
    target: Language,
) -> Result<EducationProposal> {
    let source = record.cv_data.education.clone();
    let payload = json!({ "education": source }).to_string();

    let out = caller
        .call_stage::<EducationProposal, _>(
            StageCall {
                stage: STAGE.into(),
                stage_prompt: prompts::with_language(prompts::EDUCATION, target),
                payload,
                schema: schema(),
            },
            check(&source),
        )
        .await?;

    let proposal_value = serde_json::to_value(&out.value)?;
    proposal::set_preview(record, WizardStage::Education, proposal_value);
    record.push_provenance(out.provenance);

    Ok(out.value)
}

/// Commit the previewed translated entries.
pub fn accept(record: &mut SessionRecord) -> Result<Vec<EducationEntry>> {
    let payload = proposal::preview_payload(record, WizardStage::Education)?;
    let proposal_value: EducationProposal = serde_json::from_value(payload)?;
    record.cv_data.education = proposal_value.education.clone();
    proposal::mark_accepted(record, WizardStage::Education);
    Ok(proposal_value.education)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cvt_domain::config::LlmConfig;
    use cvt_providers::MockProvider;
    use std::sync::Arc;

    fn record_with_education() -> SessionRecord {
        let mut record = SessionRecord::bootstrap(24, Utc::now());
        record.cv_data.education = vec![EducationEntry {
            date_range: "2016–2020".into(),
            institution: "Politechnika Warszawska".into(),
            title: "Magister inżynier".into(),
            details: vec![],
        }];
        record
    }

    #[tokio::test]
    async fn translation_preserves_institution() {
        let mut record = record_with_education();
        let mock = Arc::new(MockProvider::new());
        mock.stage_fixture(
            STAGE,
            json!({ "education": [
                { "date_range": "2016–2020", "institution": "Politechnika Warszawska",
                  "title": "Master of Engineering", "details": [] }
            ]}),
        );
        let caller = StageCaller::new(mock, LlmConfig::default());

        run(&caller, &mut record, Language::En).await.unwrap();
        let entries = accept(&mut record).unwrap();
        assert_eq!(entries[0].title, "Master of Engineering");
        assert_eq!(entries[0].institution, "Politechnika Warszawska");
    }

    #[tokio::test]
    async fn renamed_institution_is_a_violation() {
        let mut record = record_with_education();
        let mock = Arc::new(MockProvider::new());
        mock.stage_fixture(
            STAGE,
            json!({ "education": [
                { "date_range": "2016–2020", "institution": "Warsaw University of Technology",
                  "title": "Master of Engineering", "details": [] }
            ]}),
        );
        let caller = StageCaller::new(mock, LlmConfig::default());

        let err = run(&caller, &mut record, Language::En).await.unwrap_err();
        assert_eq!(err.kind(), "llm_invalid");
    }
}
