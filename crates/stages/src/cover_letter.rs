//! Cover-letter stage.
//!
//! Produces the letter body the renderer lays out. Always regenerated — the
//! PDF path never short-circuits cover letters — so there is no proposal
//! cache here, only the guard that the letter claims nothing the résumé
//! cannot back.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use cvt_domain::error::{Error, Result};
use cvt_domain::session::SessionRecord;
use cvt_providers::{sanitize_text, StageCall, StageCaller};

use crate::guards::{check_no_posting_only_claims, InputCorpus};
use crate::job_posting;
use crate::prompts;

pub const STAGE: &str = "cover_letter";

pub const MIN_PARAGRAPHS: usize = 2;
pub const MAX_PARAGRAPHS: usize = 4;

/// The rendered letter content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CoverLetter {
    #[serde(default)]
    pub salutation: String,
    #[serde(default)]
    pub paragraphs: Vec<String>,
    #[serde(default)]
    pub closing: String,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "salutation": { "type": "string" },
            "paragraphs": {
                "type": "array",
                "minItems": MIN_PARAGRAPHS,
                "maxItems": MAX_PARAGRAPHS,
                "items": { "type": "string" }
            },
            "closing": { "type": "string" }
        },
        "required": ["salutation", "paragraphs", "closing"]
    })
}

fn check(posting_only_tools: &[String]) -> impl Fn(&CoverLetter) -> Vec<String> + '_ {
    move |letter| {
        let mut violations = Vec::new();
        if letter.paragraphs.len() < MIN_PARAGRAPHS || letter.paragraphs.len() > MAX_PARAGRAPHS {
            violations.push(format!(
                "letter has {} paragraphs, expected {MIN_PARAGRAPHS}–{MAX_PARAGRAPHS}",
                letter.paragraphs.len()
            ));
        }
        if letter.salutation.trim().is_empty() {
            violations.push("salutation must not be empty".to_owned());
        }
        violations.extend(check_no_posting_only_claims(
            letter.paragraphs.iter().map(String::as_str),
            posting_only_tools,
        ));
        violations
    }
}

/// Tools named in the posting that the candidate's materials never mention.
fn posting_only_tools(record: &SessionRecord, summary: &job_posting::JobSummary) -> Vec<String> {
    let cv_text = serde_json::to_string(&record.cv_data).unwrap_or_default();
    let corpus = InputCorpus::new([cv_text.as_str()]);
    summary
        .tools_tech
        .iter()
        .filter(|tool| !corpus.contains(tool))
        .cloned()
        .collect()
}

/// Generate the letter. Requires an extracted job posting.
pub async fn run(
    caller: &StageCaller,
    record: &mut SessionRecord,
    user_notes: &str,
) -> Result<CoverLetter> {
    let Some(summary) = job_posting::stored_summary(record) else {
        return Err(Error::ValidationFailed {
            summary: "no job posting extracted yet".into(),
            details: json!([{ "field_path": "metadata.job_summary" }]),
        });
    };

    let forbidden = posting_only_tools(record, &summary);
    let notes = sanitize_text(user_notes);
    let payload = json!({
        "candidate": record.cv_data,
        "job_summary": summary,
        "user_notes": notes,
    })
    .to_string();

    let target = record
        .metadata
        .target_language
        .unwrap_or(record.cv_data.language);
    let out = caller
        .call_stage::<CoverLetter, _>(
            StageCall {
                stage: STAGE.into(),
                stage_prompt: prompts::with_language(prompts::COVER_LETTER, target),
                payload,
                schema: schema(),
            },
            check(&forbidden),
        )
        .await?;

    record.push_provenance(out.provenance);
    Ok(out.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cvt_domain::config::LlmConfig;
    use cvt_providers::MockProvider;
    use std::sync::Arc;

    fn record_with_posting() -> SessionRecord {
        let mut record = SessionRecord::bootstrap(24, Utc::now());
        record.cv_data.profile = "Python engineer building ETL pipelines.".into();
        record.metadata.job_summary = Some(json!({
            "role_title": "Data Engineer",
            "responsibilities": ["pipelines"],
            "must_haves": ["Python"],
            "tools_tech": ["Python", "Terraform"]
        }));
        record.metadata.job_signature = Some("sig".into());
        record
    }

    #[tokio::test]
    async fn grounded_letter_passes() {
        let mut record = record_with_posting();
        let mock = Arc::new(MockProvider::new());
        mock.stage_fixture(
            STAGE,
            json!({
                "salutation": "Dear Hiring Team,",
                "paragraphs": [
                    "Your Data Engineer opening matches my Python pipeline work.",
                    "I would bring that experience to your team."
                ],
                "closing": "Kind regards"
            }),
        );
        let caller = StageCaller::new(mock, LlmConfig::default());

        let letter = run(&caller, &mut record, "").await.unwrap();
        assert_eq!(letter.paragraphs.len(), 2);
    }

    #[tokio::test]
    async fn posting_only_tool_claim_is_rejected() {
        let mut record = record_with_posting();
        let mock = Arc::new(MockProvider::new());
        mock.stage_fixture(
            STAGE,
            json!({
                "salutation": "Dear Hiring Team,",
                "paragraphs": [
                    "I have hands-on experience with Terraform.",
                    "Looking forward to hearing from you."
                ],
                "closing": "Kind regards"
            }),
        );
        let caller = StageCaller::new(mock.clone(), LlmConfig::default());

        let err = run(&caller, &mut record, "").await.unwrap_err();
        match err {
            Error::LlmInvalid { details, .. } => assert!(details.contains("Terraform")),
            other => panic!("expected LlmInvalid, got {other:?}"),
        }
    }
}
