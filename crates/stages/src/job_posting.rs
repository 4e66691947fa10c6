//! Job-posting extraction stage.
//!
//! One structured call turns raw posting text into the summary every later
//! tailoring stage consumes. Results are cached by posting signature, so
//! re-submitting the same posting costs nothing.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use cvt_domain::error::{Error, Result};
use cvt_domain::session::SessionRecord;
use cvt_domain::signature;
use cvt_providers::{sanitize_text, StageCall, StageCaller};

use crate::prompts;
use crate::proposal;

/// Postings above this size are rejected before any LLM call.
pub const MAX_POSTING_BYTES: usize = 20 * 1024;

pub const STAGE: &str = "job_posting";

/// Structured summary of a job posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobSummary {
    #[serde(default)]
    pub role_title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub must_haves: Vec<String>,
    #[serde(default)]
    pub nice_to_haves: Vec<String>,
    #[serde(default)]
    pub tools_tech: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "role_title": { "type": "string" },
            "company": { "type": "string" },
            "location": { "type": "string" },
            "responsibilities": { "type": "array", "items": { "type": "string" } },
            "must_haves": { "type": "array", "items": { "type": "string" } },
            "nice_to_haves": { "type": "array", "items": { "type": "string" } },
            "tools_tech": { "type": "array", "items": { "type": "string" } },
            "keywords": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["role_title", "responsibilities", "must_haves"]
    })
}

fn check(summary: &JobSummary) -> Vec<String> {
    let mut violations = Vec::new();
    if summary.role_title.trim().is_empty() {
        violations.push("role_title must not be empty".to_owned());
    }
    if summary.responsibilities.is_empty() {
        violations.push("responsibilities must not be empty".to_owned());
    }
    violations
}

/// Extract a posting into a [`JobSummary`] and store it on the session.
///
/// Cached by `sha256(posting_text)`: a repeat submission of the same text
/// returns the stored summary without a provider call.
pub async fn run(
    caller: &StageCaller,
    record: &mut SessionRecord,
    posting_text: &str,
) -> Result<JobSummary> {
    if posting_text.len() > MAX_POSTING_BYTES {
        return Err(Error::ValidationFailed {
            summary: format!(
                "job posting is {} bytes, limit {MAX_POSTING_BYTES}",
                posting_text.len()
            ),
            details: json!([{ "field_path": "posting_text", "limit": MAX_POSTING_BYTES }]),
        });
    }

    let payload = sanitize_text(posting_text);
    let posting_signature = signature::sha256_str(&payload);
    let key = proposal::cache_key(STAGE, &posting_signature, "-");

    if let Some(cached) = record.metadata.proposal_cache.get(&key) {
        if let Ok(summary) = serde_json::from_value::<JobSummary>(cached.clone()) {
            tracing::debug!(%posting_signature, "job posting cache hit");
            record.metadata.job_summary = Some(cached.clone());
            record.metadata.job_signature = Some(posting_signature);
            return Ok(summary);
        }
    }

    let out = caller
        .call_stage::<JobSummary, _>(
            StageCall {
                stage: STAGE.into(),
                stage_prompt: prompts::JOB_POSTING.to_owned(),
                payload,
                schema: schema(),
            },
            check,
        )
        .await?;

    let summary_value = serde_json::to_value(&out.value)?;
    record
        .metadata
        .proposal_cache
        .insert(key, summary_value.clone());
    record.metadata.job_summary = Some(summary_value);
    record.metadata.job_signature = Some(posting_signature);
    record.push_provenance(out.provenance);

    Ok(out.value)
}

/// The stored summary, when a posting has been extracted.
pub fn stored_summary(record: &SessionRecord) -> Option<JobSummary> {
    record
        .metadata
        .job_summary
        .as_ref()
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}
