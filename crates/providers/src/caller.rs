//! Structured stage caller.
//!
//! One entry point for every stage engine: compose the prompt, attach the
//! stage schema, call the provider inside its token budget, parse the JSON,
//! run the stage's post-parse check, and — on a malformed or violating
//! response — retry exactly once with a schema-repair instruction carrying a
//! compact description of what was wrong. Persistent failure surfaces as a
//! typed `llm_invalid` error with the last raw text attached.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;

use cvt_domain::config::LlmConfig;
use cvt_domain::error::{Error, Result};
use cvt_domain::session::PromptProvenance;
use cvt_domain::signature;
use cvt_domain::trace::TraceEvent;

use crate::traits::{LlmProvider, LlmRequest, Usage};

/// Factual, JSON-only base prompt shared by all stages. Short and stable so
/// its hash stays meaningful across deployments.
const BASE_PROMPT: &str = "You are a résumé-tailoring assistant. \
Work only with facts present in the provided input; never invent employers, \
dates, tools, certifications, or metrics. Respond with a single JSON object \
and nothing else: no prose, no code fences.";

/// Default per-stage token budgets. Overridable per stage in config.
const DEFAULT_BUDGETS: &[(&str, u32)] = &[
    ("job_posting", 1200),
    ("bulk_translation", 3000),
    ("work_experience", 2240),
    ("skills", 800),
    ("further_experience", 960),
    ("education", 800),
    ("cover_letter", 1680),
    ("correction", 800),
];

const FALLBACK_BUDGET: u32 = 1600;
const DEFAULT_REPAIR_RETRIES: u32 = 1;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Call input / output
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One stage call, already assembled by the stage engine (payload sanitized,
/// `{target_language}` interpolated into the stage prompt).
#[derive(Debug, Clone)]
pub struct StageCall {
    pub stage: String,
    pub stage_prompt: String,
    pub payload: String,
    pub schema: Value,
}

/// A successful structured call.
#[derive(Debug)]
pub struct StageOutput<T> {
    pub value: T,
    pub provenance: PromptProvenance,
    pub usage: Usage,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// StageCaller
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct StageCaller {
    provider: Arc<dyn LlmProvider>,
    config: LlmConfig,
}

impl StageCaller {
    pub fn new(provider: Arc<dyn LlmProvider>, config: LlmConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    fn budget_for(&self, stage: &str) -> u32 {
        if let Some(cfg) = self.config.stages.get(stage) {
            if let Some(max) = cfg.max_tokens {
                return max;
            }
        }
        DEFAULT_BUDGETS
            .iter()
            .find(|(name, _)| *name == stage)
            .map(|(_, budget)| *budget)
            .unwrap_or(FALLBACK_BUDGET)
    }

    fn retries_for(&self, stage: &str) -> u32 {
        self.config
            .stages
            .get(stage)
            .and_then(|cfg| cfg.max_repair_retries)
            .unwrap_or(DEFAULT_REPAIR_RETRIES)
    }

    /// Run one structured stage call.
    ///
    /// `check` is the stage's post-parse rule set (counts, lengths,
    /// hallucination guards); it returns a list of violation descriptions,
    /// empty meaning the value is acceptable.
    pub async fn call_stage<T, F>(&self, call: StageCall, check: F) -> Result<StageOutput<T>>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> Vec<String>,
    {
        let system = format!(
            "{BASE_PROMPT}\n\n{}\n\nThe JSON object must match this schema:\n{}",
            call.stage_prompt, call.schema
        );
        let max_tokens = self.budget_for(&call.stage);
        let attempts = 1 + self.retries_for(&call.stage);

        let provenance = PromptProvenance {
            stage: call.stage.clone(),
            effective_system_prompt_hash: signature::sha256_str(&system),
            stage_prompt_source: format!("builtin:{}", call.stage),
            user_payload_hash: signature::sha256_str(&call.payload),
            ts: Utc::now(),
        };

        let mut repair: Option<String> = None;
        let mut last_raw = String::new();
        let mut last_violation = String::new();

        for attempt in 0..attempts {
            let system_with_repair = match &repair {
                None => system.clone(),
                Some(instruction) => format!("{system}\n\n{instruction}"),
            };
            let req = LlmRequest {
                stage: call.stage.clone(),
                system: system_with_repair,
                user: call.payload.clone(),
                schema: call.schema.clone(),
                max_tokens,
            };

            let started = Instant::now();
            let resp = self.provider.complete(&req).await?;
            TraceEvent::LlmCall {
                stage: call.stage.clone(),
                provider: self.provider.provider_id().to_owned(),
                model: resp.model.clone(),
                duration_ms: started.elapsed().as_millis() as u64,
                repair_attempt: attempt,
                prompt_tokens: resp.usage.prompt_tokens,
                completion_tokens: resp.usage.completion_tokens,
            }
            .emit();

            last_raw = resp.content.clone();
            match parse_and_check(&resp.content, &check) {
                Ok(value) => {
                    return Ok(StageOutput {
                        value,
                        provenance,
                        usage: resp.usage,
                    })
                }
                Err(violation) => {
                    TraceEvent::LlmRepair {
                        stage: call.stage.clone(),
                        violation: violation.clone(),
                    }
                    .emit();
                    repair = Some(format!(
                        "Your previous response violated the schema: {violation}. \
                         Return a corrected JSON object that fixes exactly these \
                         violations and changes nothing else."
                    ));
                    last_violation = violation;
                }
            }
        }

        Err(Error::LlmInvalid {
            details: last_violation,
            raw: last_raw,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_and_check<T, F>(raw: &str, check: &F) -> std::result::Result<T, String>
where
    T: DeserializeOwned,
    F: Fn(&T) -> Vec<String>,
{
    let json_text = extract_json_object(raw)
        .ok_or_else(|| "response did not contain a JSON object".to_owned())?;
    let value: T = serde_json::from_str(json_text)
        .map_err(|e| format!("JSON did not match the schema: {e}"))?;
    let violations = check(&value);
    if violations.is_empty() {
        Ok(value)
    } else {
        Err(violations.join("; "))
    }
}

/// Locate the JSON object in a raw completion: tolerate code fences and
/// stray prose around the braces, but never accept partial parses.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    struct Echo {
        word: String,
    }

    fn caller(mock: Arc<MockProvider>) -> StageCaller {
        StageCaller::new(mock, LlmConfig::default())
    }

    fn call() -> StageCall {
        StageCall {
            stage: "skills".into(),
            stage_prompt: "Extract.".into(),
            payload: "payload".into(),
            schema: serde_json::json!({"word": "string"}),
        }
    }

    #[tokio::test]
    async fn valid_response_passes_first_try() {
        let mock = Arc::new(MockProvider::new());
        mock.stage_fixture("skills", serde_json::json!({"word": "ok"}));
        let out = caller(mock.clone())
            .call_stage::<Echo, _>(call(), |_| Vec::new())
            .await
            .unwrap();
        assert_eq!(out.value.word, "ok");
        assert_eq!(mock.call_count(None), 1);
        assert!(!out.provenance.user_payload_hash.is_empty());
    }

    #[tokio::test]
    async fn violation_triggers_exactly_one_repair() {
        let mock = Arc::new(MockProvider::new());
        mock.stage_fixture("skills", serde_json::json!({"word": "bad"}));
        let err = caller(mock.clone())
            .call_stage::<Echo, _>(call(), |e| {
                if e.word == "bad" {
                    vec!["word must not be bad".into()]
                } else {
                    Vec::new()
                }
            })
            .await
            .unwrap_err();

        // First attempt + one repair attempt, then a typed error.
        assert_eq!(mock.call_count(None), 2);
        match err {
            Error::LlmInvalid { details, raw } => {
                assert!(details.contains("word must not be bad"));
                assert!(raw.contains("bad"));
            }
            other => panic!("expected LlmInvalid, got {other:?}"),
        }
        // The repair attempt carried the violation description.
        let last = mock.last_request().unwrap();
        assert!(last.system.contains("violated the schema"));
    }

    #[tokio::test]
    async fn fenced_json_is_tolerated() {
        assert_eq!(
            extract_json_object("```json\n{\"word\": \"x\"}\n```"),
            Some("{\"word\": \"x\"}")
        );
        assert_eq!(extract_json_object("no braces"), None);
    }

    #[tokio::test]
    async fn budgets_resolve_from_defaults_and_config() {
        let mut config = LlmConfig::default();
        config.stages.insert(
            "skills".into(),
            cvt_domain::config::StageLlmConfig {
                max_tokens: Some(999),
                max_repair_retries: None,
            },
        );
        let caller = StageCaller::new(Arc::new(MockProvider::new()), config);
        assert_eq!(caller.budget_for("skills"), 999);
        assert_eq!(caller.budget_for("work_experience"), 2240);
        assert_eq!(caller.budget_for("unknown_stage"), FALLBACK_BUDGET);
    }
}
