//! Mock provider.
//!
//! The determinism hook behind `LLM_MOCK=1`: bypasses provider I/O entirely
//! and serves fixture responses keyed by `{stage, input hash}`, falling back
//! to a per-stage fixture, falling back to an empty object. Tests install
//! fixtures; nothing here ever touches the network.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use cvt_domain::error::Result;
use cvt_domain::signature;

use crate::traits::{LlmProvider, LlmRequest, LlmResponse, Usage};

#[derive(Default)]
pub struct MockProvider {
    /// Keyed by `{stage}:{sha256(user payload)}`.
    keyed: RwLock<HashMap<String, Value>>,
    /// Keyed by stage alone.
    by_stage: RwLock<HashMap<String, Value>>,
    /// Recorded requests, newest last (assertions in tests).
    calls: RwLock<Vec<LlmRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixture for every call of a stage.
    pub fn stage_fixture(&self, stage: &str, response: Value) {
        self.by_stage.write().insert(stage.to_owned(), response);
    }

    /// Fixture for one exact `{stage, input}` pair.
    pub fn keyed_fixture(&self, stage: &str, user_payload: &str, response: Value) {
        let key = format!("{stage}:{}", signature::sha256_str(user_payload));
        self.keyed.write().insert(key, response);
    }

    /// Number of completed calls, optionally filtered by stage.
    pub fn call_count(&self, stage: Option<&str>) -> usize {
        let calls = self.calls.read();
        match stage {
            None => calls.len(),
            Some(s) => calls.iter().filter(|c| c.stage == s).count(),
        }
    }

    pub fn last_request(&self) -> Option<LlmRequest> {
        self.calls.read().last().cloned()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse> {
        self.calls.write().push(req.clone());

        let key = format!("{}:{}", req.stage, signature::sha256_str(&req.user));
        let fixture = self
            .keyed
            .read()
            .get(&key)
            .cloned()
            .or_else(|| self.by_stage.read().get(&req.stage).cloned())
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

        Ok(LlmResponse {
            content: fixture.to_string(),
            usage: Usage::default(),
            model: "mock".into(),
        })
    }

    fn provider_id(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keyed_fixture_wins_over_stage_fixture() {
        let mock = MockProvider::new();
        mock.stage_fixture("skills", serde_json::json!({"which": "stage"}));
        mock.keyed_fixture("skills", "payload", serde_json::json!({"which": "keyed"}));

        let req = LlmRequest {
            stage: "skills".into(),
            user: "payload".into(),
            ..LlmRequest::default()
        };
        let resp = mock.complete(&req).await.unwrap();
        assert!(resp.content.contains("keyed"));

        let req2 = LlmRequest {
            stage: "skills".into(),
            user: "other".into(),
            ..LlmRequest::default()
        };
        let resp2 = mock.complete(&req2).await.unwrap();
        assert!(resp2.content.contains("stage"));
        assert_eq!(mock.call_count(Some("skills")), 2);
    }
}
