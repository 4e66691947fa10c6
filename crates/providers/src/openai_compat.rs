//! OpenAI-compatible adapter.
//!
//! Targets `/chat/completions` with `response_format: json_object`. Works
//! against OpenAI itself and the many gateways that speak the same dialect.

use serde_json::Value;

use cvt_domain::config::LlmConfig;
use cvt_domain::error::{Error, Result};

use crate::traits::{LlmProvider, LlmRequest, LlmResponse, Usage};
use crate::util::{from_reqwest, resolve_api_key};

pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.api_key_env)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: cfg.model.clone(),
            client,
        })
    }

    fn build_body(&self, req: &LlmRequest) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": req.system },
                { "role": "user", "content": req.user },
            ],
            "response_format": { "type": "json_object" },
            "max_tokens": req.max_tokens,
            "temperature": 0.2,
        })
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(req);

        tracing::debug!(stage = %req.stage, url = %url, "openai_compat request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(Error::Http(format!(
                "openai_compat HTTP {} - {}",
                status.as_u16(),
                truncate(&resp_text, 300)
            )));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_owned();
        let usage = Usage {
            prompt_tokens: resp_json["usage"]["prompt_tokens"]
                .as_u64()
                .map(|v| v as u32),
            completion_tokens: resp_json["usage"]["completion_tokens"]
                .as_u64()
                .map(|v| v as u32),
        };
        let model = resp_json["model"]
            .as_str()
            .unwrap_or(&self.model)
            .to_owned();

        Ok(LlmResponse {
            content,
            usage,
            model,
        })
    }

    fn provider_id(&self) -> &str {
        "openai-compat"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
