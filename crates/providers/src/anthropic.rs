//! Anthropic-native adapter.
//!
//! Implements the Messages API: system prompt in the top-level `system`
//! field, user payload as the single message. Anthropic has no JSON response
//! mode; the schema instruction in the system prompt plus the post-parse
//! check in the caller carry that weight.

use serde_json::Value;

use cvt_domain::config::LlmConfig;
use cvt_domain::error::{Error, Result};

use crate::traits::{LlmProvider, LlmRequest, LlmResponse, Usage};
use crate::util::{from_reqwest, resolve_api_key};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
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
            "system": req.system,
            "messages": [
                { "role": "user", "content": req.user },
            ],
            "max_tokens": req.max_tokens,
            "temperature": 0.2,
        })
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(req);

        tracing::debug!(stage = %req.stage, url = %url, "anthropic request");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(Error::Http(format!(
                "anthropic HTTP {} - {}",
                status.as_u16(),
                resp_text.chars().take(300).collect::<String>()
            )));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        // Text lives in the first content block.
        let content = resp_json["content"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_owned();
        let usage = Usage {
            prompt_tokens: resp_json["usage"]["input_tokens"].as_u64().map(|v| v as u32),
            completion_tokens: resp_json["usage"]["output_tokens"]
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
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
