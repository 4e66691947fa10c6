use serde_json::Value;

use cvt_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic structured-completion request.
///
/// Every call is single-turn: one system prompt, one user payload, one JSON
/// object back. The stage name travels along for fixture routing and
/// tracing; real adapters ignore it.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    /// Stage identifier (e.g. `"work_experience"`).
    pub stage: String,
    /// Full system prompt (base + stage + schema instruction).
    pub system: String,
    /// Sanitized user payload.
    pub user: String,
    /// JSON schema the response must match; adapters that support a JSON
    /// mode pass it through, others embed it in the prompt only.
    pub schema: Value,
    /// Token budget for the response.
    pub max_tokens: u32,
}

/// Token usage, when the provider reports it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

/// A structured-completion response: raw text plus usage.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Usage,
    pub model: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every LLM adapter implements.
///
/// Implementations translate between our internal request and the wire
/// format of each provider's HTTP API. The mock implementation returns
/// fixture responses and never touches the network.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one completion request and wait for the full response.
    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;

    /// The default model this provider targets.
    fn model(&self) -> &str;
}
