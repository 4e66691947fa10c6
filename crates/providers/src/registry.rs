//! Provider construction.
//!
//! Picks the adapter from config; `LLM_MOCK` (flag or env) forces the mock
//! regardless of the configured provider, so tests and local runs never
//! reach the network by accident.

use std::sync::Arc;

use cvt_domain::config::{Config, ProviderKind};
use cvt_domain::error::Result;

use crate::anthropic::AnthropicProvider;
use crate::mock::MockProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;

/// Build the provider the orchestrator will use.
pub fn create_provider(config: &Config) -> Result<Arc<dyn LlmProvider>> {
    if config.flags.llm_mock {
        tracing::info!("LLM_MOCK active — using fixture provider");
        return Ok(Arc::new(MockProvider::new()));
    }

    let provider: Arc<dyn LlmProvider> = match config.llm.provider {
        ProviderKind::Mock => Arc::new(MockProvider::new()),
        ProviderKind::OpenaiCompat => Arc::new(OpenAiCompatProvider::from_config(&config.llm)?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_config(&config.llm)?),
    };
    tracing::info!(
        provider = provider.provider_id(),
        model = provider.model(),
        "LLM provider ready"
    );
    Ok(provider)
}
