//! LLM call layer.
//!
//! Adapters translate one provider-agnostic structured request into each
//! provider's wire format; the [`StageCaller`] on top owns prompt
//! composition, token budgets, post-parse checks, and the single
//! schema-repair retry.

pub mod anthropic;
pub mod caller;
pub mod mock;
pub mod openai_compat;
pub mod registry;
pub mod sanitize;
pub mod traits;
pub mod util;

pub use caller::{StageCall, StageCaller, StageOutput};
pub use mock::MockProvider;
pub use registry::create_provider;
pub use sanitize::sanitize_text;
pub use traits::{LlmProvider, LlmRequest, LlmResponse, Usage};
