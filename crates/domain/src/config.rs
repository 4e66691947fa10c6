//! Configuration tree.
//!
//! Deserialized from `cvtailor.toml`; every field has a serde default so a
//! missing file yields a fully usable dev config. Feature flags can be
//! overridden from the environment (see [`Config::apply_env_overrides`]),
//! which is how deployment wires `LLM_MOCK`, `IDEMPOTENCY_LATCH`, etc.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub flags: FlagsConfig,
}

impl Config {
    /// Apply environment overrides for the feature flags and the session TTL.
    /// Env always wins over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_bool("IDEMPOTENCY_LATCH") {
            self.flags.idempotency_latch = v;
        }
        if let Some(v) = env_bool("DELTA_MODE") {
            self.flags.delta_mode = v;
        }
        if let Some(v) = env_bool("LLM_MOCK") {
            self.flags.llm_mock = v;
        }
        if let Some(v) = env_bool("DEBUG_ALLOW_PAGES") {
            self.flags.debug_allow_pages = v;
        }
        if let Ok(raw) = std::env::var("SESSION_TTL_HOURS") {
            if let Ok(hours) = raw.parse::<i64>() {
                self.sessions.ttl_hours = hours;
            }
        }
    }
}

fn env_bool(name: &str) -> Option<bool> {
    match std::env::var(name).ok()?.as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_8080")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: 8080,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the on-disk state (primary records + blobs).
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
    /// Hard per-property size limit of the primary store, in bytes.
    #[serde(default = "d_65536")]
    pub property_limit_bytes: usize,
    /// Bounded write retries (offload / shrink passes included).
    #[serde(default = "d_3")]
    pub write_retries: u32,
    /// Deadline for storage operations.
    #[serde(default = "d_10")]
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            property_limit_bytes: 65_536,
            write_retries: 3,
            timeout_secs: 10,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "d_24")]
    pub ttl_hours: i64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self { ttl_hours: 24 }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider + per-stage budgets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    OpenaiCompat,
    Anthropic,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_provider")]
    pub provider: ProviderKind,
    #[serde(default = "d_llm_url")]
    pub base_url: String,
    /// Name of the env var carrying the API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_60")]
    pub timeout_secs: u64,
    /// Per-stage token budgets / retry overrides, keyed by stage name.
    #[serde(default)]
    pub stages: HashMap<String, StageLlmConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: d_provider(),
            base_url: d_llm_url(),
            api_key_env: d_api_key_env(),
            model: d_model(),
            timeout_secs: 60,
            stages: HashMap::new(),
        }
    }
}

/// Per-stage override of the call budget.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StageLlmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Schema-repair retries after the first attempt. Default is 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_repair_retries: Option<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Renderer collaborator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    #[serde(default = "d_renderer_url")]
    pub base_url: String,
    #[serde(default = "d_90")]
    pub timeout_secs: u64,
    /// Participates in the render signature; bump on template changes.
    #[serde(default = "d_template_version")]
    pub template_version: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            base_url: d_renderer_url(),
            timeout_secs: 90,
            template_version: d_template_version(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Feature flags
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagsConfig {
    /// CV render returns the cached PDF when the content signature matches.
    #[serde(default = "d_true")]
    pub idempotency_latch: bool,
    /// Reserved: delta-mode stage calls send only changed entries.
    #[serde(default)]
    pub delta_mode: bool,
    /// Bypass provider I/O and serve fixture responses.
    #[serde(default)]
    pub llm_mock: bool,
    /// Accept non-2-page CV renders (debug only).
    #[serde(default)]
    pub debug_allow_pages: bool,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            idempotency_latch: true,
            delta_mode: false,
            llm_mock: false,
            debug_allow_pages: false,
        }
    }
}

// ── Serde default helpers ──────────────────────────────────────────

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_8080() -> u16 {
    8080
}
fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}
fn d_65536() -> usize {
    65_536
}
fn d_3() -> u32 {
    3
}
fn d_10() -> u64 {
    10
}
fn d_24() -> i64 {
    24
}
fn d_60() -> u64 {
    60
}
fn d_90() -> u64 {
    90
}
fn d_true() -> bool {
    true
}
fn d_provider() -> ProviderKind {
    ProviderKind::OpenaiCompat
}
fn d_llm_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_api_key_env() -> String {
    "LLM_API_KEY".into()
}
fn d_model() -> String {
    "gpt-4o-mini".into()
}
fn d_renderer_url() -> String {
    "http://127.0.0.1:3001".into()
}
fn d_template_version() -> String {
    "v1".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.property_limit_bytes, 65_536);
        assert_eq!(config.sessions.ttl_hours, 24);
        assert!(config.flags.idempotency_latch);
        assert!(!config.flags.llm_mock);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let toml_str = r#"
[server]
port = 9000

[llm]
provider = "mock"

[llm.stages.work_experience]
max_tokens = 2240
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.llm.provider, ProviderKind::Mock);
        assert_eq!(
            config.llm.stages["work_experience"].max_tokens,
            Some(2240)
        );
        assert_eq!(config.renderer.timeout_secs, 90);
    }
}
