use serde_json::Value;

/// Shared error type used across all cvtailor crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// Canonical schema or page-fit check failed; recoverable by user edit.
    #[error("validation failed: {summary}")]
    ValidationFailed { summary: String, details: Value },

    /// Generation attempted before the readiness gate opens.
    #[error("readiness not met; missing: {}", missing.join(", "))]
    ReadinessNotMet { missing: Vec<String> },

    /// Provider returned unparseable or schema-violating output after the
    /// single repair attempt.
    #[error("LLM output invalid: {details}")]
    LlmInvalid {
        details: String,
        /// Raw text of the last attempt, for diagnostics.
        raw: String,
    },

    /// Storage write refused even after shrinking metadata.
    #[error("record exceeds storage size limit ({bytes} bytes)")]
    SizeLimitExceeded { bytes: usize },

    /// Action not permitted in the current wizard stage.
    #[error("action {action} not permitted in stage {stage}")]
    StageViolation { action: String, stage: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic-concurrency check failed; re-read and retry.
    #[error("version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    /// External renderer returned non-PDF output or the wrong page count.
    #[error("renderer: {0}")]
    RendererFailed(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable wire kind for the error response shape
    /// `{ error: <kind>, details, suggestion?, trace_id }`.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ValidationFailed { .. } => "validation_failed",
            Error::ReadinessNotMet { .. } => "readiness_not_met",
            Error::LlmInvalid { .. } => "llm_invalid",
            Error::SizeLimitExceeded { .. } => "size_limit_exceeded",
            Error::StageViolation { .. } => "stage_violation",
            Error::NotFound(_) => "not_found",
            Error::RendererFailed(_) => "renderer_failed",
            _ => "internal",
        }
    }

    /// Field-level details for the wire response, when the variant carries any.
    pub fn details(&self) -> Value {
        match self {
            Error::ValidationFailed { details, .. } => details.clone(),
            Error::ReadinessNotMet { missing } => serde_json::json!(missing),
            Error::LlmInvalid { details, .. } => serde_json::json!([details]),
            Error::StageViolation { action, stage } => {
                serde_json::json!({ "action": action, "stage": stage })
            }
            _ => Value::Array(Vec::new()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
