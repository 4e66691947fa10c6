use serde::Serialize;

/// Structured trace events emitted across all cvtailor crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
    },
    SessionExpired {
        session_id: String,
    },
    StageTransition {
        session_id: String,
        action_id: String,
        stage_before: String,
        stage_after: String,
        result: String,
    },
    LlmCall {
        stage: String,
        provider: String,
        model: String,
        duration_ms: u64,
        repair_attempt: u32,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    LlmRepair {
        stage: String,
        violation: String,
    },
    OffloadWritten {
        session_id: String,
        key: String,
        bytes: usize,
    },
    BlobReadFailed {
        key: String,
        reason: String,
    },
    /// Terminal persistence failure — the request still returns a result.
    PersistFailed {
        session_id: String,
        bytes: usize,
        reason: String,
    },
    PdfRendered {
        session_id: String,
        kind: String,
        page_count: u32,
        bytes: usize,
        cache_hit: bool,
    },
    SessionsCleaned {
        removed: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "cvt_event");
    }
}
