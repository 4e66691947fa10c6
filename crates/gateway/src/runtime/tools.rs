//! Tool execution — the orchestrated entry point.
//!
//! One backend tool call per HTTP turn: parse, load the session blob-aware,
//! run the tool, persist size-aware, respond. The per-session lock makes
//! turns serial for a session; persistence failures are logged and swallowed
//! so the user still gets a functional response.

use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use cvt_domain::action::ActionId;
use cvt_domain::error::{Error, Result};
use cvt_domain::session::SessionRecord;
use cvt_domain::trace::TraceEvent;
use cvt_render::cv_html;
use cvt_sessions::lifecycle;

use crate::runtime::{context_pack, dispatch, pdf, readiness};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
pub struct ToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub params: Value,
}

/// Tool results are JSON except for the two generators, which hand raw PDF
/// bytes up to the HTTP layer.
#[derive(Debug)]
pub enum ToolOutcome {
    Json(Value),
    Pdf {
        bytes: Vec<u8>,
        filename: String,
        meta: Value,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// execute
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one tool call. This is the single public entry per HTTP turn.
pub async fn execute(state: &AppState, req: ToolRequest) -> Result<ToolOutcome> {
    match req.tool_name.as_str() {
        "bootstrap_session" => bootstrap_session(state, &req).await,
        "get_session" => {
            let record = load(state, &req)?;
            Ok(ToolOutcome::Json(serde_json::to_value(&record)?))
        }
        "update_field" => update_field(state, &req).await,
        "validate_cv" => {
            let record = load(state, &req)?;
            let report = cvt_validator::validate(&record.cv_data);
            Ok(ToolOutcome::Json(serde_json::to_value(&report)?))
        }
        "preview_html" => {
            let record = load(state, &req)?;
            Ok(ToolOutcome::Json(json!({ "html": cv_html(&record.cv_data) })))
        }
        "generate_context_pack" => {
            let record = load(state, &req)?;
            let report = cvt_validator::validate(&record.cv_data);
            let gate = readiness::evaluate(&record, &report);
            let pack = context_pack::build(&record, &report, &gate);
            Ok(ToolOutcome::Json(serde_json::to_value(&pack)?))
        }
        "session_search" => {
            let query = req
                .params
                .get("query")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let hits = state.search.search(query);
            let count = hits.len();
            Ok(ToolOutcome::Json(json!({ "hits": hits, "count": count })))
        }
        "generate_cv_from_session" => generate_cv(state, &req).await,
        "generate_cover_letter_from_session" => generate_cover_letter(state, &req).await,
        "process_cv_orchestrated" => process_orchestrated(state, &req).await,
        "cleanup_expired_sessions" => {
            let removed = lifecycle::cleanup_expired(&state.store, Utc::now())?;
            Ok(ToolOutcome::Json(json!({ "removed": removed })))
        }
        other => Err(Error::NotFound(format!("tool {other}"))),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session plumbing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn require_session_id(req: &ToolRequest) -> Result<&str> {
    req.session_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::ValidationFailed {
            summary: format!("tool {} requires a session_id", req.tool_name),
            details: json!([{ "field_path": "session_id" }]),
        })
}

/// Blob-aware load with expiry check.
fn load(state: &AppState, req: &ToolRequest) -> Result<SessionRecord> {
    let session_id = require_session_id(req)?;
    let record = state.store.get(session_id)?;
    if record.is_expired(Utc::now()) {
        return Err(Error::NotFound(format!("session {session_id} expired")));
    }
    Ok(record)
}

/// Persist at turn end. A size failure was already logged by the store as
/// `PERSIST_FAILED`; the turn still answers from the in-memory record.
fn persist(state: &AppState, record: &mut SessionRecord) -> Result<()> {
    record.touch(Utc::now());
    match state.store.put(record) {
        Ok(()) => {
            state.search.index_record(record);
            Ok(())
        }
        Err(Error::SizeLimitExceeded { .. }) => {
            state.search.index_record(record);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Create the session: blank canonical object, optional DOCX prefill. The
/// prefill is stored read-only; nothing reaches `cv_data` until the user
/// confirms it.
async fn bootstrap_session(state: &AppState, req: &ToolRequest) -> Result<ToolOutcome> {
    if let Some(existing) = req.session_id.as_deref() {
        if state.store.get(existing).is_ok() {
            return Err(Error::StageViolation {
                action: "bootstrap_session".into(),
                stage: "session already exists".into(),
            });
        }
    }

    let mut record = SessionRecord::bootstrap(state.config.sessions.ttl_hours, Utc::now());

    if let Some(encoded) = req.params.get("docx_base64").and_then(Value::as_str) {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::ValidationFailed {
                summary: format!("docx_base64 is not valid base64: {e}"),
                details: json!([{ "field_path": "docx_base64" }]),
            })?;
        let prefill = state.extractor.extract(&bytes).await?;
        record.metadata.docx_prefill_unconfirmed = Some(prefill.fields);

        if let Some(data_uri) = prefill.photo_data_uri {
            store_photo(state, &record, &data_uri)?;
            record.cv_data.photo_url = Some(data_uri);
        }
    }

    let _permit = state
        .session_locks
        .acquire(&record.session_id.to_string())
        .await;
    persist(state, &mut record)?;
    TraceEvent::SessionCreated {
        session_id: record.session_id.to_string(),
    }
    .emit();

    Ok(ToolOutcome::Json(json!({
        "session_id": record.session_id,
        "stage": record.metadata.stage,
        "version": record.metadata.version,
        "docx_prefill_unconfirmed": record.metadata.docx_prefill_unconfirmed,
        "expires_at": record.metadata.expires_at,
    })))
}

fn store_photo(state: &AppState, record: &SessionRecord, data_uri: &str) -> Result<()> {
    let Some((header, data)) = data_uri.split_once(",") else {
        return Ok(());
    };
    let ext = if header.contains("image/png") { "png" } else { "jpg" };
    if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(data) {
        let key = format!("cv-photos/{}.{ext}", record.session_id);
        state.store.blobs().put(&key, &bytes)?;
    }
    Ok(())
}

/// Single or batched field updates, persisted in the same turn.
async fn update_field(state: &AppState, req: &ToolRequest) -> Result<ToolOutcome> {
    let session_id = require_session_id(req)?.to_owned();
    let _permit = state.session_locks.acquire(&session_id).await;

    let mut record = load(state, req)?;
    let applied = dispatch::apply_edits(&mut record, &req.params)?;
    persist(state, &mut record)?;

    Ok(ToolOutcome::Json(json!({
        "updated": applied,
        "version": record.metadata.version,
    })))
}

async fn generate_cv(state: &AppState, req: &ToolRequest) -> Result<ToolOutcome> {
    let session_id = require_session_id(req)?.to_owned();
    let _permit = state.session_locks.acquire(&session_id).await;

    let mut record = load(state, req)?;
    let outcome = pdf::render_cv(state, &mut record).await?;
    persist(state, &mut record)?;

    Ok(ToolOutcome::Pdf {
        bytes: outcome.bytes,
        filename: format!("cv_{session_id}.pdf"),
        meta: json!({
            "pdf_ref": outcome.pdf_ref,
            "page_count": outcome.pdf_ref.page_count,
            "cache_hit": outcome.cache_hit,
        }),
    })
}

async fn generate_cover_letter(state: &AppState, req: &ToolRequest) -> Result<ToolOutcome> {
    let session_id = require_session_id(req)?.to_owned();
    let _permit = state.session_locks.acquire(&session_id).await;

    let mut record = load(state, req)?;
    let notes = req
        .params
        .get("user_notes")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let letter = cvt_stages::cover_letter::run(&state.caller, &mut record, notes).await?;
    let outcome = pdf::render_cover_letter(state, &mut record, &letter).await?;
    persist(state, &mut record)?;

    Ok(ToolOutcome::Pdf {
        bytes: outcome.bytes,
        filename: format!("cover_letter_{session_id}.pdf"),
        meta: json!({
            "pdf_ref": outcome.pdf_ref,
            "letter": letter,
        }),
    })
}

/// One orchestrated wizard turn: action in, next UI actions out.
async fn process_orchestrated(state: &AppState, req: &ToolRequest) -> Result<ToolOutcome> {
    let action_raw = req
        .params
        .get("action_id")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let Some(action) = ActionId::parse(action_raw) else {
        return Err(Error::ValidationFailed {
            summary: format!("unknown action \"{action_raw}\""),
            details: json!([{ "field_path": "action_id" }]),
        });
    };
    let payload = req.params.get("payload").cloned().unwrap_or(Value::Null);

    // No session yet: only the bootstrap action may run.
    if req.session_id.as_deref().map_or(true, str::is_empty) {
        if action != ActionId::ExtractAndStoreCv {
            return Err(Error::StageViolation {
                action: action.as_wire().to_owned(),
                stage: "no session".into(),
            });
        }
        let bootstrap_req = ToolRequest {
            tool_name: "bootstrap_session".into(),
            session_id: None,
            params: payload,
        };
        return bootstrap_session(state, &bootstrap_req).await;
    }

    let session_id = require_session_id(req)?.to_owned();
    let _permit = state.session_locks.acquire(&session_id).await;

    let mut record = load(state, req)?;
    match dispatch::dispatch(state, &mut record, action, &payload).await {
        Ok(outcome) => {
            persist(state, &mut record)?;
            Ok(ToolOutcome::Json(serde_json::to_value(&outcome)?))
        }
        Err(e) => {
            // Rejections are part of the event log; keep them durable, but
            // never let a persist problem mask the real error.
            let _ = persist(state, &mut record);
            Err(e)
        }
    }
}
