//! `POST /cv-tool-call-handler` — the single backend tool endpoint.
//!
//! JSON responses for every tool except the two generators, which answer
//! with raw `application/pdf` bytes (metadata travels in a response header).
//! Errors take the standardized shape
//! `{ error, details, suggestion?, trace_id }`.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use cvt_domain::error::Error;

use crate::runtime::tools::{self, ToolOutcome, ToolRequest};
use crate::state::AppState;

pub async fn handle(
    State(state): State<AppState>,
    Json(req): Json<ToolRequest>,
) -> Response {
    let tool_name = req.tool_name.clone();
    match tools::execute(&state, req).await {
        Ok(ToolOutcome::Json(value)) => Json(value).into_response(),
        Ok(ToolOutcome::Pdf {
            bytes,
            filename,
            meta,
        }) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/pdf".to_owned()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
                (
                    header::HeaderName::from_static("x-cvtailor-meta"),
                    meta.to_string(),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => error_response(&tool_name, e),
    }
}

/// Map error kinds to HTTP statuses and render the wire shape. Internal
/// errors never leak their cause beyond the log.
fn error_response(tool_name: &str, error: Error) -> Response {
    let trace_id = uuid::Uuid::new_v4().to_string();
    let kind = error.kind();
    let status = match kind {
        "validation_failed" => StatusCode::UNPROCESSABLE_ENTITY,
        "readiness_not_met" => StatusCode::CONFLICT,
        "stage_violation" => StatusCode::CONFLICT,
        "not_found" => StatusCode::NOT_FOUND,
        "llm_invalid" => StatusCode::BAD_GATEWAY,
        "renderer_failed" => StatusCode::BAD_GATEWAY,
        "size_limit_exceeded" => StatusCode::INSUFFICIENT_STORAGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let suggestion = match kind {
        "readiness_not_met" => Some("complete the missing fields and confirmations, then retry"),
        "llm_invalid" => Some("retry the stage; the model output will be re-validated"),
        "stage_violation" => Some("check the current stage via get_session"),
        _ => None,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(tool = tool_name, %trace_id, error = %error, "internal error");
    } else {
        tracing::warn!(tool = tool_name, %trace_id, %kind, "tool error");
    }

    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        "internal error".to_owned()
    } else {
        error.to_string()
    };

    let mut body = serde_json::json!({
        "error": kind,
        "message": message,
        "details": error.details(),
        "trace_id": trace_id,
    });
    if let Some(s) = suggestion {
        body["suggestion"] = serde_json::json!(s);
    }

    (status, Json(body)).into_response()
}
