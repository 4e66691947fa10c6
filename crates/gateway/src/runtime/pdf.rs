//! PDF generation path.
//!
//! Idempotent wrapper around the renderer collaborator. CV renders are
//! signature-cached behind the idempotency latch; cover letters always
//! regenerate. Bytes land in the blob store, the session keeps only a
//! compact ref.

use chrono::Utc;

use cvt_domain::error::{Error, Result};
use cvt_domain::session::{PdfRef, SessionRecord};
use cvt_domain::signature;
use cvt_domain::trace::TraceEvent;
use cvt_render::{cover_letter_html, cv_html, RenderedPdf};
use cvt_stages::cover_letter::CoverLetter;

use crate::runtime::readiness;
use crate::state::AppState;

/// Expected page count of a rendered CV.
const CV_PAGES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfKind {
    Cv,
    CoverLetter,
}

impl PdfKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfKind::Cv => "cv",
            PdfKind::CoverLetter => "cover_letter",
        }
    }
}

/// A produced (or cache-served) PDF.
pub struct PdfOutcome {
    pub pdf_ref: PdfRef,
    pub bytes: Vec<u8>,
    pub cache_hit: bool,
}

/// Refuse unless the readiness gate is open; returns the structured missing
/// list otherwise.
fn ensure_ready(record: &SessionRecord) -> Result<()> {
    let report = cvt_validator::validate(&record.cv_data);
    let gate = readiness::evaluate(record, &report);
    if !gate.can_generate {
        return Err(Error::ReadinessNotMet {
            missing: gate.missing,
        });
    }
    Ok(())
}

/// One retry on renderer failure; other errors pass straight through.
async fn render_with_retry(state: &AppState, html: &str) -> Result<RenderedPdf> {
    match state.renderer.render_pdf(html).await {
        Ok(rendered) => Ok(rendered),
        Err(Error::RendererFailed(first)) => {
            tracing::warn!(error = %first, "renderer failed, retrying once");
            state.renderer.render_pdf(html).await
        }
        Err(e) => Err(e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CV
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Render (or re-serve) the CV PDF.
///
/// With the idempotency latch on, an unchanged content signature returns
/// the stored ref without touching the renderer.
pub async fn render_cv(state: &AppState, record: &mut SessionRecord) -> Result<PdfOutcome> {
    ensure_ready(record)?;

    let sig = signature::render_signature(
        &record.cv_data,
        &state.config.renderer.template_version,
        record.cv_data.language,
    );

    if state.config.flags.idempotency_latch {
        if let Some(cached) = &record.metadata.pdf_refs.cv {
            if cached.content_signature == sig {
                if let Ok(bytes) = state.store.blobs().get(&cached.blob_key) {
                    TraceEvent::PdfRendered {
                        session_id: record.session_id.to_string(),
                        kind: PdfKind::Cv.as_str().into(),
                        page_count: cached.page_count,
                        bytes: bytes.len(),
                        cache_hit: true,
                    }
                    .emit();
                    return Ok(PdfOutcome {
                        pdf_ref: cached.clone(),
                        bytes,
                        cache_hit: true,
                    });
                }
            }
        }
    }

    let html = cv_html(&record.cv_data);
    let rendered = render_with_retry(state, &html).await?;
    if rendered.page_count != CV_PAGES && !state.config.flags.debug_allow_pages {
        return Err(Error::RendererFailed(format!(
            "CV rendered to {} pages, expected {CV_PAGES}",
            rendered.page_count
        )));
    }

    let blob_key = format!(
        "cv-pdfs/{}/cv_{}.pdf",
        record.session_id,
        &sig[..16.min(sig.len())]
    );
    state.store.blobs().put(&blob_key, &rendered.bytes)?;

    let pdf_ref = PdfRef {
        blob_key,
        content_signature: sig,
        page_count: rendered.page_count,
        bytes: rendered.bytes.len(),
        created_at: Utc::now(),
    };
    record.metadata.pdf_refs.cv = Some(pdf_ref.clone());

    TraceEvent::PdfRendered {
        session_id: record.session_id.to_string(),
        kind: PdfKind::Cv.as_str().into(),
        page_count: rendered.page_count,
        bytes: rendered.bytes.len(),
        cache_hit: false,
    }
    .emit();

    Ok(PdfOutcome {
        pdf_ref,
        bytes: rendered.bytes,
        cache_hit: false,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cover letter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Render the cover-letter PDF. Never short-circuits: every call produces
/// a new blob and a new ref, even for identical content.
pub async fn render_cover_letter(
    state: &AppState,
    record: &mut SessionRecord,
    letter: &CoverLetter,
) -> Result<PdfOutcome> {
    // A blocked CV blocks the letter too.
    ensure_ready(record)?;

    let html = cover_letter_html(
        &record.cv_data,
        &letter.salutation,
        &letter.paragraphs,
        &letter.closing,
    );
    let rendered = render_with_retry(state, &html).await?;

    let sig = signature::value_signature(&serde_json::json!({
        "letter": letter,
        "cv": record.metadata.content_signature,
        "template_version": state.config.renderer.template_version,
    }));
    // Distinct ref per generation even when content repeats.
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let blob_key = format!(
        "cv-pdfs/{}/cover_letter_{}_{}.pdf",
        record.session_id,
        &sig[..16.min(sig.len())],
        &nonce[..8]
    );
    state.store.blobs().put(&blob_key, &rendered.bytes)?;

    let pdf_ref = PdfRef {
        blob_key,
        content_signature: sig,
        page_count: rendered.page_count,
        bytes: rendered.bytes.len(),
        created_at: Utc::now(),
    };
    record.metadata.pdf_refs.cover_letter = Some(pdf_ref.clone());

    TraceEvent::PdfRendered {
        session_id: record.session_id.to_string(),
        kind: PdfKind::CoverLetter.as_str().into(),
        page_count: rendered.page_count,
        bytes: rendered.bytes.len(),
        cache_hit: false,
    }
    .emit();

    Ok(PdfOutcome {
        pdf_ref,
        bytes: rendered.bytes,
        cache_hit: false,
    })
}
