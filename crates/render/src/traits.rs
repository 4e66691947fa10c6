use serde_json::Value;

use cvt_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Renderer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A rendered PDF and its page count as reported by the rasterizer.
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub page_count: u32,
}

/// HTML → PDF collaborator. The orchestrator hands over final HTML and gets
/// bytes back; layout fidelity is the collaborator's problem.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    async fn render_pdf(&self, html: &str) -> Result<RenderedPdf>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DOCX extractor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Structured fields pulled from an uploaded document. The field object is
/// stored as the read-only prefill until the user confirms it into
/// `cv_data`.
#[derive(Debug, Clone, Default)]
pub struct DocxPrefill {
    /// Loosely-typed field snapshot (same keys as the canonical model where
    /// extraction succeeded).
    pub fields: Value,
    /// Inline data URI when the document carried a photo.
    pub photo_data_uri: Option<String>,
}

/// Byte-in, structured-fields-out collaborator for uploaded documents.
#[async_trait::async_trait]
pub trait DocxExtractor: Send + Sync {
    async fn extract(&self, docx_bytes: &[u8]) -> Result<DocxPrefill>;
}
