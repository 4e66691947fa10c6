//! Deterministic mock collaborators for tests and local runs.

use parking_lot::Mutex;
use serde_json::json;
use sha2::{Digest, Sha256};

use cvt_domain::error::{Error, Result};

use crate::traits::{DocxExtractor, DocxPrefill, RenderedPdf, Renderer};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MockRenderer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Produces a deterministic pseudo-PDF: same HTML in, same bytes out, which
/// is what the idempotency-latch tests depend on.
pub struct MockRenderer {
    page_count: u32,
    /// When set, the next N calls fail (renderer-retry tests).
    failures_remaining: Mutex<u32>,
    calls: Mutex<u32>,
}

impl Default for MockRenderer {
    fn default() -> Self {
        Self::new(2)
    }
}

impl MockRenderer {
    pub fn new(page_count: u32) -> Self {
        Self {
            page_count,
            failures_remaining: Mutex::new(0),
            calls: Mutex::new(0),
        }
    }

    pub fn fail_next(&self, count: u32) {
        *self.failures_remaining.lock() = count;
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait::async_trait]
impl Renderer for MockRenderer {
    async fn render_pdf(&self, html: &str) -> Result<RenderedPdf> {
        *self.calls.lock() += 1;
        {
            let mut failures = self.failures_remaining.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::RendererFailed("injected failure".into()));
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(html.as_bytes());
        let digest = hex::encode(hasher.finalize());
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend_from_slice(digest.as_bytes());
        Ok(RenderedPdf {
            bytes,
            page_count: self.page_count,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MockDocxExtractor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Returns a fixed prefill regardless of the bytes.
#[derive(Default)]
pub struct MockDocxExtractor;

#[async_trait::async_trait]
impl DocxExtractor for MockDocxExtractor {
    async fn extract(&self, _docx_bytes: &[u8]) -> Result<DocxPrefill> {
        Ok(DocxPrefill {
            fields: json!({
                "full_name": "Jan Kowalski",
                "email": "jan@kowalski.pl",
                "phone": "+48 600 000 000",
            }),
            photo_data_uri: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_html_same_bytes() {
        let renderer = MockRenderer::default();
        let a = renderer.render_pdf("<html>x</html>").await.unwrap();
        let b = renderer.render_pdf("<html>x</html>").await.unwrap();
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(a.page_count, 2);

        let c = renderer.render_pdf("<html>y</html>").await.unwrap();
        assert_ne!(a.bytes, c.bytes);
    }

    #[tokio::test]
    async fn injected_failures_then_recovery() {
        let renderer = MockRenderer::default();
        renderer.fail_next(1);
        assert!(renderer.render_pdf("<html></html>").await.is_err());
        assert!(renderer.render_pdf("<html></html>").await.is_ok());
        assert_eq!(renderer.call_count(), 2);
    }
}
