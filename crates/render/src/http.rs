//! HTTP implementations of the render-side collaborators.
//!
//! The renderer service accepts `{ html }` and answers
//! `{ pdf_base64, page_count }`; the extractor accepts `{ docx_base64 }` and
//! answers `{ fields, photo_data_uri? }`. Both carry their own deadline.

use base64::Engine;
use serde_json::Value;

use cvt_domain::config::RendererConfig;
use cvt_domain::error::{Error, Result};

use crate::traits::{DocxExtractor, DocxPrefill, RenderedPdf, Renderer};

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HttpRenderer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HttpRenderer {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRenderer {
    pub fn from_config(cfg: &RendererConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Renderer for HttpRenderer {
    async fn render_pdf(&self, html: &str) -> Result<RenderedPdf> {
        let url = format!("{}/render", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "html": html }))
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let body: Value = resp.json().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(Error::RendererFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let pdf_base64 = body["pdf_base64"]
            .as_str()
            .ok_or_else(|| Error::RendererFailed("response missing pdf_base64".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(pdf_base64)
            .map_err(|e| Error::RendererFailed(format!("invalid pdf_base64: {e}")))?;
        if !bytes.starts_with(b"%PDF") {
            return Err(Error::RendererFailed("response is not a PDF".into()));
        }
        let page_count = body["page_count"].as_u64().unwrap_or(0) as u32;

        Ok(RenderedPdf { bytes, page_count })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HttpDocxExtractor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HttpDocxExtractor {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDocxExtractor {
    pub fn from_config(cfg: &RendererConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl DocxExtractor for HttpDocxExtractor {
    async fn extract(&self, docx_bytes: &[u8]) -> Result<DocxPrefill> {
        let url = format!("{}/extract", self.base_url);
        let encoded = base64::engine::general_purpose::STANDARD.encode(docx_bytes);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "docx_base64": encoded }))
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let body: Value = resp.json().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(Error::Http(format!(
                "extractor HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        Ok(DocxPrefill {
            fields: body["fields"].clone(),
            photo_data_uri: body["photo_data_uri"].as_str().map(String::from),
        })
    }
}
