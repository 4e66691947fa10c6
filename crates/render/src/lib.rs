//! Render-side collaborators.
//!
//! DOCX extraction and HTML→PDF rasterization are external services; this
//! crate holds their narrow trait interfaces, the HTTP clients, deterministic
//! mocks, and the one HTML template the canonical model renders through.

pub mod http;
pub mod mock;
pub mod template;
pub mod traits;

pub use http::{HttpDocxExtractor, HttpRenderer};
pub use mock::{MockDocxExtractor, MockRenderer};
pub use template::{cover_letter_html, cv_html, TEMPLATE_VERSION};
pub use traits::{DocxExtractor, DocxPrefill, RenderedPdf, Renderer};
