use std::sync::Arc;

use cvt_domain::config::Config;
use cvt_providers::StageCaller;
use cvt_render::{DocxExtractor, Renderer};
use cvt_sessions::{FilePrimaryStore, FsBlobStore, SessionIndex, SessionStore};

use crate::runtime::session_lock::SessionLockMap;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services** — config, session store, search index
/// - **Collaborators** — LLM stage caller, renderer, DOCX extractor
/// - **Concurrency** — per-session turn locks
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub store: Arc<SessionStore>,
    pub search: Arc<SessionIndex>,

    // ── Collaborators ─────────────────────────────────────────────────
    pub caller: Arc<StageCaller>,
    pub renderer: Arc<dyn Renderer>,
    pub extractor: Arc<dyn DocxExtractor>,

    // ── Concurrency ───────────────────────────────────────────────────
    pub session_locks: Arc<SessionLockMap>,
}

impl AppState {
    /// Wire up production services from config. The provider honors
    /// `LLM_MOCK`; renderer and extractor are the HTTP collaborators.
    pub fn build(config: Arc<Config>) -> cvt_domain::Result<Self> {
        let primary = Arc::new(FilePrimaryStore::new(
            &config.storage.state_path,
            config.storage.property_limit_bytes,
        )?);
        let blobs = Arc::new(FsBlobStore::new(&config.storage.state_path)?);
        let store = Arc::new(SessionStore::new(
            primary,
            blobs,
            config.storage.write_retries,
        ));
        let search = Arc::new(SessionIndex::build_from_store(&store));

        let provider = cvt_providers::create_provider(&config)?;
        let caller = Arc::new(StageCaller::new(provider, config.llm.clone()));

        let renderer: Arc<dyn Renderer> = if config.flags.llm_mock {
            // Mock mode covers the renderer too; local runs stay offline.
            Arc::new(cvt_render::MockRenderer::default())
        } else {
            Arc::new(cvt_render::HttpRenderer::from_config(&config.renderer)?)
        };
        let extractor: Arc<dyn DocxExtractor> = if config.flags.llm_mock {
            Arc::new(cvt_render::MockDocxExtractor)
        } else {
            Arc::new(cvt_render::HttpDocxExtractor::from_config(&config.renderer)?)
        };

        Ok(Self {
            config,
            store,
            search,
            caller,
            renderer,
            extractor,
            session_locks: Arc::new(SessionLockMap::new()),
        })
    }
}
