//! End-to-end wizard scenarios, driven through the tool entry point with
//! mock collaborators (fixture LLM, deterministic renderer, tempdir stores).

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use cvt_domain::config::Config;
use cvt_domain::error::Error;
use cvt_gateway::runtime::session_lock::SessionLockMap;
use cvt_gateway::runtime::tools::{execute, ToolOutcome, ToolRequest};
use cvt_gateway::state::AppState;
use cvt_providers::{MockProvider, StageCaller};
use cvt_render::{MockDocxExtractor, MockRenderer};
use cvt_sessions::{FilePrimaryStore, FsBlobStore, SessionIndex, SessionStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Harness {
    state: AppState,
    mock: Arc<MockProvider>,
}

fn harness(dir: &Path) -> Harness {
    let mut config = Config::default();
    config.storage.state_path = dir.to_path_buf();
    config.flags.llm_mock = true;

    let primary = Arc::new(
        FilePrimaryStore::new(dir, config.storage.property_limit_bytes).unwrap(),
    );
    let blobs = Arc::new(FsBlobStore::new(dir).unwrap());
    let store = Arc::new(SessionStore::new(primary, blobs, config.storage.write_retries));

    let mock = Arc::new(MockProvider::new());
    let caller = Arc::new(StageCaller::new(mock.clone(), config.llm.clone()));

    let state = AppState {
        config: Arc::new(config),
        store,
        search: Arc::new(SessionIndex::new()),
        caller,
        renderer: Arc::new(MockRenderer::default()),
        extractor: Arc::new(MockDocxExtractor),
        session_locks: Arc::new(SessionLockMap::new()),
    };
    Harness { state, mock }
}

async fn call(
    state: &AppState,
    tool: &str,
    session_id: Option<&str>,
    params: Value,
) -> cvt_domain::Result<ToolOutcome> {
    execute(
        state,
        ToolRequest {
            tool_name: tool.into(),
            session_id: session_id.map(String::from),
            params,
        },
    )
    .await
}

async fn call_json(
    state: &AppState,
    tool: &str,
    session_id: Option<&str>,
    params: Value,
) -> Value {
    match call(state, tool, session_id, params).await.unwrap() {
        ToolOutcome::Json(v) => v,
        ToolOutcome::Pdf { .. } => panic!("expected JSON from {tool}"),
    }
}

async fn action(
    state: &AppState,
    session_id: &str,
    action_id: &str,
    payload: Value,
) -> cvt_domain::Result<ToolOutcome> {
    call(
        state,
        "process_cv_orchestrated",
        Some(session_id),
        json!({ "action_id": action_id, "payload": payload }),
    )
    .await
}

async fn bootstrap(state: &AppState) -> String {
    let out = call_json(state, "bootstrap_session", None, json!({})).await;
    out["session_id"].as_str().unwrap().to_owned()
}

/// Bring a session to the point where the readiness gate opens: contact +
/// one role + one education entry, both sections confirmed.
async fn make_ready(state: &AppState) -> String {
    let sid = bootstrap(state).await;
    call_json(
        state,
        "update_field",
        Some(&sid),
        json!({ "edits": [
            { "path": "full_name", "value": "John Doe" },
            { "path": "email", "value": "j@d.com" },
            { "path": "phone", "value": "+1 555" },
            { "path": "work_experience", "value": [
                { "date_range": "2020–2024", "employer": "Acme", "title": "Eng",
                  "bullets": ["Led team", "Shipped X"] }
            ]},
            { "path": "education", "value": [
                { "date_range": "2016–2020", "institution": "MIT", "title": "BSc",
                  "details": [] }
            ]}
        ]}),
    )
    .await;
    action(state, &sid, "CONTACT_CONFIRM", json!({})).await.unwrap();
    action(state, &sid, "EDUCATION_CONFIRM", json!({})).await.unwrap();
    sid
}

fn job_posting_fixture() -> Value {
    json!({
        "role_title": "Data Engineer",
        "company": "Globex",
        "location": "Berlin",
        "responsibilities": ["Build pipelines"],
        "must_haves": ["Python"],
        "nice_to_haves": [],
        "tools_tech": ["Python"],
        "keywords": ["ETL"]
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario 1 — empty work experience blocks generation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn empty_session_blocks_generation_with_missing_list() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let sid = bootstrap(&h.state).await;

    let err = call(&h.state, "generate_cv_from_session", Some(&sid), json!({}))
        .await
        .unwrap_err();
    match err {
        Error::ReadinessNotMet { missing } => {
            for expected in [
                "work_experience",
                "education",
                "contact_confirmed",
                "education_confirmed",
            ] {
                assert!(
                    missing.iter().any(|m| m == expected),
                    "missing should contain {expected}, got {missing:?}"
                );
            }
        }
        other => panic!("expected ReadinessNotMet, got {other:?}"),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario 2 — happy path
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn happy_path_generates_two_page_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let sid = make_ready(&h.state).await;

    let report = call_json(&h.state, "validate_cv", Some(&sid), json!({})).await;
    assert_eq!(report["ok"], json!(true));
    assert_eq!(report["warnings"].as_array().unwrap().len(), 0);

    let outcome = call(&h.state, "generate_cv_from_session", Some(&sid), json!({}))
        .await
        .unwrap();
    let meta = match outcome {
        ToolOutcome::Pdf { bytes, meta, .. } => {
            assert!(bytes.starts_with(b"%PDF"));
            meta
        }
        _ => panic!("expected PDF"),
    };
    assert_eq!(meta["page_count"], json!(2));
    assert_eq!(meta["cache_hit"], json!(false));

    // The session holds a compact ref with the content signature.
    let session = call_json(&h.state, "get_session", Some(&sid), json!({})).await;
    let cv_ref = &session["metadata"]["pdf_refs"]["cv"];
    assert!(cv_ref["blob_key"].as_str().unwrap().starts_with("cv-pdfs/"));
    assert!(!cv_ref["content_signature"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn unchanged_cv_with_latch_reuses_cached_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let sid = make_ready(&h.state).await;

    let first = call(&h.state, "generate_cv_from_session", Some(&sid), json!({}))
        .await
        .unwrap();
    let second = call(&h.state, "generate_cv_from_session", Some(&sid), json!({}))
        .await
        .unwrap();
    let (meta1, meta2) = match (first, second) {
        (ToolOutcome::Pdf { meta: m1, .. }, ToolOutcome::Pdf { meta: m2, .. }) => (m1, m2),
        _ => panic!("expected PDFs"),
    };
    assert_eq!(meta2["cache_hit"], json!(true));
    assert_eq!(meta1["pdf_ref"]["blob_key"], meta2["pdf_ref"]["blob_key"]);
    assert_eq!(
        meta1["pdf_ref"]["content_signature"],
        meta2["pdf_ref"]["content_signature"]
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario 3 — cover letter always regenerates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn cover_letter_never_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let sid = make_ready(&h.state).await;

    h.mock.stage_fixture("job_posting", job_posting_fixture());
    h.mock.stage_fixture(
        "cover_letter",
        json!({
            "salutation": "Dear Hiring Team,",
            "paragraphs": [
                "Your Data Engineer opening matches the delivery work I led at Acme.",
                "I would be glad to bring that to Globex."
            ],
            "closing": "Kind regards"
        }),
    );
    action(&h.state, &sid, "JOB_POSTING_EXTRACT", json!({ "posting_text": "We need you" }))
        .await
        .unwrap();

    let first = call(
        &h.state,
        "generate_cover_letter_from_session",
        Some(&sid),
        json!({}),
    )
    .await
    .unwrap();
    let second = call(
        &h.state,
        "generate_cover_letter_from_session",
        Some(&sid),
        json!({}),
    )
    .await
    .unwrap();

    let (meta1, meta2) = match (first, second) {
        (ToolOutcome::Pdf { meta: m1, .. }, ToolOutcome::Pdf { meta: m2, .. }) => (m1, m2),
        _ => panic!("expected PDFs"),
    };
    // Identical content, yet a distinct ref every run.
    assert_ne!(
        meta1["pdf_ref"]["blob_key"],
        meta2["pdf_ref"]["blob_key"]
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario 4 — work tailoring replace-all
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn work_tailor_accept_replaces_all_roles() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let sid = make_ready(&h.state).await;

    // Grow the history to five roles.
    let roles: Vec<Value> = (0..5)
        .map(|i| {
            json!({ "date_range": format!("201{i}"), "employer": format!("Employer{i}"),
                    "title": "Engineer", "bullets": ["Ran projects", "Owned delivery"] })
        })
        .collect();
    call_json(
        &h.state,
        "update_field",
        Some(&sid),
        json!({ "path": "work_experience", "value": roles }),
    )
    .await;

    h.mock.stage_fixture("job_posting", job_posting_fixture());
    h.mock.stage_fixture(
        "work_experience",
        json!({ "roles": [
            { "date_range": "2010", "employer": "Employer0", "title": "Engineer",
              "bullets": ["Ran projects", "Owned delivery", "Ran projects"] },
            { "date_range": "2011", "employer": "Employer1", "title": "Engineer",
              "bullets": ["Ran projects", "Owned delivery", "Owned delivery"] },
            { "date_range": "2012", "employer": "Employer2", "title": "Engineer",
              "bullets": ["Ran projects", "Owned delivery", "Ran projects"] }
        ]}),
    );

    action(&h.state, &sid, "JOB_POSTING_EXTRACT", json!({ "posting_text": "posting" }))
        .await
        .unwrap();
    action(&h.state, &sid, "WORK_TAILOR_RUN", json!({})).await.unwrap();
    action(&h.state, &sid, "WORK_TAILOR_ACCEPT", json!({})).await.unwrap();

    let session = call_json(&h.state, "get_session", Some(&sid), json!({})).await;
    let work = session["cv_data"]["work_experience"].as_array().unwrap();
    assert_eq!(work.len(), 3);
    let employers: Vec<&str> = work
        .iter()
        .map(|r| r["employer"].as_str().unwrap())
        .collect();
    assert!(!employers.contains(&"Employer3"));
    assert!(!employers.contains(&"Employer4"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario 5 — oversized metadata is crash-proof
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn oversized_proposal_offloads_instead_of_crashing() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let sid = bootstrap(&h.state).await;

    let mut record = h.state.store.get(&sid).unwrap();
    let big_proposal = json!({ "raw": "x".repeat(120 * 1024) });
    record
        .metadata
        .proposal_cache
        .insert("work_experience:sig:sig".into(), big_proposal.clone());
    h.state.store.put(&mut record).unwrap();

    // Primary record carries a pointer, not the payload.
    let raw = h.state.store.get_raw(&sid).unwrap().unwrap();
    let stored = raw
        .get("metadata")
        .and_then(|m| m.get("proposal_cache"))
        .unwrap();
    assert!(
        cvt_domain::session::OffloadRef::matches(stored),
        "proposal_cache should be offloaded, got {stored}"
    );

    // Blob-aware read restores the structure.
    let loaded = h.state.store.get(&sid).unwrap();
    assert_eq!(
        loaded.metadata.proposal_cache["work_experience:sig:sig"],
        big_proposal
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenario 6 — translation snapshotting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn translation_snapshots_and_flips_without_llm() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let sid = bootstrap(&h.state).await;

    call_json(
        &h.state,
        "update_field",
        Some(&sid),
        json!({ "edits": [
            { "path": "language", "value": "pl" },
            { "path": "full_name", "value": "Jan Kowalski" },
            { "path": "email", "value": "jan@k.pl" },
            { "path": "phone", "value": "+48 600 000 000" },
            { "path": "work_experience", "value": [
                { "date_range": "2020–2024", "employer": "Acme", "title": "Inżynier",
                  "bullets": ["Prowadził zespół"] }
            ]},
            { "path": "education", "value": [
                { "date_range": "2016–2020", "institution": "PW", "title": "Magister",
                  "details": [] }
            ]}
        ]}),
    )
    .await;

    // Fixture: the same résumé with translated free text.
    let record = h.state.store.get(&sid).unwrap();
    let mut translated = record.cv_data.clone();
    translated.work_experience[0].title = "Engineer".into();
    translated.work_experience[0].bullets = vec!["Led the team".into()];
    translated.education[0].title = "MSc".into();
    h.mock.stage_fixture(
        "bulk_translation",
        serde_json::to_value(&translated).unwrap(),
    );

    action(&h.state, &sid, "LANGUAGE_SELECT", json!({ "target_language": "en" }))
        .await
        .unwrap();
    action(&h.state, &sid, "TRANSLATE_RUN", json!({})).await.unwrap();

    let session = call_json(&h.state, "get_session", Some(&sid), json!({})).await;
    assert_eq!(session["metadata"]["active_state_id"], json!("translated_en"));
    assert_eq!(
        session["cv_data"]["work_experience"][0]["bullets"][0],
        json!("Led the team")
    );
    // Original snapshot untouched.
    assert_eq!(
        session["metadata"]["cv_state_snapshots"]["original"]["work_experience"][0]["bullets"][0],
        json!("Prowadził zespół")
    );
    assert_eq!(h.mock.call_count(Some("bulk_translation")), 1);

    // Back-navigate to the original; no further LLM call.
    action(
        &h.state,
        &sid,
        "WIZARD_GOTO_STAGE",
        json!({ "stage": "language-selection", "state_id": "original" }),
    )
    .await
    .unwrap();
    let session = call_json(&h.state, "get_session", Some(&sid), json!({})).await;
    assert_eq!(session["metadata"]["active_state_id"], json!("original"));
    assert_eq!(
        session["cv_data"]["work_experience"][0]["bullets"][0],
        json!("Prowadził zespół")
    );
    assert_eq!(h.mock.call_count(Some("bulk_translation")), 1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cross-cutting properties
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn bootstrap_action_rejected_on_existing_session() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let sid = bootstrap(&h.state).await;

    let err = action(&h.state, &sid, "extract_and_store_cv", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "stage_violation");
}

#[tokio::test]
async fn version_strictly_increases_and_history_tracks_stage() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let sid = bootstrap(&h.state).await;

    let before = call_json(&h.state, "get_session", Some(&sid), json!({})).await;
    let v1 = before["metadata"]["version"].as_u64().unwrap();

    action(&h.state, &sid, "CONTACT_CONFIRM", json!({})).await.unwrap();

    let after = call_json(&h.state, "get_session", Some(&sid), json!({})).await;
    let v2 = after["metadata"]["version"].as_u64().unwrap();
    assert!(v2 > v1);

    let history = after["metadata"]["stage_history"].as_array().unwrap();
    assert_eq!(history.last().unwrap(), &after["metadata"]["stage"]);
}

#[tokio::test]
async fn stage_gated_action_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let sid = bootstrap(&h.state).await;

    // Tailoring straight from language selection is out of order.
    let err = action(&h.state, &sid, "WORK_TAILOR_RUN", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "stage_violation");
}

#[tokio::test]
async fn update_field_round_trips_through_get_session() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let sid = bootstrap(&h.state).await;

    call_json(
        &h.state,
        "update_field",
        Some(&sid),
        json!({ "path": "profile", "value": "Builder of boring, reliable systems." }),
    )
    .await;
    let session = call_json(&h.state, "get_session", Some(&sid), json!({})).await;
    assert_eq!(
        session["cv_data"]["profile"],
        json!("Builder of boring, reliable systems.")
    );
}

#[tokio::test]
async fn session_search_finds_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let sid = bootstrap(&h.state).await;
    call_json(
        &h.state,
        "update_field",
        Some(&sid),
        json!({ "path": "full_name", "value": "Grace Hopper" }),
    )
    .await;

    let hits = call_json(&h.state, "session_search", None, json!({ "query": "hopper" })).await;
    assert_eq!(hits["count"], json!(1));
    assert_eq!(hits["hits"][0]["session_id"], json!(sid));
}

#[tokio::test]
async fn missing_session_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let err = call(
        &h.state,
        "get_session",
        Some("00000000-0000-0000-0000-000000000000"),
        json!({}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}
