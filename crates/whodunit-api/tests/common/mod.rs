//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use whodunit_core::clock::Clock;
use whodunit_core::repository::SnapshotRepository;
use whodunit_generation::{GenerationAdapter, RetryPolicy};
use whodunit_session::application::engine::{EngineConfig, SessionEngine};
use whodunit_session::domain::script::InMemoryScriptCatalog;
use whodunit_snapshot_store::InMemorySnapshotRepository;
use whodunit_test_support::{FixedClock, MockRng, ScriptedGenerationService};

use whodunit_api::routes;
use whodunit_api::state::AppState;

/// Scripts served by every test app.
pub const SCRIPTS_YAML: &str = r#"
scripts:
  - script_id: manor
    title: Death at Ashcombe Manor
    max_acts: 2
    characters:
      - character_id: butler
        name: Mr. Hale
        description: Has served the family for thirty years.
      - character_id: cook
        name: Mrs. Prynne
        description: Rules the kitchen.
      - character_id: maid
        name: Ada
        description: New to the house.
"#;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// A test app together with its engine, so tests can wait for broadcasts.
pub struct TestApp {
    pub router: Router,
    pub engine: Arc<SessionEngine>,
}

impl TestApp {
    /// A fresh router sharing this app's state.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full app router over an in-memory store and echoing
/// generation. Uses the same route structure as `main.rs`.
pub fn build_test_app() -> TestApp {
    build_test_app_with(Arc::new(InMemorySnapshotRepository::new()), EngineConfig::default())
}

/// Build the full app router over `repository` with custom limits.
pub fn build_test_app_with(repository: Arc<dyn SnapshotRepository>, config: EngineConfig) -> TestApp {
    let catalog = InMemoryScriptCatalog::from_yaml_str(SCRIPTS_YAML).unwrap();
    let generation = Arc::new(GenerationAdapter::new(
        Arc::new(ScriptedGenerationService::echo()),
        RetryPolicy::default(),
        Box::new(MockRng),
    ));
    let engine = Arc::new(SessionEngine::new(
        Arc::new(catalog),
        repository,
        generation,
        fixed_clock(),
        config,
    ));
    let router = routes::build_router(AppState::new(Arc::clone(&engine)));

    TestApp { router, engine }
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Post an action to a session.
pub async fn act(
    app: &TestApp,
    session_id: &str,
    action: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    post_json(
        app.router(),
        &format!("/api/v1/sessions/{session_id}/actions"),
        &action,
    )
    .await
}
