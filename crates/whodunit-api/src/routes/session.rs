//! Routes for running game sessions.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use whodunit_session::application::engine::ActionResult;
use whodunit_session::application::query_handlers::SessionStatus;
use whodunit_session::domain::commands::{Action, JoinSession, StartSession, SubmitAction};

use super::ApiResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /api/v1/sessions.
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// The script to play.
    pub script_id: String,
    /// The player creating the session.
    pub creator_id: String,
}

/// Request body for POST /api/v1/sessions/{session_id}/join.
#[derive(Debug, Deserialize)]
pub struct JoinSessionRequest {
    /// The joining player.
    pub player_id: String,
    /// The character to occupy.
    pub character_id: String,
}

/// Query string of GET /api/v1/sessions/{session_id}/status.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    /// Include the full Q&A, mission and final choice history.
    #[serde(default)]
    pub include_history: bool,
}

/// POST /api/v1/sessions
#[instrument(skip(state, request), fields(script_id = %request.script_id))]
async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SessionStatus>>), ApiError> {
    let command = StartSession {
        correlation_id: Uuid::new_v4(),
        script_id: request.script_id,
        creator_id: request.creator_id,
    };

    info!(correlation_id = %command.correlation_id, "handling start_session command");

    let status = state.engine.start_session(&command).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(status))))
}

/// POST /api/v1/sessions/{session_id}/join
#[instrument(skip(state, request), fields(player_id = %request.player_id))]
async fn join_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<JoinSessionRequest>,
) -> Result<Json<ApiResponse<SessionStatus>>, ApiError> {
    let command = JoinSession {
        correlation_id: Uuid::new_v4(),
        session_id,
        player_id: request.player_id,
        character_id: request.character_id,
    };

    info!(correlation_id = %command.correlation_id, "handling join_session command");

    let status = state.engine.join(&command).await?;

    Ok(Json(ApiResponse::ok(status)))
}

/// POST /api/v1/sessions/{session_id}/actions
#[instrument(skip(state, action), fields(action_type = action.action_type()))]
async fn submit_action(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(action): Json<Action>,
) -> Result<Json<ApiResponse<ActionResult>>, ApiError> {
    let command = SubmitAction {
        correlation_id: Uuid::new_v4(),
        session_id,
        action,
    };

    info!(correlation_id = %command.correlation_id, "handling submit_action command");

    let result = state.engine.process_action(&command).await?;

    Ok(Json(ApiResponse::ok(result)))
}

/// GET /api/v1/sessions/{session_id}/status
#[instrument(skip(state))]
async fn get_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ApiResponse<SessionStatus>>, ApiError> {
    let status = state
        .engine
        .get_status(session_id, query.include_history)
        .await?;

    Ok(Json(ApiResponse::ok(status)))
}

/// Returns the router for the session endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/sessions", post(start_session))
        .route("/api/v1/sessions/{session_id}/join", post(join_session))
        .route("/api/v1/sessions/{session_id}/actions", post(submit_action))
        .route("/api/v1/sessions/{session_id}/status", get(get_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::TimeZone;
    use serde_json::Value;
    use tower::ServiceExt;
    use whodunit_core::repository::SnapshotRepository;
    use whodunit_generation::{GenerationAdapter, RetryPolicy};
    use whodunit_session::application::engine::{EngineConfig, SessionEngine};
    use whodunit_session::domain::script::{CharacterProfile, InMemoryScriptCatalog, Script};
    use whodunit_test_support::{
        FailingSnapshotRepository, FixedClock, MockRng, RecordingSnapshotRepository,
        ScriptedGenerationService,
    };

    fn parlour_script() -> Script {
        let profile = |id: &str, name: &str| CharacterProfile {
            character_id: id.to_owned(),
            name: name.to_owned(),
            description: format!("{name} was in the parlour."),
            avatar: None,
        };
        Script {
            script_id: "parlour".to_owned(),
            title: "Murder in the Parlour".to_owned(),
            max_acts: Some(2),
            characters: vec![
                profile("colonel", "Colonel Vane"),
                profile("widow", "Mrs. Ashdown"),
            ],
        }
    }

    fn app_state_with(repository: Arc<dyn SnapshotRepository>) -> AppState {
        let clock = Arc::new(FixedClock(
            chrono::Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ));
        let generation = Arc::new(GenerationAdapter::new(
            Arc::new(ScriptedGenerationService::echo()),
            RetryPolicy::default(),
            Box::new(MockRng),
        ));
        let catalog = Arc::new(InMemoryScriptCatalog::new(vec![parlour_script()]));
        let engine = SessionEngine::new(
            catalog,
            repository,
            generation,
            clock,
            EngineConfig::default(),
        );
        AppState::new(Arc::new(engine))
    }

    fn test_app_state() -> AppState {
        app_state_with(Arc::new(RecordingSnapshotRepository::new()))
    }

    fn post(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body_bytes).unwrap()
    }

    async fn start(state: &AppState) -> Uuid {
        let response = router()
            .with_state(state.clone())
            .oneshot(post(
                "/api/v1/sessions",
                &serde_json::json!({ "script_id": "parlour", "creator_id": "host" }),
            ))
            .await
            .unwrap();
        let json = read_json(response).await;
        json["data"]["session_id"].as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn test_start_session_returns_201_with_status() {
        // Arrange
        let app = router().with_state(test_app_state());
        let body = serde_json::json!({ "script_id": "parlour", "creator_id": "host" });

        // Act
        let response = app.oneshot(post("/api/v1/sessions", &body)).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = read_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["title"], "Murder in the Parlour");
        assert_eq!(json["data"]["current_phase"], "initialization");
        assert_eq!(json["data"]["current_act"], 1);
        assert_eq!(json["data"]["max_acts"], 2);
        assert_eq!(json["data"]["characters"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_start_session_returns_404_for_unknown_script() {
        // Arrange
        let app = router().with_state(test_app_state());
        let body = serde_json::json!({ "script_id": "lighthouse", "creator_id": "host" });

        // Act
        let response = app.oneshot(post("/api/v1/sessions", &body)).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = read_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "script_not_found");
    }

    #[tokio::test]
    async fn test_start_session_returns_500_when_store_fails() {
        // Arrange
        let app = router().with_state(app_state_with(Arc::new(FailingSnapshotRepository)));
        let body = serde_json::json!({ "script_id": "parlour", "creator_id": "host" });

        // Act
        let response = app.oneshot(post("/api/v1/sessions", &body)).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = read_json(response).await;
        assert_eq!(json["error"]["kind"], "persistence");
    }

    #[tokio::test]
    async fn test_join_returns_409_when_character_taken() {
        // Arrange
        let state = test_app_state();
        let session_id = start(&state).await;
        let uri = format!("/api/v1/sessions/{session_id}/join");
        let first = router()
            .with_state(state.clone())
            .oneshot(post(
                &uri,
                &serde_json::json!({ "player_id": "alice", "character_id": "colonel" }),
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        // Act
        let response = router()
            .with_state(state)
            .oneshot(post(
                &uri,
                &serde_json::json!({ "player_id": "bob", "character_id": "colonel" }),
            ))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = read_json(response).await;
        assert_eq!(json["error"]["kind"], "already_assigned");
    }

    #[tokio::test]
    async fn test_action_in_wrong_phase_returns_409() {
        // Arrange
        let state = test_app_state();
        let session_id = start(&state).await;
        let body = serde_json::json!({ "action_type": "monologue", "character_id": "colonel" });

        // Act
        let response = router()
            .with_state(state)
            .oneshot(post(&format!("/api/v1/sessions/{session_id}/actions"), &body))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = read_json(response).await;
        assert_eq!(json["error"]["kind"], "invalid_transition");
    }

    #[tokio::test]
    async fn test_advance_phase_returns_action_result() {
        // Arrange
        let state = test_app_state();
        let session_id = start(&state).await;
        let body = serde_json::json!({ "action_type": "advance_phase" });

        // Act
        let response = router()
            .with_state(state)
            .oneshot(post(&format!("/api/v1/sessions/{session_id}/actions"), &body))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["data"]["action_type"], "advance_phase");
        assert_eq!(json["data"]["from"], "initialization");
        assert_eq!(json["data"]["to"], "monologue");
        assert_eq!(json["data"]["current_phase"], "monologue");
        assert_eq!(json["data"]["act_advanced"], false);
    }

    #[tokio::test]
    async fn test_unknown_action_type_is_rejected() {
        // Arrange
        let state = test_app_state();
        let session_id = start(&state).await;
        let body = serde_json::json!({ "action_type": "summon_ghost" });

        // Act
        let response = router()
            .with_state(state)
            .oneshot(post(&format!("/api/v1/sessions/{session_id}/actions"), &body))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_status_returns_404_for_unknown_session() {
        // Arrange
        let app = router().with_state(test_app_state());
        let request = Request::builder()
            .method("GET")
            .uri(format!("/api/v1/sessions/{}/status", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();

        // Act
        let response = app.oneshot(request).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = read_json(response).await;
        assert_eq!(json["error"]["kind"], "session_not_found");
    }

    #[tokio::test]
    async fn test_status_includes_history_on_request() {
        // Arrange
        let state = test_app_state();
        let session_id = start(&state).await;
        let request = Request::builder()
            .method("GET")
            .uri(format!(
                "/api/v1/sessions/{session_id}/status?include_history=true"
            ))
            .body(Body::empty())
            .unwrap();

        // Act
        let response = router().with_state(state).oneshot(request).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["data"]["qna_history"], serde_json::json!([]));
        assert_eq!(json["data"]["final_choices"], serde_json::json!([]));
    }
}
