//! HTTP routes.
//!
//! Thin request/response glue: validate inputs, call the engine, encode
//! the outcome. All game behavior lives in spellbound-core.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use spellbound_core::{EngineError, GameEngine, PlayerState, StartOutcome, TurnOutcome};

/// House assigned when a start request does not name one.
const DEFAULT_HOUSE: &str = "Gryffindor";

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<GameEngine>> {
    Router::new()
        .route("/health", get(health))
        .route("/start", post(start))
        .route("/action", post(action))
        .route("/state/{player_name}", get(state))
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    #[serde(default)]
    player_name: String,
    #[serde(default)]
    house: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionRequest {
    #[serde(default)]
    player_name: String,
    #[serde(default)]
    action: String,
}

async fn start(
    State(engine): State<Arc<GameEngine>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartOutcome>, ApiError> {
    let player_name = req.player_name.trim();
    if player_name.is_empty() {
        return Err(ApiError::BadRequest("Player name required".to_string()));
    }

    let house = req
        .house
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or(DEFAULT_HOUSE);

    let outcome = engine.start_game(player_name, house).await?;
    Ok(Json(outcome))
}

async fn action(
    State(engine): State<Arc<GameEngine>>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<TurnOutcome>, ApiError> {
    let player_name = req.player_name.trim();
    let action = req.action.trim();
    if player_name.is_empty() || action.is_empty() {
        return Err(ApiError::BadRequest(
            "Player name and action required".to_string(),
        ));
    }

    let outcome = engine.take_action(player_name, action).await?;
    Ok(Json(outcome))
}

async fn state(
    State(engine): State<Arc<GameEngine>>,
    Path(player_name): Path<String>,
) -> Result<Json<PlayerState>, ApiError> {
    let player_name = player_name.trim();
    if player_name.is_empty() {
        return Err(ApiError::BadRequest("Player name required".to_string()));
    }

    let state = engine.player_state(player_name).await?;
    Ok(Json(state))
}

/// API-level errors with an HTTP mapping.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::BadRequest(msg) => (
                axum::http::StatusCode::BAD_REQUEST,
                Json(json!({ "error": msg })),
            )
                .into_response(),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "turn failed");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "The narrator is unavailable right now." })),
                )
                    .into_response()
            }
        }
    }
}
