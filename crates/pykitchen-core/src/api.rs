//! HTTP command surface.
//!
//! Each player action is one request; every command responds with the
//! verdict (for runs), the log entries it appended and the resulting
//! session snapshot. The same entries are streamed over `/api/ws`.
//!
//! # Endpoints
//!
//! - `GET /api/state` - Current session snapshot
//! - `GET /api/catalog` - Ingredients, tools and orders
//! - `POST /api/ingredient` - Pick an ingredient for placement
//! - `POST /api/tool` - Select a tool
//! - `POST /api/slots/:index` - Place the pending ingredient
//! - `DELETE /api/slots/:index` - Clear one slot
//! - `DELETE /api/slots` - Clear every slot
//! - `POST /api/run` - Run the selected tool
//! - `POST /api/hint` - Ask the chef for a hint
//! - `GET /api/ws` - Console event stream
//!
//! # Example
//!
//! ```no_run
//! use pykitchen_core::{create_router, AppState, Config, KitchenRuntime};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let catalog = config.load_catalog(std::path::Path::new("."))?;
//! let runtime = KitchenRuntime::from_config(&config, catalog)?;
//!
//! let router = create_router(AppState::new(runtime));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::engine::Verdict;
use crate::error::KitchenError;
use crate::event_log::LogEntry;
use crate::runtime::{HintDispatch, KitchenRuntime};
use crate::session::{SessionSnapshot, Transition};
use crate::websocket::ws_handler;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for selecting an ingredient or a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectRequest {
    /// Id (or name) of the ingredient or tool.
    pub id: String,
}

/// Response body for every game command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    /// Outcome of a run request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    /// Entries appended by the command, oldest first.
    pub events: Vec<LogEntry>,
    /// Session state after the command.
    pub state: SessionSnapshot,
}

/// Response body for the hint endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintResponse {
    /// Always `"started"`; the hint arrives as a log event.
    pub status: String,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The session being played.
    pub runtime: KitchenRuntime,
}

impl AppState {
    /// Creates a new `AppState` around a runtime.
    #[must_use]
    pub const fn new(runtime: KitchenRuntime) -> Self {
        Self { runtime }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// A command was rejected by the session.
    Kitchen(KitchenError),
    /// A hint request could not be started.
    HintUnavailable(String),
}

impl From<KitchenError> for ApiError {
    fn from(err: KitchenError) -> Self {
        Self::Kitchen(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Kitchen(err) => {
                let status = match &err {
                    KitchenError::UnknownIngredient { .. } | KitchenError::UnknownTool { .. } => {
                        StatusCode::NOT_FOUND
                    }
                    KitchenError::SlotOutOfRange { .. } | KitchenError::NoToolSelected => {
                        StatusCode::BAD_REQUEST
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            Self::HintUnavailable(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// Routes live under `/api`, with permissive CORS for a browser front end
/// and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/state", get(handle_state))
        .route("/catalog", get(handle_catalog))
        .route("/ingredient", post(handle_select_ingredient))
        .route("/tool", post(handle_select_tool))
        .route("/slots", delete(handle_clear_all))
        .route("/slots/:index", post(handle_place).delete(handle_clear_slot))
        .route("/run", post(handle_run))
        .route("/hint", post(handle_hint))
        .route("/ws", get(ws_handler));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

fn respond((transition, state): (Transition, SessionSnapshot)) -> Json<CommandResponse> {
    Json(CommandResponse {
        verdict: transition.verdict,
        events: transition.events,
        state,
    })
}

/// Handler for `GET /api/state`.
async fn handle_state(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.runtime.snapshot().await)
}

/// Handler for `GET /api/catalog`.
async fn handle_catalog(State(state): State<Arc<AppState>>) -> Json<Catalog> {
    Json(state.runtime.catalog().await.as_ref().clone())
}

/// Handler for `POST /api/ingredient`.
async fn handle_select_ingredient(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state
        .runtime
        .execute(|session| session.select_ingredient(&request.id))
        .await?;
    Ok(respond(outcome))
}

/// Handler for `POST /api/tool`.
async fn handle_select_tool(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state
        .runtime
        .execute(|session| session.select_tool(&request.id))
        .await?;
    Ok(respond(outcome))
}

/// Handler for `POST /api/slots/:index`.
async fn handle_place(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state.runtime.execute(|session| session.place(index)).await?;
    Ok(respond(outcome))
}

/// Handler for `DELETE /api/slots/:index`.
async fn handle_clear_slot(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state
        .runtime
        .execute(|session| session.clear_slot(index))
        .await?;
    Ok(respond(outcome))
}

/// Handler for `DELETE /api/slots`.
async fn handle_clear_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state
        .runtime
        .execute(|session| Ok(session.clear_all()))
        .await?;
    Ok(respond(outcome))
}

/// Handler for `POST /api/run`.
async fn handle_run(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state.runtime.execute(|session| Ok(session.run())).await?;
    if let Some(verdict) = &outcome.0.verdict {
        info!(?verdict, "Run requested over HTTP");
    }
    Ok(respond(outcome))
}

/// Handler for `POST /api/hint`.
async fn handle_hint(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<HintResponse>), ApiError> {
    match state.runtime.request_hint().await {
        HintDispatch::Started => Ok((
            StatusCode::ACCEPTED,
            Json(HintResponse {
                status: "started".to_string(),
            }),
        )),
        HintDispatch::Busy => {
            warn!("Hint request rejected: another request is in flight");
            Err(ApiError::HintUnavailable(
                "A hint request is already in progress".to_string(),
            ))
        }
        HintDispatch::Finished => Err(ApiError::HintUnavailable(
            "All orders are complete".to_string(),
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================
