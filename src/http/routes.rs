//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::app::AppState;
use crate::game::r#match::MatchPhase;
use crate::game::PlayerId;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/players", get(players_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    state: MatchPhase,
    players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        state: state.match_handle.phase(),
        players: state.match_handle.player_count(),
    })
}

// ============================================================================
// Roster projection
// ============================================================================

#[derive(Serialize)]
struct PlayerName {
    id: PlayerId,
    display_name: String,
}

/// Display-name projection of the roster, for UI rendering
async fn players_handler(State(state): State<AppState>) -> Json<Vec<PlayerName>> {
    let players = state
        .match_handle
        .roster()
        .into_iter()
        .map(|p| PlayerName {
            id: p.id,
            display_name: p.display_name,
        })
        .collect();
    Json(players)
}
