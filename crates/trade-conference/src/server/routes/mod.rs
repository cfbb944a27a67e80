//! API routes for the conference server

pub mod conferences;

use axum::{
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/conferences", post(conferences::create_conference))
        .route("/conferences", get(conferences::list_conferences))
        .route("/conferences/:id", get(conferences::get_conference))
        .route("/conferences/:id/status", get(conferences::get_conference_status))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "trade-conference",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Asynchronous trade-compliance document conference",
        "endpoints": {
            "POST /api/conferences": "Submit already-stored files for analysis",
            "GET /api/conferences": "List jobs and queue stats",
            "GET /api/conferences/:id/status": "Poll job progress",
            "GET /api/conferences/:id": "Full job with per-file results",
            "GET /health": "Liveness",
            "GET /ready": "Readiness (workers started)"
        }
    }))
}
