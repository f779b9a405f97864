//! Health check endpoints.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness report.
#[derive(Debug, Serialize)]
pub struct Readiness {
    pub status: &'static str,
    pub search: bool,
    pub media: bool,
}

/// Readiness health check endpoint.
///
/// Reports which optional backends are enabled.
pub async fn readiness(State(state): State<AppState>) -> Json<Readiness> {
    Json(Readiness {
        status: "ok",
        search: state.search().is_some(),
        media: state.media().is_some(),
    })
}
