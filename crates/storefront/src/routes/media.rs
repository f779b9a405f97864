//! Image proxy redirect.

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::instrument;

use crate::media::MediaError;
use crate::state::AppState;

/// Signed proxy URLs are stable, so browsers may cache the redirect.
const REDIRECT_CACHE_CONTROL: &str = "public, max-age=3600";

fn message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// `GET /media/{file}`
///
/// Redirects (302) to the signed image proxy URL for `file`.
#[instrument(skip(state))]
pub async fn redirect(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    let Some(signer) = state.media() else {
        tracing::error!("Media proxy requested but not configured");
        return message(StatusCode::INTERNAL_SERVER_ERROR, "Media proxy not configured");
    };

    match signer.signed_url(file.trim()) {
        Ok(url) => (
            StatusCode::FOUND,
            [
                (header::LOCATION, url),
                (header::CACHE_CONTROL, REDIRECT_CACHE_CONTROL.to_string()),
            ],
        )
            .into_response(),
        Err(MediaError::EmptyFile) => {
            message(StatusCode::BAD_REQUEST, &MediaError::EmptyFile.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to sign media path");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Media proxy not configured")
        }
    }
}
