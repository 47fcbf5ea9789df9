//! REST API for reference data maintenance.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Router};
use tracing::info;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/invalidate", post(invalidate_reference_data))
}

/// Drop the cached identity list so the next load refetches it
pub async fn invalidate_reference_data(State(state): State<AppState>) -> impl IntoResponse {
    info!("POST /api/reference/invalidate");
    state.reference_cache.invalidate();
    StatusCode::NO_CONTENT
}
