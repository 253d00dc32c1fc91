use axum::{extract::State, http::StatusCode};
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> StatusCode {
    match state.mongo.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::error!("health check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
