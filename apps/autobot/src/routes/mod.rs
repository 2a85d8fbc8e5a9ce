pub mod automation;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/start", post(automation::handle_start))
        .route("/api/status", get(automation::handle_status))
        .with_state(state)
}
