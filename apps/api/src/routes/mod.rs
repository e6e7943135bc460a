pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::layout::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Layout API
        .route("/api/v1/layouts", post(handlers::handle_generate_layout))
        .route(
            "/api/v1/layouts/stream",
            post(handlers::handle_generate_layout_stream),
        )
        .route(
            "/api/v1/designs/variations",
            post(handlers::handle_design_variations),
        )
        // Raw completions
        .route(
            "/api/v1/completions/stream",
            post(handlers::handle_completion_stream),
        )
        .with_state(state)
}
