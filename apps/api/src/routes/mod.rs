pub mod health;

use axum::{routing::get, routing::post, Router};

use crate::jobs::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Jobs API
        .route("/api/v1/jobs", post(handlers::handle_submit_job))
        .route("/api/v1/jobs/:id", get(handlers::handle_get_job))
        .route(
            "/api/v1/artifacts/:filename",
            get(handlers::handle_download_artifact),
        )
        .with_state(state)
}
