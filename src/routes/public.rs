use crate::AppState;
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints classified as public by the gate's route table.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers; answers before any session work.
        .route("/health", get(|| async { "ok" }))
}
