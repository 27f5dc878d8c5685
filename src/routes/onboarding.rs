use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Onboarding Router Module
///
/// Nested under the configured onboarding path (default `/onboarding`). The gate admits only
/// authenticated sessions whose role is still unset; everyone else is redirected before the
/// handlers run.
pub fn onboarding_routes() -> Router<AppState> {
    Router::new()
        // GET /onboarding/items
        // The properties offered on the TENANT selection step.
        .route("/items", get(handlers::list_onboarding_items))
        // POST /onboarding/commit
        // The single atomic commit that ends onboarding.
        .route("/commit", post(handlers::commit_onboarding))
}
