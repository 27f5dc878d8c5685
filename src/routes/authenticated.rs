use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Application routes for onboarded accounts. Sessions without a role never reach these
/// handlers; the gate sends them to onboarding first.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /
        // Landing page after onboarding; the caller's profile.
        .route("/", get(handlers::get_me))
        // GET /me
        .route("/me", get(handlers::get_me))
        // GET /me/properties
        // Properties owned by the caller.
        .route("/me/properties", get(handlers::get_my_properties))
        // GET/POST /properties
        // List every property; owners may add more.
        .route(
            "/properties",
            get(handlers::list_properties).post(handlers::create_property),
        )
        // GET /properties/latest
        .route("/properties/latest", get(handlers::get_latest_property))
}
