use axum::{
    Router,
    extract::{FromRef, FromRequestParts, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core: the access decision, the onboarding state machine and its commit contract.
pub mod commit;
pub mod gate;
pub mod wizard;

// Service plumbing around the core.
pub mod auth;
pub mod client;
pub mod config;
pub mod handlers;
pub mod models;
pub mod repository;

// Routing grouped by gate classification (public, onboarding, authenticated).
pub mod routes;
use routes::{authenticated, onboarding, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use gate::{Decision, RouteTable, decide};
pub use models::Session;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every handler and wire model, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_onboarding_items, handlers::commit_onboarding, handlers::get_me,
        handlers::list_properties, handlers::create_property, handlers::get_latest_property,
        handlers::get_my_properties
    ),
    components(
        schemas(
            models::Role, models::User, models::Session, models::Property, models::ListableItem,
            models::OwnerItem, models::CommitRequest, models::CommitReceipt,
            models::CreatePropertyRequest, models::UserProfile, models::ErrorBody,
        )
    ),
    tags(
        (name = "prop-agent", description = "Prop Agent onboarding and property API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container of services and configuration handed to every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// The loaded, immutable configuration, including the gate's route table.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// gate_middleware
///
/// The thin adapter around `gate::decide`: resolves the session (if any), asks the gate, and
/// either forwards the request or answers with a `303 See Other` redirect. A resolved session
/// is stored in the request extensions so handlers do not resolve it a second time.
async fn gate_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let session = Session::from_request_parts(&mut parts, &state).await.ok();

    let decision = decide(
        session.as_ref(),
        parts.uri.path(),
        &state.config.routes,
        Utc::now(),
    );

    match decision {
        Decision::Allow => {
            if let Some(session) = session {
                parts.extensions.insert(session);
            }
            next.run(Request::from_parts(parts, body)).await
        }
        Decision::Redirect(target) => {
            tracing::debug!(
                path = %parts.uri.path(),
                user_id = ?session.as_ref().map(|s| s.user_id),
                %target,
                "gate redirect"
            );
            Redirect::to(&target).into_response()
        }
    }
}

/// create_router
///
/// Assembles the routes, puts every one of them behind the Access Gate, and adds the
/// observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest(
            &state.config.routes.onboarding_path,
            onboarding::onboarding_routes(),
        )
        .merge(authenticated::authenticated_routes())
        // Unmatched paths are gated too, so probing never bypasses the redirect table.
        .layer(middleware::from_fn_with_state(state.clone(), gate_middleware))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for every HTTP request, correlated by the `x-request-id` header.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
