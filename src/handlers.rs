use crate::{
    AppState,
    commit::{CommitError, validate_request},
    models::{
        self, CommitReceipt, CommitRequest, CreatePropertyRequest, ErrorBody, ListableItem,
        Property, Role, Session, UserProfile,
    },
};
use axum::{Json, extract::State, http::StatusCode};

// --- Onboarding ---

/// list_onboarding_items
///
/// [Onboarding Route] Every property a TENANT may attach to. Read-only.
#[utoipa::path(
    get,
    path = "/onboarding/items",
    responses((status = 200, description = "Selectable properties", body = [ListableItem]))
)]
pub async fn list_onboarding_items(
    _session: Session,
    State(state): State<AppState>,
) -> Json<Vec<models::ListableItem>> {
    Json(state.repo.list_items().await)
}

/// commit_onboarding
///
/// [Onboarding Route] The Commit Service endpoint. Validates the submission, then records the
/// role and its associations for the session's user in one transaction.
///
/// The gate only lets role-less sessions reach this handler; a concurrent commit that won the
/// race still surfaces here as 409.
#[utoipa::path(
    post,
    path = "/onboarding/commit",
    request_body = CommitRequest,
    responses(
        (status = 200, description = "Role recorded", body = CommitReceipt),
        (status = 400, description = "Invalid submission", body = ErrorBody),
        (status = 404, description = "Selected property does not exist", body = ErrorBody),
        (status = 409, description = "Role already set", body = ErrorBody),
        (status = 503, description = "Storage unavailable, retry", body = ErrorBody)
    )
)]
pub async fn commit_onboarding(
    session: Session,
    State(state): State<AppState>,
    Json(payload): Json<CommitRequest>,
) -> Result<Json<CommitReceipt>, CommitError> {
    let role = payload.role();

    if let Err(e) = validate_request(&payload) {
        tracing::debug!(user_id = %session.user_id, ?role, "rejected onboarding submission: {}", e);
        return Err(e);
    }

    match state.repo.commit_onboarding(session.user_id, payload).await {
        Ok(receipt) => {
            tracing::info!(
                user_id = %session.user_id,
                ?role,
                records = receipt.property_ids.len(),
                "onboarding committed"
            );
            Ok(Json(receipt))
        }
        Err(e) => {
            match &e {
                CommitError::Transient(_) => {
                    tracing::error!(user_id = %session.user_id, "onboarding commit failed: {}", e)
                }
                _ => tracing::warn!(user_id = %session.user_id, "onboarding commit refused: {}", e),
            }
            Err(e)
        }
    }
}

// --- Protected ---

/// get_me
///
/// [Protected Route] The caller's profile. Also served at `/` as the landing page.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Profile no longer exists")
    )
)]
pub async fn get_me(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, StatusCode> {
    state
        .repo
        .get_user(session.user_id)
        .await
        .map(|user| Json(UserProfile::from(user)))
        .ok_or(StatusCode::UNAUTHORIZED)
}

/// list_properties
///
/// [Protected Route] All properties.
#[utoipa::path(
    get,
    path = "/properties",
    responses((status = 200, description = "Properties", body = [ListableItem]))
)]
pub async fn list_properties(
    _session: Session,
    State(state): State<AppState>,
) -> Json<Vec<models::ListableItem>> {
    Json(state.repo.list_items().await)
}

/// create_property
///
/// [Protected Route] Adds a property owned by the caller. Only OWNER accounts may do this.
#[utoipa::path(
    post,
    path = "/properties",
    request_body = CreatePropertyRequest,
    responses(
        (status = 201, description = "Created", body = Property),
        (status = 400, description = "Empty name"),
        (status = 403, description = "Not an owner")
    )
)]
pub async fn create_property(
    session: Session,
    State(state): State<AppState>,
    Json(payload): Json<CreatePropertyRequest>,
) -> Result<(StatusCode, Json<models::Property>), StatusCode> {
    if session.role != Some(Role::Owner) {
        return Err(StatusCode::FORBIDDEN);
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    state
        .repo
        .create_property(session.user_id, name.to_string())
        .await
        .map(|property| (StatusCode::CREATED, Json(property)))
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// get_latest_property
///
/// [Protected Route] The caller's most recently created property.
#[utoipa::path(
    get,
    path = "/properties/latest",
    responses(
        (status = 200, description = "Latest property", body = Property),
        (status = 404, description = "Caller owns no property")
    )
)]
pub async fn get_latest_property(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<models::Property>, StatusCode> {
    state
        .repo
        .get_latest_property(session.user_id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// get_my_properties
///
/// [Protected Route] Properties owned by the caller, newest first.
#[utoipa::path(
    get,
    path = "/me/properties",
    responses((status = 200, description = "My properties", body = [Property]))
)]
pub async fn get_my_properties(
    session: Session,
    State(state): State<AppState>,
) -> Json<Vec<models::Property>> {
    Json(state.repo.get_my_properties(session.user_id).await)
}
