//! Commit Service contract.
//!
//! The onboarding flow ends in exactly one call that atomically records the role and the
//! role-specific associations. This module holds the contract (`CommitService`), the error
//! taxonomy shared by server and client, the server-side request validation, and an in-process
//! implementation bound to a repository.

use async_trait::async_trait;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    models::{CommitReceipt, CommitRequest, ErrorBody, ListableItem},
    repository::RepositoryState,
};

/// Field keys used in validation errors and in `WizardState::field_errors`.
pub mod fields {
    pub const ROLE: &str = "role";
    pub const OWNER_ITEMS: &str = "owner_items";
    pub const TENANT_SELECTION: &str = "tenant_selection";

    pub fn owner_item_name(index: usize) -> String {
        format!("owner_items[{index}].name")
    }
}

/// CommitError
///
/// Everything a commit can fail with. Validation never reaches storage; Conflict is terminal for
/// the wizard; NotFound and Transient are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("onboarding has already been completed for this account")]
    Conflict,

    #[error("property {0} no longer exists")]
    NotFound(Uuid),

    #[error("commit service unavailable: {0}")]
    Transient(String),
}

impl CommitError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CommitError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            CommitError::Validation { .. } => StatusCode::BAD_REQUEST,
            CommitError::Conflict => StatusCode::CONFLICT,
            CommitError::NotFound(_) => StatusCode::NOT_FOUND,
            CommitError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            CommitError::Validation { .. } => "validation",
            CommitError::Conflict => "conflict",
            CommitError::NotFound(_) => "not_found",
            CommitError::Transient(_) => "transient",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let field = match self {
            CommitError::Validation { field, .. } => Some(field.clone()),
            CommitError::NotFound(_) => Some(fields::TENANT_SELECTION.to_string()),
            _ => None,
        };
        ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
            field,
        }
    }
}

impl IntoResponse for CommitError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_body())).into_response()
    }
}

/// validate_request
///
/// Server-side shape checks that need no storage access. OWNER submissions need at least one
/// item and every name must contain something other than whitespace. Whether a TENANT selection
/// exists is decided inside the atomic commit itself.
pub fn validate_request(request: &CommitRequest) -> Result<(), CommitError> {
    if let CommitRequest::Owner { owner_items } = request {
        if owner_items.is_empty() {
            return Err(CommitError::validation(
                fields::OWNER_ITEMS,
                "Add at least one property",
            ));
        }
        if let Some(index) = owner_items.iter().position(|item| item.name.trim().is_empty()) {
            return Err(CommitError::validation(
                fields::owner_item_name(index),
                "Property name is required",
            ));
        }
    }
    Ok(())
}

/// CommitService
///
/// The single suspension point of the onboarding wizard. Implementations must be atomic and must
/// answer `Conflict` when the account already has a role.
#[async_trait]
pub trait CommitService: Send + Sync {
    async fn commit(&self, request: CommitRequest) -> Result<CommitReceipt, CommitError>;
}

/// ItemSource
///
/// Read-only query for the properties a TENANT may choose from.
#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn listable_items(&self) -> Result<Vec<ListableItem>, CommitError>;
}

/// DirectCommitService
///
/// In-process Commit Service: validates and commits on behalf of one user straight against the
/// repository. The HTTP handler and `OnboardingClient` end up on the same code path.
#[derive(Clone)]
pub struct DirectCommitService {
    repo: RepositoryState,
    user_id: Uuid,
}

impl DirectCommitService {
    pub fn new(repo: RepositoryState, user_id: Uuid) -> Arc<Self> {
        Arc::new(Self { repo, user_id })
    }
}

#[async_trait]
impl CommitService for DirectCommitService {
    async fn commit(&self, request: CommitRequest) -> Result<CommitReceipt, CommitError> {
        validate_request(&request)?;
        self.repo.commit_onboarding(self.user_id, request).await
    }
}

#[async_trait]
impl ItemSource for DirectCommitService {
    async fn listable_items(&self) -> Result<Vec<ListableItem>, CommitError> {
        Ok(self.repo.list_items().await)
    }
}
