use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Identity ---

/// Role
///
/// The two-valued account classification chosen during onboarding. It decides which onboarding
/// branch the wizard follows and which capabilities the account has afterwards.
/// Stored in the `profiles.role` column as the Postgres enum `user_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "user_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    Owner,
    Tenant,
}

/// User
///
/// The canonical profile row (`public.profiles`). `role` stays NULL until onboarding commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Option<Role>,
}

/// Session
///
/// The verified per-request identity snapshot. It is resolved once per request (see
/// `auth::Session` extraction) and never mutated afterwards; the role observed by the next
/// request reflects any commit made in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Option<Role>,
    #[ts(type = "string")]
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A session is only usable strictly before its expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn has_role(&self) -> bool {
        self.role.is_some()
    }
}

// --- Properties ---

/// Property
///
/// A record from `public.properties`. Owners create these during onboarding (and later through
/// `POST /properties`); tenants attach to an existing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Property {
    pub id: Uuid,
    pub name: String,
    // FK to public.profiles.id.
    pub owner_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ListableItem
///
/// The projection of a property offered to a TENANT on the selection step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct ListableItem {
    pub id: Uuid,
    pub name: String,
}

impl From<&Property> for ListableItem {
    fn from(property: &Property) -> Self {
        Self {
            id: property.id,
            name: property.name.clone(),
        }
    }
}

// --- Onboarding Payloads ---

/// OwnerItem
///
/// A property an OWNER declares during onboarding. Only the name is collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OwnerItem {
    pub name: String,
}

impl OwnerItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// CommitRequest
///
/// The single atomic onboarding submission (POST /onboarding/commit).
///
/// Tagged by `role`, so the role-specific payload is present exactly for its own role:
/// `{"role":"OWNER","owner_items":[...]}` or `{"role":"TENANT","tenant_selection":"<uuid>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum CommitRequest {
    Owner { owner_items: Vec<OwnerItem> },
    Tenant { tenant_selection: Uuid },
}

impl CommitRequest {
    pub fn role(&self) -> Role {
        match self {
            CommitRequest::Owner { .. } => Role::Owner,
            CommitRequest::Tenant { .. } => Role::Tenant,
        }
    }
}

/// CommitReceipt
///
/// Successful commit response: the role now recorded for the user plus the records that were
/// created (OWNER) or attached (TENANT).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CommitReceipt {
    pub user_id: Uuid,
    pub role: Role,
    pub property_ids: Vec<Uuid>,
}

/// CreatePropertyRequest
///
/// Input payload for POST /properties (owners only).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePropertyRequest {
    pub name: String,
}

/// UserProfile
///
/// Output schema for GET /me.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: Option<Role>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
        }
    }
}

/// ErrorBody
///
/// JSON body attached to every commit-level error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    // Machine-readable kind: "validation" | "conflict" | "not_found" | "transient".
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}
