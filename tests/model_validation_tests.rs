use chrono::{TimeDelta, Utc};
use prop_agent::models::{
    CommitRequest, ErrorBody, ListableItem, OwnerItem, Property, Role, Session, User, UserProfile,
};
use serde_json::json;
use uuid::Uuid;

// --- Wire Shapes ---

#[test]
fn test_role_serializes_screaming_case() {
    assert_eq!(serde_json::to_value(Role::Owner).unwrap(), json!("OWNER"));
    assert_eq!(serde_json::to_value(Role::Tenant).unwrap(), json!("TENANT"));
    assert!(serde_json::from_value::<Role>(json!("owner")).is_err());
}

#[test]
fn test_commit_request_is_tagged_by_role() {
    let owner = CommitRequest::Owner {
        owner_items: vec![OwnerItem::named("Lakeview")],
    };
    assert_eq!(
        serde_json::to_value(&owner).unwrap(),
        json!({ "role": "OWNER", "owner_items": [{ "name": "Lakeview" }] })
    );

    let selection = Uuid::from_u128(42);
    let tenant: CommitRequest = serde_json::from_value(json!({
        "role": "TENANT",
        "tenant_selection": selection,
    }))
    .unwrap();
    assert_eq!(tenant, CommitRequest::Tenant { tenant_selection: selection });
    assert_eq!(tenant.role(), Role::Tenant);
}

#[test]
fn test_commit_request_rejects_mismatched_payload() {
    // A TENANT submission must carry a selection, not owner items.
    let result = serde_json::from_value::<CommitRequest>(json!({
        "role": "TENANT",
        "owner_items": [{ "name": "Lakeview" }],
    }));
    assert!(result.is_err());

    let result = serde_json::from_value::<CommitRequest>(json!({ "owner_items": [] }));
    assert!(result.is_err(), "the role tag is mandatory");
}

#[test]
fn test_error_body_omits_missing_field() {
    let body = ErrorBody {
        error: "conflict".to_string(),
        message: "Role already set".to_string(),
        field: None,
    };
    let value = serde_json::to_value(&body).unwrap();
    assert!(value.get("field").is_none());

    let parsed: ErrorBody = serde_json::from_value(value).unwrap();
    assert_eq!(parsed, body);
}

// --- Conversions and Helpers ---

#[test]
fn test_session_expiry_boundary() {
    let now = Utc::now();
    let session = Session {
        user_id: Uuid::from_u128(1),
        role: Some(Role::Owner),
        expires_at: now,
    };

    assert!(session.is_expired(now));
    assert!(!session.is_expired(now - TimeDelta::seconds(1)));
    assert!(session.has_role());
}

#[test]
fn test_listable_item_projection() {
    let property = Property {
        id: Uuid::from_u128(7),
        name: "Hillside".to_string(),
        owner_id: Uuid::from_u128(1),
        created_at: Utc::now(),
    };

    assert_eq!(
        ListableItem::from(&property),
        ListableItem {
            id: property.id,
            name: "Hillside".to_string()
        }
    );
}

#[test]
fn test_user_profile_from_user() {
    let user = User {
        id: Uuid::from_u128(3),
        email: "someone@test.com".to_string(),
        role: None,
    };

    let profile = UserProfile::from(user.clone());
    assert_eq!(profile.id, user.id);
    assert_eq!(profile.email, user.email);
    assert_eq!(profile.role, None);
}
