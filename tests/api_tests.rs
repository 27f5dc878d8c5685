use chrono::{TimeDelta, Utc};
use prop_agent::{
    AppConfig, AppState, MemoryRepository, create_router,
    auth::{Claims, issue_token},
    client::OnboardingClient,
    commit::{CommitError, CommitService, ItemSource},
    models::{CommitRequest, OwnerItem, Role, User},
    wizard::{FinishOutcome, Wizard},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

const OWNER_ID: Uuid = Uuid::from_u128(10);

pub struct TestApp {
    pub address: String,
    pub repo: Arc<MemoryRepository>,
    pub config: AppConfig,
}

impl TestApp {
    /// Registers a fresh, role-less profile and returns a client holding its session token.
    fn newcomer(&self, ttl: TimeDelta) -> (Uuid, OnboardingClient) {
        let id = Uuid::new_v4();
        self.repo.insert_user(User {
            id,
            email: format!("{}@test.com", id.simple()),
            role: None,
        });

        let claims = Claims::new(id, Utc::now(), ttl);
        let token = issue_token(&claims, &self.config.jwt_secret).unwrap();
        let client = OnboardingClient::from_config(&self.address, token, &self.config).unwrap();

        (id, client)
    }
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    repo.insert_user(User {
        id: OWNER_ID,
        email: "owner@test.com".to_string(),
        role: Some(Role::Owner),
    });
    repo.insert_property(OWNER_ID, "Lakeview");
    repo.insert_property(OWNER_ID, "Hillside");

    let config = AppConfig::default();
    let router = create_router(AppState {
        repo: repo.clone(),
        config: config.clone(),
    });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        config,
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = reqwest::Client::new()
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_owner_onboarding_end_to_end() {
    let app = spawn_app().await;
    let (user_id, client) = app.newcomer(TimeDelta::hours(1));
    let client = Arc::new(client);

    let wizard = Wizard::new(client.clone(), vec![]);
    assert!(wizard.refresh_items(client.as_ref()).await);
    assert_eq!(wizard.items().len(), 2);

    wizard.select_role(Role::Owner);
    assert!(wizard.next());
    wizard.set_item_name(0, "Harbour View");

    let outcome = wizard.finish().await;
    let FinishOutcome::Committed(receipt) = outcome else {
        panic!("expected a committed outcome, got {outcome:?}");
    };
    assert_eq!(receipt.user_id, user_id);
    assert_eq!(receipt.role, Role::Owner);
    assert!(wizard.state().finished);

    // A second submission meets the gate, which now sends this account home.
    let again = client
        .commit(CommitRequest::Owner {
            owner_items: vec![OwnerItem::named("Again")],
        })
        .await;
    assert_eq!(again, Err(CommitError::Conflict));
    assert_eq!(client.listable_items().await, Err(CommitError::Conflict));
}

#[tokio::test]
async fn test_tenant_onboarding_end_to_end() {
    let app = spawn_app().await;
    let (user_id, client) = app.newcomer(TimeDelta::hours(1));
    let client = Arc::new(client);

    let wizard = Wizard::new(client.clone(), vec![]);
    assert!(wizard.refresh_items(client.as_ref()).await);
    let chosen = wizard.items()[1].id;

    wizard.select_role(Role::Tenant);
    assert!(wizard.next());
    wizard.set_tenant_selection(chosen);

    let outcome = wizard.finish().await;
    assert!(matches!(outcome, FinishOutcome::Committed(_)), "{outcome:?}");
    assert_eq!(app.repo.tenancy_of(user_id), Some(chosen));
}

#[tokio::test]
async fn test_vanished_property_surfaces_as_not_found() {
    let app = spawn_app().await;
    let (_, client) = app.newcomer(TimeDelta::hours(1));
    let client = Arc::new(client);

    let wizard = Wizard::new(client.clone(), vec![]);
    wizard.refresh_items(client.as_ref()).await;
    let chosen = wizard.items()[0].id;

    wizard.select_role(Role::Tenant);
    wizard.next();
    wizard.set_tenant_selection(chosen);
    app.repo.remove_property(chosen);

    assert_eq!(wizard.finish().await, FinishOutcome::NotFound);
    let state = wizard.state();
    assert_eq!(state.tenant_selection, None);
    assert!(!state.finished);
    assert!(state.form_error.is_some());
}

#[tokio::test]
async fn test_server_side_validation_names_the_field() {
    let app = spawn_app().await;
    let (_, client) = app.newcomer(TimeDelta::hours(1));

    let result = client
        .commit(CommitRequest::Owner {
            owner_items: vec![OwnerItem::named("Lakeview"), OwnerItem::named("   ")],
        })
        .await;

    assert_eq!(
        result,
        Err(CommitError::validation(
            "owner_items[1].name",
            "Property name is required"
        ))
    );
}

#[tokio::test]
async fn test_outage_is_transient_and_retryable() {
    let app = spawn_app().await;
    let (_, client) = app.newcomer(TimeDelta::hours(1));
    let client = Arc::new(client);

    let wizard = Wizard::new(client.clone(), vec![]);
    wizard.refresh_items(client.as_ref()).await;
    wizard.select_role(Role::Owner);
    wizard.next();
    wizard.set_item_name(0, "Lakeview East");

    app.repo.set_unavailable(true);
    assert_eq!(wizard.finish().await, FinishOutcome::Transient);
    assert!(!wizard.state().finished);

    app.repo.set_unavailable(false);
    assert!(matches!(wizard.finish().await, FinishOutcome::Committed(_)));
}

#[tokio::test]
async fn test_expired_session_is_sent_to_sign_in() {
    let app = spawn_app().await;
    let (_, client) = app.newcomer(-TimeDelta::hours(1));

    let result = client
        .commit(CommitRequest::Owner {
            owner_items: vec![OwnerItem::named("Lakeview East")],
        })
        .await;

    assert!(matches!(result, Err(CommitError::Transient(_))), "{result:?}");
}
