use crate::commit::CommitError;
use crate::models::{CommitReceipt, CommitRequest, ListableItem, Property, Role, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Repository Trait
///
/// The persistence contract. Handlers, the session extractor and the commit service only ever
/// see `Arc<dyn Repository>`, so Postgres and the in-memory store are interchangeable.
///
/// **Send + Sync + async_trait** are required to share the trait object across Axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---
    async fn get_user(&self, id: Uuid) -> Option<User>;

    // --- Properties ---
    // Every property, projected for the TENANT selection step.
    async fn list_items(&self) -> Vec<ListableItem>;
    async fn get_my_properties(&self, owner_id: Uuid) -> Vec<Property>;
    async fn get_latest_property(&self, owner_id: Uuid) -> Option<Property>;
    async fn create_property(&self, owner_id: Uuid, name: String) -> Option<Property>;

    // --- Onboarding ---
    /// Atomically records `request.role()` for `user_id` together with its associations.
    /// Conflict if the user already has a role, NotFound if a TENANT selection does not exist,
    /// Transient on storage failure. Nothing is written unless everything is.
    async fn commit_onboarding(
        &self,
        user_id: Uuid,
        request: CommitRequest,
    ) -> Result<CommitReceipt, CommitError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Expected tables:
/// `profiles(id uuid, email text, role user_type NULL)`,
/// `properties(id uuid, name text, owner_id uuid, created_at timestamptz)`,
/// `tenancies(user_id uuid, property_id uuid)`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Storage failures on the commit path are reported as retryable without leaking SQL details.
fn transient(e: sqlx::Error) -> CommitError {
    tracing::error!("commit_onboarding storage error: {:?}", e);
    CommitError::Transient("storage unavailable".to_string())
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>("SELECT id, email, role FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    async fn list_items(&self) -> Vec<ListableItem> {
        sqlx::query_as::<_, ListableItem>(
            "SELECT id, name FROM properties ORDER BY created_at ASC, name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_items error: {:?}", e);
            vec![]
        })
    }

    async fn get_my_properties(&self, owner_id: Uuid) -> Vec<Property> {
        sqlx::query_as::<_, Property>(
            "SELECT id, name, owner_id, created_at FROM properties WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_my_properties error: {:?}", e);
            vec![]
        })
    }

    async fn get_latest_property(&self, owner_id: Uuid) -> Option<Property> {
        sqlx::query_as::<_, Property>(
            "SELECT id, name, owner_id, created_at FROM properties WHERE owner_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_latest_property error: {:?}", e);
            None
        })
    }

    async fn create_property(&self, owner_id: Uuid, name: String) -> Option<Property> {
        sqlx::query_as::<_, Property>(
            "INSERT INTO properties (id, name, owner_id, created_at) VALUES ($1, $2, $3, NOW()) RETURNING id, name, owner_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| tracing::error!("create_property error: {:?}", e))
        .ok()
    }

    /// commit_onboarding
    ///
    /// One transaction. The conditional `UPDATE ... WHERE role IS NULL` is the conflict check:
    /// of two racing commits only one can flip the role. Returning early drops `tx`, which rolls
    /// everything back.
    async fn commit_onboarding(
        &self,
        user_id: Uuid,
        request: CommitRequest,
    ) -> Result<CommitReceipt, CommitError> {
        let role = request.role();
        let mut tx = self.pool.begin().await.map_err(transient)?;

        let updated = sqlx::query("UPDATE profiles SET role = $1 WHERE id = $2 AND role IS NULL")
            .bind(role)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(transient)?;

        if updated.rows_affected() == 0 {
            return Err(CommitError::Conflict);
        }

        let mut property_ids = Vec::new();
        match request {
            CommitRequest::Owner { owner_items } => {
                for item in owner_items {
                    let id = Uuid::new_v4();
                    sqlx::query(
                        "INSERT INTO properties (id, name, owner_id, created_at) VALUES ($1, $2, $3, NOW())",
                    )
                    .bind(id)
                    .bind(item.name.trim())
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(transient)?;
                    property_ids.push(id);
                }
            }
            CommitRequest::Tenant { tenant_selection } => {
                // FOR SHARE keeps the property from disappearing before the tenancy lands.
                let found: Option<Uuid> =
                    sqlx::query_scalar("SELECT id FROM properties WHERE id = $1 FOR SHARE")
                        .bind(tenant_selection)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(transient)?;

                let Some(property_id) = found else {
                    return Err(CommitError::NotFound(tenant_selection));
                };

                sqlx::query("INSERT INTO tenancies (user_id, property_id) VALUES ($1, $2)")
                    .bind(user_id)
                    .bind(property_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(transient)?;
                property_ids.push(property_id);
            }
        }

        tx.commit().await.map_err(transient)?;

        Ok(CommitReceipt {
            user_id,
            role,
            property_ids,
        })
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct MemoryStore {
    users: HashMap<Uuid, User>,
    // Insertion order doubles as creation order.
    properties: Vec<Property>,
    tenancies: HashMap<Uuid, Uuid>,
}

/// MemoryRepository
///
/// `Repository` kept entirely in process, with the same commit semantics as Postgres (the whole
/// commit runs under one lock). Used by the test suites and for running the service without a
/// database. `set_unavailable(true)` simulates a storage outage on the commit path.
#[derive(Default)]
pub struct MemoryRepository {
    store: Mutex<MemoryStore>,
    unavailable: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, MemoryStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_user(&self, user: User) {
        self.store().users.insert(user.id, user);
    }

    /// Seeds a property directly, bypassing onboarding.
    pub fn insert_property(&self, owner_id: Uuid, name: &str) -> Property {
        let property = Property {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            created_at: Utc::now(),
        };
        self.store().properties.push(property.clone());
        property
    }

    pub fn remove_property(&self, id: Uuid) {
        self.store().properties.retain(|p| p.id != id);
    }

    pub fn tenancy_of(&self, user_id: Uuid) -> Option<Uuid> {
        self.store().tenancies.get(&user_id).copied()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.store().users.get(&id).cloned()
    }

    async fn list_items(&self) -> Vec<ListableItem> {
        self.store().properties.iter().map(ListableItem::from).collect()
    }

    async fn get_my_properties(&self, owner_id: Uuid) -> Vec<Property> {
        self.store()
            .properties
            .iter()
            .rev()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect()
    }

    async fn get_latest_property(&self, owner_id: Uuid) -> Option<Property> {
        self.store()
            .properties
            .iter()
            .rev()
            .find(|p| p.owner_id == owner_id)
            .cloned()
    }

    async fn create_property(&self, owner_id: Uuid, name: String) -> Option<Property> {
        Some(self.insert_property(owner_id, &name))
    }

    async fn commit_onboarding(
        &self,
        user_id: Uuid,
        request: CommitRequest,
    ) -> Result<CommitReceipt, CommitError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CommitError::Transient("storage unavailable".to_string()));
        }

        let mut store = self.store();
        let role: Role = request.role();

        match store.users.get(&user_id) {
            Some(user) if user.role.is_none() => {}
            _ => return Err(CommitError::Conflict),
        }

        let property_ids = match request {
            CommitRequest::Owner { owner_items } => {
                let now = Utc::now();
                let created: Vec<Property> = owner_items
                    .into_iter()
                    .map(|item| Property {
                        id: Uuid::new_v4(),
                        name: item.name.trim().to_string(),
                        owner_id: user_id,
                        created_at: now,
                    })
                    .collect();
                let ids = created.iter().map(|p| p.id).collect();
                store.properties.extend(created);
                ids
            }
            CommitRequest::Tenant { tenant_selection } => {
                if !store.properties.iter().any(|p| p.id == tenant_selection) {
                    return Err(CommitError::NotFound(tenant_selection));
                }
                store.tenancies.insert(user_id, tenant_selection);
                vec![tenant_selection]
            }
        };

        if let Some(user) = store.users.get_mut(&user_id) {
            user.role = Some(role);
        }

        Ok(CommitReceipt {
            user_id,
            role,
            property_ids,
        })
    }
}
