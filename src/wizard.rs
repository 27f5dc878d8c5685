//! Wizard Controller.
//!
//! Onboarding runs in two steps:
//!
//! ```text
//! step 0: choose role ──next()──▶ step 1: OWNER  → one or more named properties
//!                                         TENANT → one existing property
//!                                 finish() ──▶ CommitService (once)
//! ```
//!
//! [`WizardState`] is a plain serializable value whose transitions are synchronous and never
//! fail; invalid input lands in `field_errors`. [`Wizard`] wraps a state together with the
//! property list and a [`CommitService`], and owns the only suspension point: `finish()`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use ts_rs::TS;
use uuid::Uuid;

use crate::commit::{CommitError, CommitService, ItemSource, fields};
use crate::models::{CommitReceipt, CommitRequest, ListableItem, OwnerItem, Role};

pub const TOTAL_STEPS: usize = 2;
pub const ROLE_STEP: usize = 0;
pub const DETAILS_STEP: usize = 1;

const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a `finish()` attempt. Only `Committed` means the Commit Service accepted the
/// submission; the caller navigates away on `Committed` and `Conflict`.
#[derive(Debug, Clone, PartialEq)]
pub enum FinishOutcome {
    Committed(CommitReceipt),
    /// Local validation failed; nothing was sent. See `field_errors`.
    Invalid,
    NotOnFinalStep,
    /// A commit is already in flight.
    AlreadySubmitting,
    /// The wizard has already committed (or learned the account was onboarded elsewhere).
    AlreadyFinished,
    Conflict,
    NotFound,
    Transient,
}

/// WizardState
///
/// Everything the onboarding surface needs to render, as one value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WizardState {
    pub step: usize,
    pub role: Option<Role>,
    pub owner_items: Vec<OwnerItem>,
    pub tenant_selection: Option<Uuid>,
    pub field_errors: BTreeMap<String, String>,
    // Commit-level error shown at the form, not at a field.
    pub form_error: Option<String>,
    pub submitting: bool,
    pub finished: bool,
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_last_step(&self) -> bool {
        self.step == TOTAL_STEPS - 1
    }

    /// Choosing OWNER with no properties yet starts the list with one blank entry, matching the
    /// single name field the form opens with.
    pub fn select_role(&mut self, role: Role) {
        self.role = Some(role);
        self.field_errors.remove(fields::ROLE);
        if role == Role::Owner && self.owner_items.is_empty() {
            self.owner_items.push(OwnerItem::default());
        }
    }

    pub fn add_item(&mut self) {
        if self.role == Some(Role::Owner) {
            self.owner_items.push(OwnerItem::default());
            self.field_errors.remove(fields::OWNER_ITEMS);
        }
    }

    pub fn remove_item(&mut self, index: usize) {
        if index >= self.owner_items.len() {
            return;
        }
        self.owner_items.remove(index);
        // Indices shifted; per-item errors are recomputed on the next validation.
        self.field_errors
            .retain(|key, _| !key.starts_with("owner_items["));
    }

    pub fn set_item_name(&mut self, index: usize, value: impl Into<String>) {
        let Some(item) = self.owner_items.get_mut(index) else {
            return;
        };
        item.name = value.into();
        if !item.name.trim().is_empty() {
            self.field_errors.remove(&fields::owner_item_name(index));
        }
    }

    pub fn set_tenant_selection(&mut self, id: Uuid) {
        if self.role == Some(Role::Tenant) {
            self.tenant_selection = Some(id);
            self.field_errors.remove(fields::TENANT_SELECTION);
        }
    }

    /// Advances one step iff the current step validates. On the last step this only refreshes
    /// the errors; the step never leaves `[0, TOTAL_STEPS - 1]`.
    pub fn next(&mut self, items: &[ListableItem]) -> bool {
        let errors = step_errors(self, self.step, items);
        let valid = errors.is_empty();
        self.field_errors.extend(errors);

        if valid && self.step < TOTAL_STEPS - 1 {
            self.step += 1;
            true
        } else {
            false
        }
    }

    pub fn previous(&mut self) {
        self.step = self.step.saturating_sub(1);
    }

    /// Every check that must hold before a commit, across all steps.
    pub fn validate(&self, items: &[ListableItem]) -> BTreeMap<String, String> {
        (0..TOTAL_STEPS)
            .flat_map(|step| step_errors(self, step, items))
            .collect()
    }

    /// First half of `finish()`: guards, validation, and marking the submission in flight.
    /// On success the caller owns the returned request and must report back through
    /// `complete_finish`.
    pub fn begin_finish(&mut self, items: &[ListableItem]) -> Result<CommitRequest, FinishOutcome> {
        if self.finished {
            return Err(FinishOutcome::AlreadyFinished);
        }
        if self.submitting {
            return Err(FinishOutcome::AlreadySubmitting);
        }
        if !self.is_last_step() {
            return Err(FinishOutcome::NotOnFinalStep);
        }

        let errors = self.validate(items);
        if !errors.is_empty() {
            self.field_errors.extend(errors);
            return Err(FinishOutcome::Invalid);
        }

        let request = match (self.role, self.tenant_selection) {
            (Some(Role::Owner), _) => CommitRequest::Owner {
                owner_items: self.owner_items.clone(),
            },
            (Some(Role::Tenant), Some(tenant_selection)) => {
                CommitRequest::Tenant { tenant_selection }
            }
            // Unreachable after a clean validation; kept total.
            _ => return Err(FinishOutcome::Invalid),
        };

        self.submitting = true;
        self.form_error = None;
        Ok(request)
    }

    /// Second half of `finish()`: folds the Commit Service answer back into the state.
    pub fn complete_finish(&mut self, result: Result<CommitReceipt, CommitError>) -> FinishOutcome {
        self.submitting = false;

        match result {
            Ok(receipt) => {
                self.finished = true;
                FinishOutcome::Committed(receipt)
            }
            Err(CommitError::Conflict) => {
                self.finished = true;
                self.form_error = Some(CommitError::Conflict.to_string());
                FinishOutcome::Conflict
            }
            Err(CommitError::NotFound(_)) => {
                self.tenant_selection = None;
                self.field_errors.insert(
                    fields::TENANT_SELECTION.to_string(),
                    "That property is no longer available".to_string(),
                );
                self.form_error = Some("Please choose another property".to_string());
                FinishOutcome::NotFound
            }
            Err(CommitError::Transient(reason)) => {
                self.form_error = Some(format!("Could not complete setup, try again ({reason})"));
                FinishOutcome::Transient
            }
            Err(CommitError::Validation { field, message }) => {
                self.field_errors.insert(field, message);
                FinishOutcome::Invalid
            }
        }
    }
}

fn step_errors(state: &WizardState, step: usize, items: &[ListableItem]) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    match (step, state.role) {
        (ROLE_STEP, None) => {
            errors.insert(fields::ROLE.to_string(), "Select your user type".to_string());
        }
        (DETAILS_STEP, Some(Role::Owner)) => {
            if state.owner_items.is_empty() {
                errors.insert(
                    fields::OWNER_ITEMS.to_string(),
                    "Add at least one property".to_string(),
                );
            }
            for (index, item) in state.owner_items.iter().enumerate() {
                if item.name.trim().is_empty() {
                    errors.insert(
                        fields::owner_item_name(index),
                        "Property name is required".to_string(),
                    );
                }
            }
        }
        (DETAILS_STEP, Some(Role::Tenant)) => {
            let known = state
                .tenant_selection
                .is_some_and(|id| items.iter().any(|item| item.id == id));
            if !known {
                errors.insert(
                    fields::TENANT_SELECTION.to_string(),
                    "Select a property".to_string(),
                );
            }
        }
        (DETAILS_STEP, None) => {
            errors.insert(fields::ROLE.to_string(), "Select your user type".to_string());
        }
        _ => {}
    }
    errors
}

/// Wizard
///
/// The controller the onboarding surface talks to. Operations take `&self` so event handlers
/// can share one instance; `submitting` is the only guard against overlapping `finish()` calls.
/// No lock is held across the commit await.
pub struct Wizard {
    state: Mutex<WizardState>,
    items: Mutex<Vec<ListableItem>>,
    service: Arc<dyn CommitService>,
    commit_timeout: Duration,
}

impl Wizard {
    pub fn new(service: Arc<dyn CommitService>, items: Vec<ListableItem>) -> Self {
        Self {
            state: Mutex::new(WizardState::new()),
            items: Mutex::new(items),
            service,
            commit_timeout: DEFAULT_COMMIT_TIMEOUT,
        }
    }

    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = timeout;
        self
    }

    fn update<R>(&self, f: impl FnOnce(&mut WizardState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    fn items_guard(&self) -> MutexGuard<'_, Vec<ListableItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current state, e.g. for rendering.
    pub fn state(&self) -> WizardState {
        self.update(|state| state.clone())
    }

    pub fn items(&self) -> Vec<ListableItem> {
        self.items_guard().clone()
    }

    pub fn set_items(&self, items: Vec<ListableItem>) {
        *self.items_guard() = items;
    }

    /// Reloads the TENANT choices. A failed load keeps the previous list and reports at the form.
    pub async fn refresh_items(&self, source: &dyn ItemSource) -> bool {
        match source.listable_items().await {
            Ok(items) => {
                self.set_items(items);
                true
            }
            Err(e) => {
                tracing::warn!("failed to load listable items: {}", e);
                self.update(|state| state.form_error = Some("Could not load properties".to_string()));
                false
            }
        }
    }

    pub fn select_role(&self, role: Role) {
        self.update(|state| state.select_role(role));
    }

    pub fn add_item(&self) {
        self.update(WizardState::add_item);
    }

    pub fn remove_item(&self, index: usize) {
        self.update(|state| state.remove_item(index));
    }

    pub fn set_item_name(&self, index: usize, value: impl Into<String>) {
        let value = value.into();
        self.update(|state| state.set_item_name(index, value));
    }

    pub fn set_tenant_selection(&self, id: Uuid) {
        self.update(|state| state.set_tenant_selection(id));
    }

    pub fn next(&self) -> bool {
        let items = self.items();
        self.update(|state| state.next(&items))
    }

    pub fn previous(&self) {
        self.update(WizardState::previous);
    }

    /// finish
    ///
    /// Validates, marks the wizard as submitting and calls the Commit Service exactly once.
    /// A call made while another is outstanding returns `AlreadySubmitting` without touching the
    /// service. There is no automatic retry; a Transient outcome leaves the wizard ready for the
    /// user to try again.
    pub async fn finish(&self) -> FinishOutcome {
        let items = self.items();
        let request = match self.update(|state| state.begin_finish(&items)) {
            Ok(request) => request,
            Err(outcome) => return outcome,
        };
        let role = request.role();

        let result = match tokio::time::timeout(self.commit_timeout, self.service.commit(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(CommitError::Transient(
                "timed out waiting for the commit service".to_string(),
            )),
        };

        match &result {
            Ok(receipt) => tracing::info!(user_id = %receipt.user_id, ?role, "onboarding committed"),
            Err(e) => tracing::warn!(?role, "onboarding commit failed: {}", e),
        }

        self.update(|state| state.complete_finish(result))
    }
}
