//! Access Gate.
//!
//! A pure decision over `(session, path)` evaluated once per inbound request. The gate never
//! mutates anything and never talks to the commit path; the HTTP redirect itself is performed
//! by `gate_middleware` in the crate root.
//!
//! | authenticated | role set | path is onboarding | decision              |
//! |---------------|----------|--------------------|-----------------------|
//! | no            | -        | any gated path     | Redirect(sign-in)     |
//! | yes           | no       | no                 | Redirect(onboarding)  |
//! | yes           | no       | yes                | Allow                 |
//! | yes           | yes      | yes                | Redirect(home)        |
//! | yes           | yes      | no                 | Allow                 |
//!
//! Sign-in and public paths are not gated and are always allowed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Session;

/// Classification of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    SignIn,
    Onboarding,
    Protected,
    Public,
}

/// The outcome of a gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect(String),
}

/// RouteTable
///
/// The path layout the gate reasons about. Part of `AppConfig`, so deployments can move the
/// sign-in page or onboarding surface without touching the decision logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    pub sign_in_path: String,
    pub onboarding_path: String,
    pub home_path: String,
    // Prefixes that bypass the gate entirely (health checks, docs, identity provider callbacks).
    pub public_prefixes: Vec<String>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            sign_in_path: "/signin".to_string(),
            onboarding_path: "/onboarding".to_string(),
            home_path: "/".to_string(),
            public_prefixes: vec![
                "/health".to_string(),
                "/swagger-ui".to_string(),
                "/api-docs".to_string(),
                "/api/auth".to_string(),
            ],
        }
    }
}

impl RouteTable {
    /// Classifies `path`. Sign-in wins over everything, then public prefixes, then onboarding;
    /// anything else is protected.
    pub fn classify(&self, path: &str) -> RouteClass {
        if under_prefix(path, &self.sign_in_path) {
            RouteClass::SignIn
        } else if self.public_prefixes.iter().any(|p| under_prefix(path, p)) {
            RouteClass::Public
        } else if under_prefix(path, &self.onboarding_path) {
            RouteClass::Onboarding
        } else {
            RouteClass::Protected
        }
    }
}

/// Segment-aware prefix test: `/onboarding` covers `/onboarding` and `/onboarding/items` but
/// not `/onboardingx`.
fn under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return false;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// decide
///
/// Maps a request to Allow or Redirect. `session` is `None` when no identity could be resolved;
/// an expired session is treated exactly like a missing one. Any gated path reached without a
/// usable session resolves to the sign-in redirect, never to Allow.
pub fn decide(
    session: Option<&Session>,
    path: &str,
    routes: &RouteTable,
    now: DateTime<Utc>,
) -> Decision {
    let class = routes.classify(path);

    if matches!(class, RouteClass::SignIn | RouteClass::Public) {
        return Decision::Allow;
    }

    let Some(session) = session.filter(|s| !s.is_expired(now)) else {
        return Decision::Redirect(routes.sign_in_path.clone());
    };

    match (session.has_role(), class == RouteClass::Onboarding) {
        (false, false) => Decision::Redirect(routes.onboarding_path.clone()),
        (false, true) => Decision::Allow,
        (true, true) => Decision::Redirect(routes.home_path.clone()),
        (true, false) => Decision::Allow,
    }
}
