use chrono::{TimeDelta, Utc};
use prop_agent::{
    gate::{Decision, RouteClass, RouteTable, decide},
    models::{Role, Session},
};
use uuid::Uuid;

// --- Helpers ---

fn session(role: Option<Role>) -> Session {
    Session {
        user_id: Uuid::from_u128(1),
        role,
        expires_at: Utc::now() + TimeDelta::hours(1),
    }
}

fn routes() -> RouteTable {
    RouteTable::default()
}

const PROTECTED_PATHS: [&str; 5] = ["/", "/dashboard", "/me", "/properties/latest", "/onboardingx"];
const ONBOARDING_PATHS: [&str; 3] = ["/onboarding", "/onboarding/items", "/onboarding/commit"];

fn redirect(path: &str) -> Decision {
    Decision::Redirect(path.to_string())
}

// --- Decision Table ---

#[test]
fn test_unauthenticated_requests_go_to_sign_in() {
    let now = Utc::now();
    for path in PROTECTED_PATHS.iter().chain(ONBOARDING_PATHS.iter()) {
        assert_eq!(decide(None, path, &routes(), now), redirect("/signin"), "{path}");
    }
}

#[test]
fn test_role_less_session_is_held_in_onboarding() {
    let now = Utc::now();
    let s = session(None);
    for path in PROTECTED_PATHS {
        assert_eq!(decide(Some(&s), path, &routes(), now), redirect("/onboarding"), "{path}");
    }
    for path in ONBOARDING_PATHS {
        assert_eq!(decide(Some(&s), path, &routes(), now), Decision::Allow, "{path}");
    }
}

#[test]
fn test_onboarded_session_never_reenters_onboarding() {
    let now = Utc::now();
    for role in [Role::Owner, Role::Tenant] {
        let s = session(Some(role));
        for path in ONBOARDING_PATHS {
            assert_eq!(decide(Some(&s), path, &routes(), now), redirect("/"), "{path}");
        }
        for path in PROTECTED_PATHS {
            assert_eq!(decide(Some(&s), path, &routes(), now), Decision::Allow, "{path}");
        }
    }
}

#[test]
fn test_expired_session_counts_as_unauthenticated() {
    let now = Utc::now();
    let mut s = session(Some(Role::Owner));
    s.expires_at = now - TimeDelta::seconds(1);
    assert_eq!(decide(Some(&s), "/dashboard", &routes(), now), redirect("/signin"));

    // Expiry is exclusive: the expiry instant itself is already too late.
    s.expires_at = now;
    assert_eq!(decide(Some(&s), "/dashboard", &routes(), now), redirect("/signin"));
}

#[test]
fn test_public_and_sign_in_paths_are_never_gated() {
    let now = Utc::now();
    let sessions = [None, Some(session(None)), Some(session(Some(Role::Tenant)))];
    for s in &sessions {
        for path in ["/signin", "/health", "/swagger-ui/index.html", "/api-docs/openapi.json"] {
            assert_eq!(decide(s.as_ref(), path, &routes(), now), Decision::Allow, "{path}");
        }
    }
}

#[test]
fn test_decision_is_repeatable() {
    let now = Utc::now();
    let s = session(None);
    let first = decide(Some(&s), "/dashboard", &routes(), now);
    for _ in 0..10 {
        assert_eq!(decide(Some(&s), "/dashboard", &routes(), now), first);
    }
}

#[test]
fn test_custom_route_table_is_honoured() {
    let table = RouteTable {
        sign_in_path: "/login".to_string(),
        onboarding_path: "/welcome".to_string(),
        home_path: "/app".to_string(),
        public_prefixes: vec![],
    };
    let now = Utc::now();

    assert_eq!(table.classify("/welcome/step"), RouteClass::Onboarding);
    assert_eq!(table.classify("/onboarding"), RouteClass::Protected);
    assert_eq!(decide(None, "/app", &table, now), redirect("/login"));
    assert_eq!(
        decide(Some(&session(None)), "/app", &table, now),
        redirect("/welcome")
    );
    assert_eq!(
        decide(Some(&session(Some(Role::Owner))), "/welcome", &table, now),
        redirect("/app")
    );
}

// --- Scenario ---

#[test]
fn test_dashboard_opens_after_commit() {
    let now = Utc::now();
    let before = session(None);
    assert_eq!(decide(Some(&before), "/dashboard", &routes(), now), redirect("/onboarding"));

    let after = Session {
        role: Some(Role::Owner),
        ..before
    };
    assert_eq!(decide(Some(&after), "/dashboard", &routes(), now), Decision::Allow);
}

#[test]
fn test_gate_is_safe_to_share_across_threads() {
    let table = std::sync::Arc::new(routes());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let table = table.clone();
            std::thread::spawn(move || {
                let role = if i % 2 == 0 { None } else { Some(Role::Tenant) };
                let s = session(role);
                decide(Some(&s), "/onboarding", &table, Utc::now())
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let expected = if i % 2 == 0 { Decision::Allow } else { redirect("/") };
        assert_eq!(handle.join().unwrap(), expected);
    }
}
