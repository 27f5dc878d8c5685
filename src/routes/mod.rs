/// Router Module Index
///
/// Routes are grouped by how the Access Gate classifies them. The gate itself runs as one
/// middleware over the whole router (see `create_router`), so membership in a module documents
/// intent; the path decides the treatment.

/// Routes reachable without a session.
pub mod public;

/// Routes under the onboarding path: only sessions without a role get through.
pub mod onboarding;

/// Everything else: only sessions with a role get through.
pub mod authenticated;
