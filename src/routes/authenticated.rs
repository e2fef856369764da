use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Endpoints open to any caller holding a valid session, whatever the role.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET /api/me
        // The caller's profile, re-read from the repository on every call.
        .route("/api/me", get(handlers::get_me))
}
