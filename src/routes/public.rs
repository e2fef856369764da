use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints. The catalog is readable by anonymous visitors;
/// registration and login are the only places tokens are issued.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/register
        // Creates a customer or seller account and returns a 7-day session token.
        .route("/api/auth/register", post(handlers::register_user))
        // POST /api/auth/login
        .route("/api/auth/login", post(handlers::login))
        // GET /api/products?search=...&category=...
        .route("/api/products", get(handlers::get_products))
        // GET /api/products/{id}
        .route("/api/products/{id}", get(handlers::get_product))
}
