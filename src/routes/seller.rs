use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Seller Router Module
///
/// Catalog management. Handlers require the 'seller' or 'admin' role, and
/// sellers may only modify products they own.
pub fn seller_routes() -> Router<AppState> {
    Router::new()
        // GET /api/seller/products
        // The caller's own listings, for the seller dashboard.
        .route("/api/seller/products", get(handlers::get_seller_products))
        // POST /api/products
        .route("/api/products", post(handlers::create_product))
        // PUT/DELETE /api/products/{id}
        // Ownership is checked against `seller_id` before the write.
        .route(
            "/api/products/{id}",
            put(handlers::update_product).delete(handlers::delete_product),
        )
}
