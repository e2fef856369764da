use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Customer Router Module
///
/// Shopping flows. Handlers require the 'customer' role (or its 'buyer'
/// alias) and verify that every cart line, wishlist entry and order they
/// touch belongs to the caller.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        // --- Cart ---
        .route("/api/cart", get(handlers::get_cart).post(handlers::add_to_cart))
        .route(
            "/api/cart/{id}",
            put(handlers::update_cart_item).delete(handlers::delete_cart_item),
        )
        // --- Wishlist ---
        .route(
            "/api/wishlist",
            get(handlers::get_wishlist).post(handlers::add_to_wishlist),
        )
        .route("/api/wishlist/{id}", delete(handlers::delete_wishlist_item))
        // --- Checkout & Orders ---
        // POST /api/checkout
        // Converts the cart into a pending order and empties the cart.
        .route("/api/checkout", post(handlers::checkout))
        .route("/api/orders", get(handlers::get_orders))
        .route("/api/orders/{id}", get(handlers::get_order))
        // POST /api/orders/{id}/payments
        .route("/api/orders/{id}/payments", post(handlers::pay_order))
}
