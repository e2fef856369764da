/// Router Module Index
///
/// API routes grouped by who may call them. Every group authenticates inside
/// the handler through the `AuthUser` extractor, and every role-restricted
/// handler runs `check_role` before touching the repository. The edge guard
/// never inspects `/api`, so these handlers are the only line of defense for
/// API calls.

/// Routes anyone may call: catalog reads, registration, login, health.
pub mod public;

/// Routes any signed-in caller may call.
pub mod authenticated;

/// Routes for customers: cart, wishlist, checkout, orders, payments.
pub mod customer;

/// Routes for sellers (and admins): catalog management.
pub mod seller;
