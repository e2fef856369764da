use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;

// --- Core Storefront Schemas (Mapped to Database) ---

/// User
///
/// The canonical account record from the `users` table. `role` is stored as
/// free text and may carry any casing; it is normalized at comparison time.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    // RBAC field: 'customer', 'seller' or 'admin'.
    pub role: String,
    // Seller storefront details. Always None for customers.
    pub business_name: Option<String>,
    pub business_description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// StoredCredentials
///
/// Internal row used only by the login handler. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct StoredCredentials {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
}

/// NewUser
///
/// Insert payload built by the registration handler after hashing the password.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: String,
    pub password_hash: String,
    pub business_name: Option<String>,
    pub business_description: Option<String>,
}

/// Product
///
/// A catalog entry owned by a seller. Prices are integer minor units.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Product {
    pub id: Uuid,
    // FK to users.id (the seller that listed it).
    pub seller_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price_cents: i64,
    pub stock: i32,
    pub image_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CartItem
///
/// One line of a customer's cart. At most one row per (user, product).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// WishlistItem
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Order
///
/// Created at checkout from the cart contents. `status` moves from
/// `pending` to `paid` once a matching payment is recorded.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub total_cents: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    // Loaded by a second query; absent from the `orders` row itself.
    #[sqlx(skip)]
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    pub const PENDING: &'static str = "pending";
    pub const PAID: &'static str = "paid";

    pub fn is_paid(&self) -> bool {
        self.status == Self::PAID
    }
}

/// OrderItem
///
/// A product line frozen at checkout time, including the unit price paid.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct OrderItem {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

/// NewOrderLine
///
/// Checkout input for one order line, priced by the handler from the catalog.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

impl NewOrderLine {
    pub fn line_total(&self) -> Option<i64> {
        self.unit_price_cents.checked_mul(i64::from(self.quantity))
    }
}

/// Sum of all line totals, `None` when it does not fit in `i64`.
pub fn order_total(lines: &[NewOrderLine]) -> Option<i64> {
    lines
        .iter()
        .try_fold(0i64, |total, line| total.checked_add(line.line_total()?))
}

/// Payment
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub amount_cents: i64,
    // Free-form payment method label, e.g. "card" or "cash_on_delivery".
    pub method: String,
    pub status: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for `POST /api/auth/register`. The password is hashed before
/// it reaches the repository and is never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    // Defaults to 'customer' when omitted.
    pub role: Option<String>,
    pub business_name: Option<String>,
    pub business_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price_cents: i64,
    pub stock: i32,
    pub image_url: Option<String>,
}

/// UpdateProductRequest
///
/// Partial update; only `Some` fields are written.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProductRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AddWishlistItemRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PaymentRequest {
    pub amount_cents: i64,
    pub method: String,
}

// --- Output Schemas ---

/// UserProfile
///
/// Public view of the authenticated caller (GET /api/me, login, register).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub business_name: Option<String>,
    pub business_description: Option<String>,
}

impl From<&AuthUser> for UserProfile {
    fn from(caller: &AuthUser) -> Self {
        Self {
            id: caller.id,
            email: caller.email.clone(),
            name: caller.name.clone(),
            role: caller.role.clone(),
            business_name: caller.business_name.clone(),
            business_description: caller.business_description.clone(),
        }
    }
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
            business_name: user.business_name.clone(),
            business_description: user.business_description.clone(),
        }
    }
}

/// AuthResponse
///
/// Returned by login and registration. The client stores `token` both as the
/// `token` cookie (page navigation) and as a bearer header (API calls).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}
