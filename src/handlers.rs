use crate::{
    AppState,
    auth::{
        AuthUser, Role, check_role, ensure_owner,
        password::{hash_password, verify_password},
    },
    error::{ApiError, AuthFailure, ErrorBody},
    models::{
        AddCartItemRequest, AddWishlistItemRequest, AuthResponse, CartItem, CreateProductRequest,
        LoginRequest, NewOrderLine, NewUser, Order, Payment, PaymentRequest, Product,
        RegisterRequest, UpdateCartItemRequest, UpdateProductRequest, User, UserProfile,
        WishlistItem, order_total,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

const SELLER_ROLES: [Role; 2] = [Role::Seller, Role::Admin];
const CUSTOMER_ROLES: [Role; 1] = [Role::Customer];
const MIN_PASSWORD_LEN: usize = 8;

/// ProductFilter
///
/// Query parameters for the public catalog listing (GET /api/products).
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ProductFilter {
    /// Case-insensitive substring over product name and description.
    pub search: Option<String>,
    /// Exact category, compared case-insensitively.
    pub category: Option<String>,
}

fn issue_token(state: &AppState, user: &User) -> Result<String, ApiError> {
    state.authorizer.tokens().sign(user).map_err(|e| {
        tracing::error!(error = %e, user_id = %user.id, "could not sign session token");
        ApiError::Internal
    })
}

fn require_positive_quantity(quantity: i32) -> Result<(), ApiError> {
    if quantity < 1 {
        return Err(ApiError::BadRequest("quantity must be at least 1".to_string()));
    }
    Ok(())
}

// --- Session ---

/// register_user
///
/// [Public Route] Creates a customer or seller account and returns a session
/// token. Administrators cannot self-register.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 409, description = "Email taken", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::BadRequest("a valid email is required".to_string()));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }

    let role = match payload.role.as_deref() {
        None => Role::Customer,
        Some(raw) => match Role::parse(raw) {
            Some(Role::Admin) | None => {
                return Err(ApiError::BadRequest(format!("role '{raw}' cannot be registered")));
            }
            Some(role) => role,
        },
    };

    // Business fields only make sense on seller accounts.
    let (business_name, business_description) = match role {
        Role::Seller => (payload.business_name, payload.business_description),
        _ => (None, None),
    };

    let new_user = NewUser {
        email,
        name: payload.name.trim().to_string(),
        role: role.to_string(),
        password_hash: hash_password(&payload.password)?,
        business_name,
        business_description,
    };

    let user = state.repo.create_user(new_user).await?;
    let token = issue_token(&state, &user)?;

    tracing::info!(user_id = %user.id, role = %user.role, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserProfile::from(&user),
        }),
    ))
}

/// login
///
/// [Public Route] Exchanges email and password for a session token. Unknown
/// emails and wrong passwords produce the same error.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let invalid = || ApiError::Unauthorized(AuthFailure::InvalidCredentials);

    let credentials = state
        .repo
        .get_credentials(payload.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &credentials.password_hash) {
        tracing::debug!(user_id = %credentials.user.id, "wrong password");
        return Err(invalid());
    }

    let token = issue_token(&state, &credentials.user)?;

    Ok(Json(AuthResponse {
        token,
        user: UserProfile::from(&credentials.user),
    }))
}

/// get_me
///
/// [Authenticated Route] The caller's profile as resolved by the API guard.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Unauthenticated", body = ErrorBody)
    )
)]
pub async fn get_me(caller: AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&caller))
}

// --- Catalog ---

/// get_products
///
/// [Public Route] Lists the catalog with optional search and category filters.
#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductFilter),
    responses((status = 200, description = "Products", body = [Product]))
)]
pub async fn get_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state
        .repo
        .list_products(filter.search, filter.category)
        .await?;
    Ok(Json(products))
}

/// get_product
///
/// [Public Route] A single catalog entry.
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Found", body = Product),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    state
        .repo
        .get_product(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("product"))
}

/// get_seller_products
///
/// [Seller Route] Products listed by the caller.
#[utoipa::path(
    get,
    path = "/api/seller/products",
    responses(
        (status = 200, description = "My products", body = [Product]),
        (status = 403, description = "Not a seller", body = ErrorBody)
    )
)]
pub async fn get_seller_products(
    caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, ApiError> {
    check_role(Some(&caller), &SELLER_ROLES)?;
    Ok(Json(state.repo.get_seller_products(caller.id).await?))
}

/// create_product
///
/// [Seller Route] Lists a new product owned by the caller.
#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Created", body = Product),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 403, description = "Not a seller", body = ErrorBody)
    )
)]
pub async fn create_product(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    check_role(Some(&caller), &SELLER_ROLES)?;

    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("product name is required".to_string()));
    }
    if payload.price_cents < 0 || payload.stock < 0 {
        return Err(ApiError::BadRequest(
            "price and stock cannot be negative".to_string(),
        ));
    }

    let product = state.repo.create_product(caller.id, payload).await?;
    tracing::info!(product_id = %product.id, seller_id = %caller.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// update_product
///
/// [Seller Route] Partial update. Sellers may only touch their own products;
/// admins may edit any.
#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated", body = Product),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_product(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    check_role(Some(&caller), &SELLER_ROLES)?;

    let product = state
        .repo
        .get_product(id)
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    if !caller.has_role(Role::Admin) {
        ensure_owner(&caller, product.seller_id)?;
    }

    if payload.price_cents.is_some_and(|p| p < 0) || payload.stock.is_some_and(|s| s < 0) {
        return Err(ApiError::BadRequest(
            "price and stock cannot be negative".to_string(),
        ));
    }

    state
        .repo
        .update_product(id, payload)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("product"))
}

/// delete_product
///
/// [Seller Route] Removes a product. Owner-only unless the caller is an admin.
#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_product(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    check_role(Some(&caller), &SELLER_ROLES)?;

    let product = state
        .repo
        .get_product(id)
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    if !caller.has_role(Role::Admin) {
        ensure_owner(&caller, product.seller_id)?;
    }

    if state.repo.delete_product(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("product"))
    }
}

// --- Cart ---

/// get_cart
///
/// [Customer Route] The caller's cart lines.
#[utoipa::path(
    get,
    path = "/api/cart",
    responses((status = 200, description = "Cart", body = [CartItem]))
)]
pub async fn get_cart(
    caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CartItem>>, ApiError> {
    check_role(Some(&caller), &CUSTOMER_ROLES)?;
    Ok(Json(state.repo.get_cart(caller.id).await?))
}

/// add_to_cart
///
/// [Customer Route] Adds a product, merging with an existing line.
#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddCartItemRequest,
    responses(
        (status = 201, description = "Added", body = CartItem),
        (status = 404, description = "Unknown product", body = ErrorBody)
    )
)]
pub async fn add_to_cart(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AddCartItemRequest>,
) -> Result<(StatusCode, Json<CartItem>), ApiError> {
    check_role(Some(&caller), &CUSTOMER_ROLES)?;
    require_positive_quantity(payload.quantity)?;

    state
        .repo
        .get_product(payload.product_id)
        .await?
        .ok_or(ApiError::NotFound("product"))?;

    let item = state
        .repo
        .add_cart_item(caller.id, payload.product_id, payload.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// update_cart_item
///
/// [Customer Route] Sets the quantity of one of the caller's cart lines.
#[utoipa::path(
    put,
    path = "/api/cart/{id}",
    params(("id" = Uuid, Path, description = "Cart item ID")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Updated", body = CartItem),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_cart_item(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<Json<CartItem>, ApiError> {
    check_role(Some(&caller), &CUSTOMER_ROLES)?;

    let item = state
        .repo
        .get_cart_item(id)
        .await?
        .ok_or(ApiError::NotFound("cart item"))?;
    ensure_owner(&caller, item.user_id)?;
    require_positive_quantity(payload.quantity)?;

    state
        .repo
        .update_cart_item(id, payload.quantity)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("cart item"))
}

/// delete_cart_item
///
/// [Customer Route] Removes one of the caller's cart lines.
#[utoipa::path(
    delete,
    path = "/api/cart/{id}",
    params(("id" = Uuid, Path, description = "Cart item ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_cart_item(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    check_role(Some(&caller), &CUSTOMER_ROLES)?;

    let item = state
        .repo
        .get_cart_item(id)
        .await?
        .ok_or(ApiError::NotFound("cart item"))?;
    ensure_owner(&caller, item.user_id)?;

    if state.repo.delete_cart_item(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("cart item"))
    }
}

// --- Wishlist ---

#[utoipa::path(
    get,
    path = "/api/wishlist",
    responses((status = 200, description = "Wishlist", body = [WishlistItem]))
)]
pub async fn get_wishlist(
    caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<WishlistItem>>, ApiError> {
    check_role(Some(&caller), &CUSTOMER_ROLES)?;
    Ok(Json(state.repo.get_wishlist(caller.id).await?))
}

/// add_to_wishlist
///
/// [Customer Route] Saves a product. Saving the same product twice returns
/// the existing entry.
#[utoipa::path(
    post,
    path = "/api/wishlist",
    request_body = AddWishlistItemRequest,
    responses(
        (status = 201, description = "Saved", body = WishlistItem),
        (status = 404, description = "Unknown product", body = ErrorBody)
    )
)]
pub async fn add_to_wishlist(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AddWishlistItemRequest>,
) -> Result<(StatusCode, Json<WishlistItem>), ApiError> {
    check_role(Some(&caller), &CUSTOMER_ROLES)?;

    state
        .repo
        .get_product(payload.product_id)
        .await?
        .ok_or(ApiError::NotFound("product"))?;

    let item = state
        .repo
        .add_wishlist_item(caller.id, payload.product_id)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    delete,
    path = "/api/wishlist/{id}",
    params(("id" = Uuid, Path, description = "Wishlist item ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_wishlist_item(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    check_role(Some(&caller), &CUSTOMER_ROLES)?;

    let item = state
        .repo
        .get_wishlist_item(id)
        .await?
        .ok_or(ApiError::NotFound("wishlist item"))?;
    ensure_owner(&caller, item.user_id)?;

    if state.repo.delete_wishlist_item(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("wishlist item"))
    }
}

// --- Checkout, Orders, Payments ---

/// checkout
///
/// [Customer Route] Prices the caller's cart from the current catalog, creates
/// a pending order and empties the cart.
#[utoipa::path(
    post,
    path = "/api/checkout",
    responses(
        (status = 201, description = "Order created", body = Order),
        (status = 400, description = "Empty cart or total out of range", body = ErrorBody),
        (status = 409, description = "Product unavailable or out of stock", body = ErrorBody)
    )
)]
pub async fn checkout(
    caller: AuthUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    check_role(Some(&caller), &CUSTOMER_ROLES)?;

    let cart = state.repo.get_cart(caller.id).await?;
    if cart.is_empty() {
        return Err(ApiError::BadRequest("cart is empty".to_string()));
    }

    let mut lines = Vec::with_capacity(cart.len());
    for item in &cart {
        let product = state.repo.get_product(item.product_id).await?.ok_or_else(|| {
            ApiError::Conflict(format!("product {} is no longer available", item.product_id))
        })?;
        if product.stock < item.quantity {
            return Err(ApiError::Conflict(format!(
                "only {} of '{}' left in stock",
                product.stock, product.name
            )));
        }
        lines.push(NewOrderLine {
            product_id: product.id,
            quantity: item.quantity,
            unit_price_cents: product.price_cents,
        });
    }

    if order_total(&lines).is_none() {
        return Err(ApiError::BadRequest("order total is out of range".to_string()));
    }

    // Stock is re-checked and reserved inside the order transaction.
    let order = state.repo.create_order(caller.id, lines).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    responses((status = 200, description = "Order history", body = [Order]))
)]
pub async fn get_orders(
    caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, ApiError> {
    check_role(Some(&caller), &CUSTOMER_ROLES)?;
    Ok(Json(state.repo.get_orders(caller.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order", body = Order),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_order(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    check_role(Some(&caller), &CUSTOMER_ROLES)?;

    let order = state
        .repo
        .get_order(id)
        .await?
        .ok_or(ApiError::NotFound("order"))?;
    ensure_owner(&caller, order.user_id)?;
    Ok(Json(order))
}

/// pay_order
///
/// [Customer Route] Records a payment covering the full order total and marks
/// the order paid.
#[utoipa::path(
    post,
    path = "/api/orders/{id}/payments",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = PaymentRequest,
    responses(
        (status = 201, description = "Paid", body = Payment),
        (status = 400, description = "Amount mismatch", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Already paid", body = ErrorBody)
    )
)]
pub async fn pay_order(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    check_role(Some(&caller), &CUSTOMER_ROLES)?;

    let order = state
        .repo
        .get_order(id)
        .await?
        .ok_or(ApiError::NotFound("order"))?;
    ensure_owner(&caller, order.user_id)?;

    if order.is_paid() {
        return Err(ApiError::Conflict(format!("order {id} is already paid")));
    }
    if payload.amount_cents != order.total_cents {
        return Err(ApiError::BadRequest(format!(
            "payment must equal the order total of {} cents",
            order.total_cents
        )));
    }
    if payload.method.trim().is_empty() {
        return Err(ApiError::BadRequest("payment method is required".to_string()));
    }

    let payment = state
        .repo
        .record_payment(id, caller.id, payload.amount_cents, payload.method)
        .await?;

    tracing::info!(order_id = %id, payment_id = %payment.id, "order paid");
    Ok((StatusCode::CREATED, Json(payment)))
}
