#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use storefront_gateway::{
    AppConfig, AppState,
    auth::{Claims, TokenCodec},
    error::RepositoryError,
    models::{
        CartItem, CreateProductRequest, NewOrderLine, NewUser, Order, OrderItem, Payment, Product,
        StoredCredentials, UpdateProductRequest, User, WishlistItem, order_total,
    },
    repository::{RepoResult, Repository, RepositoryState},
};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

pub const CUSTOMER_A: Uuid = Uuid::from_u128(0xA);
pub const CUSTOMER_B: Uuid = Uuid::from_u128(0xB);
pub const SELLER_ID: Uuid = Uuid::from_u128(0x5E11);
pub const OTHER_SELLER_ID: Uuid = Uuid::from_u128(0x5E12);
pub const ADMIN_ID: Uuid = Uuid::from_u128(0xAD);
pub const PRODUCT_ID: Uuid = Uuid::from_u128(0x9001);
pub const CART_ITEM_A: Uuid = Uuid::from_u128(0xCA01);

// --- In-memory Repository ---

/// Repository double backed by vectors. Every mutating call bumps
/// `mutations`, so tests can assert that a rejected request wrote nothing.
#[derive(Default)]
pub struct MockRepo {
    pub users: Mutex<Vec<StoredCredentials>>,
    pub products: Mutex<Vec<Product>>,
    pub cart: Mutex<Vec<CartItem>>,
    pub wishlist: Mutex<Vec<WishlistItem>>,
    pub orders: Mutex<Vec<Order>>,
    pub payments: Mutex<Vec<Payment>>,
    pub mutations: AtomicUsize,
    /// When true, `get_user` fails like an unreachable database.
    pub fail_user_lookup: bool,
}

impl MockRepo {
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn mutated(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    pub fn with_user(self, user: User) -> Self {
        self.users.lock().unwrap().push(StoredCredentials {
            user,
            password_hash: String::new(),
        });
        self
    }

    pub fn with_product(self, product: Product) -> Self {
        self.products.lock().unwrap().push(product);
        self
    }

    pub fn with_cart_item(self, item: CartItem) -> Self {
        self.cart.lock().unwrap().push(item);
        self
    }

    pub fn with_wishlist_item(self, item: WishlistItem) -> Self {
        self.wishlist.lock().unwrap().push(item);
        self
    }

    pub fn with_order(self, order: Order) -> Self {
        self.orders.lock().unwrap().push(order);
        self
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        if self.fail_user_lookup {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.user.id == id)
            .map(|c| c.user.clone()))
    }

    async fn get_credentials(&self, email: &str) -> RepoResult<Option<StoredCredentials>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|c| c.user.email.eq_ignore_ascii_case(&user.email)) {
            return Err(RepositoryError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            role: user.role,
            business_name: user.business_name,
            business_description: user.business_description,
            created_at: Utc::now(),
        };
        users.push(StoredCredentials {
            user: created.clone(),
            password_hash: user.password_hash,
        });
        self.mutated();
        Ok(created)
    }

    async fn list_products(
        &self,
        search: Option<String>,
        category: Option<String>,
    ) -> RepoResult<Vec<Product>> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .filter(|p| {
                category
                    .as_ref()
                    .is_none_or(|c| p.category.eq_ignore_ascii_case(c))
            })
            .filter(|p| {
                search.as_ref().is_none_or(|s| {
                    let s = s.to_lowercase();
                    p.name.to_lowercase().contains(&s) || p.description.to_lowercase().contains(&s)
                })
            })
            .cloned()
            .collect())
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn get_seller_products(&self, seller_id: Uuid) -> RepoResult<Vec<Product>> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.seller_id == seller_id)
            .cloned()
            .collect())
    }

    async fn create_product(&self, seller_id: Uuid, req: CreateProductRequest) -> RepoResult<Product> {
        let product = Product {
            id: Uuid::new_v4(),
            seller_id,
            name: req.name,
            description: req.description,
            category: req.category,
            price_cents: req.price_cents,
            stock: req.stock,
            image_url: req.image_url,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.products.lock().unwrap().push(product.clone());
        self.mutated();
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, req: UpdateProductRequest) -> RepoResult<Option<Product>> {
        let mut products = self.products.lock().unwrap();
        let Some(product) = products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            product.name = name;
        }
        if let Some(description) = req.description {
            product.description = description;
        }
        if let Some(category) = req.category {
            product.category = category;
        }
        if let Some(price) = req.price_cents {
            product.price_cents = price;
        }
        if let Some(stock) = req.stock {
            product.stock = stock;
        }
        if req.image_url.is_some() {
            product.image_url = req.image_url;
        }
        product.updated_at = Utc::now();
        self.mutated();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: Uuid) -> RepoResult<bool> {
        let mut products = self.products.lock().unwrap();
        let before = products.len();
        products.retain(|p| p.id != id);
        self.mutated();
        Ok(products.len() < before)
    }

    async fn get_cart(&self, user_id: Uuid) -> RepoResult<Vec<CartItem>> {
        Ok(self
            .cart
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_cart_item(&self, id: Uuid) -> RepoResult<Option<CartItem>> {
        Ok(self.cart.lock().unwrap().iter().find(|i| i.id == id).cloned())
    }

    async fn add_cart_item(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> RepoResult<CartItem> {
        let mut cart = self.cart.lock().unwrap();
        self.mutated();
        if let Some(existing) = cart
            .iter_mut()
            .find(|i| i.user_id == user_id && i.product_id == product_id)
        {
            existing.quantity += quantity;
            return Ok(existing.clone());
        }
        let item = CartItem {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            quantity,
            created_at: Utc::now(),
        };
        cart.push(item.clone());
        Ok(item)
    }

    async fn update_cart_item(&self, id: Uuid, quantity: i32) -> RepoResult<Option<CartItem>> {
        let mut cart = self.cart.lock().unwrap();
        self.mutated();
        Ok(cart.iter_mut().find(|i| i.id == id).map(|item| {
            item.quantity = quantity;
            item.clone()
        }))
    }

    async fn delete_cart_item(&self, id: Uuid) -> RepoResult<bool> {
        let mut cart = self.cart.lock().unwrap();
        let before = cart.len();
        cart.retain(|i| i.id != id);
        self.mutated();
        Ok(cart.len() < before)
    }

    async fn get_wishlist(&self, user_id: Uuid) -> RepoResult<Vec<WishlistItem>> {
        Ok(self
            .wishlist
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_wishlist_item(&self, id: Uuid) -> RepoResult<Option<WishlistItem>> {
        Ok(self.wishlist.lock().unwrap().iter().find(|i| i.id == id).cloned())
    }

    async fn add_wishlist_item(&self, user_id: Uuid, product_id: Uuid) -> RepoResult<WishlistItem> {
        let mut wishlist = self.wishlist.lock().unwrap();
        if let Some(existing) = wishlist
            .iter()
            .find(|i| i.user_id == user_id && i.product_id == product_id)
        {
            return Ok(existing.clone());
        }
        let item = WishlistItem {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            created_at: Utc::now(),
        };
        wishlist.push(item.clone());
        self.mutated();
        Ok(item)
    }

    async fn delete_wishlist_item(&self, id: Uuid) -> RepoResult<bool> {
        let mut wishlist = self.wishlist.lock().unwrap();
        let before = wishlist.len();
        wishlist.retain(|i| i.id != id);
        self.mutated();
        Ok(wishlist.len() < before)
    }

    async fn create_order(&self, user_id: Uuid, lines: Vec<NewOrderLine>) -> RepoResult<Order> {
        let total_cents = order_total(&lines)
            .ok_or_else(|| RepositoryError::Conflict("order total is out of range".to_string()))?;

        let mut products = self.products.lock().unwrap();
        for line in &lines {
            let in_stock = products
                .iter()
                .any(|p| p.id == line.product_id && p.stock >= line.quantity);
            if !in_stock {
                return Err(RepositoryError::Conflict(format!(
                    "product {} does not have {} in stock",
                    line.product_id, line.quantity
                )));
            }
        }
        for line in &lines {
            if let Some(p) = products.iter_mut().find(|p| p.id == line.product_id) {
                p.stock -= line.quantity;
            }
        }
        drop(products);

        let id = Uuid::new_v4();
        let order = Order {
            id,
            user_id,
            status: Order::PENDING.to_string(),
            total_cents,
            created_at: Utc::now(),
            items: lines
                .into_iter()
                .map(|l| OrderItem {
                    order_id: id,
                    product_id: l.product_id,
                    quantity: l.quantity,
                    unit_price_cents: l.unit_price_cents,
                })
                .collect(),
        };
        self.orders.lock().unwrap().push(order.clone());
        self.cart.lock().unwrap().retain(|i| i.user_id != user_id);
        self.mutated();
        Ok(order)
    }

    async fn get_orders(&self, user_id: Uuid) -> RepoResult<Vec<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        Ok(self.orders.lock().unwrap().iter().find(|o| o.id == id).cloned())
    }

    async fn record_payment(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        amount_cents: i64,
        method: String,
    ) -> RepoResult<Payment> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id && o.status == Order::PENDING)
            .ok_or_else(|| RepositoryError::Conflict("order is not awaiting payment".to_string()))?;
        order.status = Order::PAID.to_string();
        let payment = Payment {
            id: Uuid::new_v4(),
            order_id,
            user_id,
            amount_cents,
            method,
            status: "completed".to_string(),
            created_at: Utc::now(),
        };
        self.payments.lock().unwrap().push(payment.clone());
        self.mutated();
        Ok(payment)
    }
}

// --- Fixtures ---

pub fn user(id: Uuid, role: &str) -> User {
    User {
        id,
        email: format!("{}@shop.test", id.simple()),
        name: format!("user-{}", id.simple()),
        role: role.to_string(),
        business_name: None,
        business_description: None,
        created_at: Utc::now(),
    }
}

pub fn product(id: Uuid, seller_id: Uuid, price_cents: i64, stock: i32) -> Product {
    Product {
        id,
        seller_id,
        name: "Walnut Desk Lamp".to_string(),
        description: "Hand-turned walnut base".to_string(),
        category: "lighting".to_string(),
        price_cents,
        stock,
        image_url: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn wishlist_item(id: Uuid, user_id: Uuid, product_id: Uuid) -> WishlistItem {
    WishlistItem {
        id,
        user_id,
        product_id,
        created_at: Utc::now(),
    }
}

pub fn cart_item(id: Uuid, user_id: Uuid, product_id: Uuid, quantity: i32) -> CartItem {
    CartItem {
        id,
        user_id,
        product_id,
        quantity,
        created_at: Utc::now(),
    }
}

/// A repository with two customers, two sellers, an admin, one product and
/// one cart line owned by customer A.
pub fn seeded_repo() -> MockRepo {
    MockRepo::default()
        .with_user(user(CUSTOMER_A, "customer"))
        .with_user(user(CUSTOMER_B, "CUSTOMER"))
        .with_user(user(SELLER_ID, "seller"))
        .with_user(user(OTHER_SELLER_ID, "Seller"))
        .with_user(user(ADMIN_ID, "admin"))
        .with_product(product(PRODUCT_ID, SELLER_ID, 2_500, 10))
        .with_cart_item(cart_item(CART_ITEM_A, CUSTOMER_A, PRODUCT_ID, 1))
}

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        site_root: "./does-not-exist".to_string(),
        ..AppConfig::default()
    }
}

pub fn test_state(repo: Arc<MockRepo>) -> AppState {
    AppState::new(repo as RepositoryState, test_config()).expect("storefront policy compiles")
}

/// Like [`test_state`], but pages are served from `site_root`.
pub fn test_state_with_site(repo: Arc<MockRepo>, site_root: &str) -> AppState {
    let config = AppConfig {
        site_root: site_root.to_string(),
        ..test_config()
    };
    AppState::new(repo as RepositoryState, config).expect("storefront policy compiles")
}

pub fn codec() -> TokenCodec {
    TokenCodec::new(TEST_JWT_SECRET, 7)
}

/// A valid 7-day token for `user`.
pub fn token_for(user: &User) -> String {
    codec().sign(user).unwrap()
}

/// A token for `id` carrying `role`, expiring `exp_offset` seconds from now
/// (negative for an already expired token).
pub fn token_with(id: Uuid, role: &str, exp_offset: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: id,
        email: "claims@shop.test".to_string(),
        role: role.to_string(),
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };
    codec().sign_claims(&claims).unwrap()
}

/// Same claims, signed with a different secret.
pub fn forged_token(id: Uuid, role: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: id,
        email: "forged@shop.test".to_string(),
        role: role.to_string(),
        iat: now as usize,
        exp: (now + 3600) as usize,
    };
    TokenCodec::new("some-other-secret", 7)
        .sign_claims(&claims)
        .unwrap()
}
