use async_trait::async_trait;
use sqlx::{PgPool, QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::{
    CartItem, CreateProductRequest, NewOrderLine, NewUser, Order, OrderItem, Payment, Product,
    StoredCredentials, UpdateProductRequest, User, WishlistItem, order_total,
};

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence collaborator. Handlers and the API guard only talk to this
/// trait, so tests can swap the Postgres implementation for an in-memory one.
///
/// Ownership is NOT enforced here: handlers load the record, compare owners,
/// and only then call the mutating method.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_credentials(&self, email: &str) -> RepoResult<Option<StoredCredentials>>;
    // Fails with `RepositoryError::Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;

    // --- Catalog ---
    async fn list_products(
        &self,
        search: Option<String>,
        category: Option<String>,
    ) -> RepoResult<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>>;
    async fn get_seller_products(&self, seller_id: Uuid) -> RepoResult<Vec<Product>>;
    async fn create_product(&self, seller_id: Uuid, req: CreateProductRequest) -> RepoResult<Product>;
    async fn update_product(&self, id: Uuid, req: UpdateProductRequest) -> RepoResult<Option<Product>>;
    async fn delete_product(&self, id: Uuid) -> RepoResult<bool>;

    // --- Cart ---
    async fn get_cart(&self, user_id: Uuid) -> RepoResult<Vec<CartItem>>;
    async fn get_cart_item(&self, id: Uuid) -> RepoResult<Option<CartItem>>;
    // Adds to the existing line for the same product instead of duplicating it.
    async fn add_cart_item(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> RepoResult<CartItem>;
    async fn update_cart_item(&self, id: Uuid, quantity: i32) -> RepoResult<Option<CartItem>>;
    async fn delete_cart_item(&self, id: Uuid) -> RepoResult<bool>;

    // --- Wishlist ---
    async fn get_wishlist(&self, user_id: Uuid) -> RepoResult<Vec<WishlistItem>>;
    async fn get_wishlist_item(&self, id: Uuid) -> RepoResult<Option<WishlistItem>>;
    // Idempotent per (user, product).
    async fn add_wishlist_item(&self, user_id: Uuid, product_id: Uuid) -> RepoResult<WishlistItem>;
    async fn delete_wishlist_item(&self, id: Uuid) -> RepoResult<bool>;

    // --- Orders & Payments ---
    // Inserts the order and its lines and empties the caller's cart atomically.
    async fn create_order(&self, user_id: Uuid, lines: Vec<NewOrderLine>) -> RepoResult<Order>;
    async fn get_orders(&self, user_id: Uuid) -> RepoResult<Vec<Order>>;
    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>>;
    // Records the payment and marks the order paid atomically.
    async fn record_payment(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        amount_cents: i64,
        method: String,
    ) -> RepoResult<Payment>;
}

/// RepositoryState
///
/// Shared handle to the persistence layer held in the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str =
    "id, email, name, role, business_name, business_description, created_at";
const PRODUCT_COLUMNS: &str = "id, seller_id, name, description, category, price_cents, stock, image_url, created_at, updated_at";

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Schema lives in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_order_items(&self, order: &mut Order) -> RepoResult<()> {
        order.items = sqlx::query_as::<_, OrderItem>(
            "SELECT order_id, product_id, quantity, unit_price_cents FROM order_items WHERE order_id = $1",
        )
        .bind(order.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_credentials(&self, email: &str) -> RepoResult<Option<StoredCredentials>> {
        let query =
            format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE lower(email) = lower($1)");
        Ok(sqlx::query_as::<_, StoredCredentials>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let query = format!(
            "INSERT INTO users (id, email, name, role, password_hash, business_name, business_description, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW()) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.role)
            .bind(&user.password_hash)
            .bind(&user.business_name)
            .bind(&user.business_description)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RepositoryError::Conflict(format!("email {} is already registered", user.email))
                } else {
                    RepositoryError::Database(e)
                }
            })
    }

    /// Case-insensitive search over name and description, optional exact category.
    async fn list_products(
        &self,
        search: Option<String>,
        category: Option<String>,
    ) -> RepoResult<Vec<Product>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE 1 = 1"));

        if let Some(c) = category {
            builder.push(" AND lower(category) = lower(");
            builder.push_bind(c);
            builder.push(")");
        }

        if let Some(s) = search {
            let pattern = format!("%{}%", s);
            builder.push(" AND (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR description ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY created_at DESC");

        Ok(builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        Ok(sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_seller_products(&self, seller_id: Uuid) -> RepoResult<Vec<Product>> {
        let query = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE seller_id = $1 ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, Product>(&query)
            .bind(seller_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_product(&self, seller_id: Uuid, req: CreateProductRequest) -> RepoResult<Product> {
        let query = format!(
            "INSERT INTO products (id, seller_id, name, description, category, price_cents, stock, image_url, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) RETURNING {PRODUCT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Product>(&query)
            .bind(Uuid::new_v4())
            .bind(seller_id)
            .bind(req.name)
            .bind(req.description)
            .bind(req.category)
            .bind(req.price_cents)
            .bind(req.stock)
            .bind(req.image_url)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Partial update: `COALESCE` keeps the stored value for every `None` field.
    async fn update_product(&self, id: Uuid, req: UpdateProductRequest) -> RepoResult<Option<Product>> {
        let query = format!(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                price_cents = COALESCE($5, price_cents),
                stock = COALESCE($6, stock),
                image_url = COALESCE($7, image_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .bind(req.name)
            .bind(req.description)
            .bind(req.category)
            .bind(req.price_cents)
            .bind(req.stock)
            .bind(req.image_url)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_product(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_cart(&self, user_id: Uuid) -> RepoResult<Vec<CartItem>> {
        Ok(sqlx::query_as::<_, CartItem>(
            "SELECT id, user_id, product_id, quantity, created_at FROM cart_items WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_cart_item(&self, id: Uuid) -> RepoResult<Option<CartItem>> {
        Ok(sqlx::query_as::<_, CartItem>(
            "SELECT id, user_id, product_id, quantity, created_at FROM cart_items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn add_cart_item(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> RepoResult<CartItem> {
        Ok(sqlx::query_as::<_, CartItem>(
            r#"
            INSERT INTO cart_items (id, user_id, product_id, quantity, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            RETURNING id, user_id, product_id, quantity, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_cart_item(&self, id: Uuid, quantity: i32) -> RepoResult<Option<CartItem>> {
        Ok(sqlx::query_as::<_, CartItem>(
            "UPDATE cart_items SET quantity = $2 WHERE id = $1 RETURNING id, user_id, product_id, quantity, created_at",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_cart_item(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_wishlist(&self, user_id: Uuid) -> RepoResult<Vec<WishlistItem>> {
        Ok(sqlx::query_as::<_, WishlistItem>(
            "SELECT id, user_id, product_id, created_at FROM wishlist_items WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_wishlist_item(&self, id: Uuid) -> RepoResult<Option<WishlistItem>> {
        Ok(sqlx::query_as::<_, WishlistItem>(
            "SELECT id, user_id, product_id, created_at FROM wishlist_items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn add_wishlist_item(&self, user_id: Uuid, product_id: Uuid) -> RepoResult<WishlistItem> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        Ok(sqlx::query_as::<_, WishlistItem>(
            r#"
            INSERT INTO wishlist_items (id, user_id, product_id, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, product_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, product_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_wishlist_item(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_order(&self, user_id: Uuid, lines: Vec<NewOrderLine>) -> RepoResult<Order> {
        let total = order_total(&lines)
            .ok_or_else(|| RepositoryError::Conflict("order total is out of range".to_string()))?;

        let mut tx = self.pool.begin().await?;

        // Stock is reserved row by row; a short line rolls the whole order back.
        for line in &lines {
            let reserved = sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
            if reserved.rows_affected() == 0 {
                return Err(RepositoryError::Conflict(format!(
                    "product {} does not have {} in stock",
                    line.product_id, line.quantity
                )));
            }
        }

        let mut order = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (id, user_id, status, total_cents, created_at) VALUES ($1, $2, $3, $4, NOW()) \
             RETURNING id, user_id, status, total_cents, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(Order::PENDING)
        .bind(total)
        .fetch_one(&mut *tx)
        .await?;

        for line in &lines {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, unit_price_cents) VALUES ($1, $2, $3, $4)",
            )
            .bind(order.id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        order.items = lines
            .into_iter()
            .map(|line| OrderItem {
                order_id: order.id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
            })
            .collect();

        tracing::info!(order_id = %order.id, user_id = %user_id, total_cents = total, "order created");
        Ok(order)
    }

    async fn get_orders(&self, user_id: Uuid) -> RepoResult<Vec<Order>> {
        let mut orders = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, status, total_cents, created_at FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        for order in orders.iter_mut() {
            self.load_order_items(order).await?;
        }
        Ok(orders)
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, status, total_cents, created_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match order {
            Some(mut order) => {
                self.load_order_items(&mut order).await?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn record_payment(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        amount_cents: i64,
        method: String,
    ) -> RepoResult<Payment> {
        let mut tx = self.pool.begin().await?;

        // Guarded on status so two concurrent payments cannot both succeed.
        let updated = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1 AND status = $3")
            .bind(order_id)
            .bind(Order::PAID)
            .bind(Order::PENDING)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "order {order_id} is not awaiting payment"
            )));
        }

        let payment = sqlx::query_as::<_, Payment>(
            "INSERT INTO payments (id, order_id, user_id, amount_cents, method, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, 'completed', NOW()) \
             RETURNING id, order_id, user_id, amount_cents, method, status, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(user_id)
        .bind(amount_cents)
        .bind(method)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(payment)
    }
}
