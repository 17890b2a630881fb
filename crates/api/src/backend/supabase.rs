//! Supabase backend: the project's Postgres database accessed with `sqlx`.
//!
//! Queries are built at runtime (`query_as` + `FromRow`) so the crate builds
//! without a live database. Order creation runs in a single transaction.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use emporium_core::{
    AuthUser, CartItemId, NewProduct, Order, OrderHeader, OrderId, OrderItem, OrderStatus,
    Product, ProductFilter, ProductId, ProductUpdate, ProfileUpdate, Rating, ShippingAddress,
    StoredCartItem, UserId, UserProfile,
};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};

use super::{BackendError, BackendKind, DataBackend};

const PRODUCT_COLUMNS: &str = "id, title, price, description, category, image, rating_rate, \
     rating_count, specifications, is_featured, duplicated_from, created_at, updated_at";

const CART_COLUMNS: &str = "id, user_id, product_id, quantity, created_at";

const ORDER_COLUMNS: &str =
    "id, user_id, total, shipping_address, payment_intent_id, status, created_at, updated_at";

const PROFILE_COLUMNS: &str = "id, email, full_name, avatar_url, phone, created_at, updated_at";

// =============================================================================
// Row types
// =============================================================================

#[derive(FromRow)]
struct ProductRow {
    id: ProductId,
    title: String,
    price: Decimal,
    description: String,
    category: String,
    image: String,
    rating_rate: f64,
    rating_count: i32,
    specifications: Option<Json<BTreeMap<String, String>>>,
    is_featured: bool,
    duplicated_from: Option<ProductId>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            price: row.price,
            description: row.description,
            category: row.category,
            image: row.image,
            rating: Rating {
                rate: row.rating_rate,
                count: u32::try_from(row.rating_count).unwrap_or_default(),
            },
            specifications: row.specifications.map(|Json(specs)| specs),
            is_featured: row.is_featured,
            duplicated_from: row.duplicated_from,
            created_at: Some(row.created_at),
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CartRow {
    id: CartItemId,
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
    created_at: DateTime<Utc>,
}

impl CartRow {
    fn into_item(self, product: Option<Product>) -> StoredCartItem {
        StoredCartItem {
            id: self.id,
            user_id: self.user_id,
            product_id: self.product_id,
            quantity: u32::try_from(self.quantity).unwrap_or_default(),
            created_at: Some(self.created_at),
            product,
        }
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    total: Decimal,
    shipping_address: Option<Json<ShippingAddress>>,
    payment_intent_id: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, BackendError> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(BackendError::Decode)?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            items,
            total: self.total,
            shipping_address: self.shipping_address.map(|Json(address)| address),
            payment_intent_id: self.payment_intent_id,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct OrderItemRow {
    order_id: OrderId,
    product_id: ProductId,
    title: String,
    price: Decimal,
    quantity: i32,
    image: Option<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            product_id: row.product_id,
            title: row.title,
            price: row.price,
            quantity: u32::try_from(row.quantity).unwrap_or_default(),
            image: row.image,
        }
    }
}

#[derive(FromRow)]
struct ProfileRow {
    id: UserId,
    email: Option<String>,
    full_name: Option<String>,
    avatar_url: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            avatar_url: row.avatar_url,
            phone: row.phone,
            created_at: Some(row.created_at),
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Backend
// =============================================================================

/// Postgres-backed data backend.
#[derive(Clone)]
pub struct SupabaseBackend {
    pool: PgPool,
}

impl SupabaseBackend {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Products keyed by id, for joining into cart rows.
    async fn products_by_id(
        &self,
        ids: Vec<String>,
    ) -> Result<HashMap<ProductId, Product>, BackendError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        let rows: Vec<ProductRow> = sqlx::query_as(&sql).bind(ids).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.id.clone(), Product::from(row)))
            .collect())
    }

    async fn join_cart(&self, rows: Vec<CartRow>) -> Result<Vec<StoredCartItem>, BackendError> {
        let ids = rows.iter().map(|r| r.product_id.to_string()).collect();
        let mut products = self.products_by_id(ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let product = products.remove(&row.product_id);
                row.into_item(product)
            })
            .collect())
    }

    /// Attach line items to order rows.
    async fn with_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, BackendError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.to_string()).collect();
        let item_rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT order_id, product_id, title, price, quantity, image \
             FROM order_items WHERE order_id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            grouped
                .entry(row.order_id.clone())
                .or_default()
                .push(OrderItem::from(row));
        }

        rows.into_iter()
            .map(|row| {
                let items = grouped.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }
}

fn to_i32(value: u32, what: &str) -> Result<i32, BackendError> {
    i32::try_from(value).map_err(|_| BackendError::Decode(format!("{what} {value} out of range")))
}

/// `ILIKE` pattern matching `term` anywhere, with wildcards escaped.
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

async fn insert_header<'e>(
    executor: impl PgExecutor<'e>,
    header: &OrderHeader,
) -> Result<OrderRow, sqlx::Error> {
    let sql = format!(
        "INSERT INTO orders (user_id, total, shipping_address, payment_intent_id, status) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {ORDER_COLUMNS}"
    );
    sqlx::query_as(&sql)
        .bind(&header.user_id)
        .bind(header.total)
        .bind(header.shipping_address.clone().map(Json))
        .bind(&header.payment_intent_id)
        .bind(header.status.as_str())
        .fetch_one(executor)
        .await
}

async fn insert_items<'e>(
    executor: impl PgExecutor<'e>,
    order: &OrderId,
    items: &[OrderItem],
) -> Result<(), BackendError> {
    if items.is_empty() {
        return Ok(());
    }
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        rows.push((item, to_i32(item.quantity, "quantity")?));
    }

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "INSERT INTO order_items (order_id, product_id, title, price, quantity, image) ",
    );
    builder.push_values(rows, |mut row, (item, quantity)| {
        row.push_bind(order.as_str())
            .push_bind(item.product_id.as_str())
            .push_bind(item.title.as_str())
            .push_bind(item.price)
            .push_bind(quantity)
            .push_bind(item.image.as_deref());
    });
    builder.build().execute(executor).await?;
    Ok(())
}

#[async_trait]
impl DataBackend for SupabaseBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Supabase
    }

    async fn ping(&self) -> Result<(), BackendError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, BackendError> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE TRUE"));
        if let Some(category) = &filter.category {
            builder.push(" AND category = ").push_bind(category.clone());
        }
        if filter.featured {
            builder.push(" AND is_featured");
        }
        if let Some(search) = &filter.search {
            builder
                .push(" AND title ILIKE ")
                .push_bind(contains_pattern(search));
        }
        builder.push(" ORDER BY created_at, id");
        if let Some(limit) = filter.limit {
            builder
                .push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<ProductRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, BackendError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, BackendError> {
        let sql = format!(
            "INSERT INTO products (title, price, description, category, image, rating_rate, \
             rating_count, specifications, is_featured, duplicated_from) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {PRODUCT_COLUMNS}"
        );
        let row: ProductRow = sqlx::query_as(&sql)
            .bind(&product.title)
            .bind(product.price)
            .bind(&product.description)
            .bind(&product.category)
            .bind(&product.image)
            .bind(product.rating.rate)
            .bind(to_i32(product.rating.count, "rating count")?)
            .bind(product.specifications.map(Json))
            .bind(product.is_featured)
            .bind(product.duplicated_from)
            .fetch_one(&self.pool)
            .await?;
        Ok(Product::from(row))
    }

    async fn update_product(
        &self,
        id: &ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, BackendError> {
        let sql = format!(
            "UPDATE products SET \
                title = COALESCE($2, title), \
                price = COALESCE($3, price), \
                description = COALESCE($4, description), \
                category = COALESCE($5, category), \
                image = COALESCE($6, image), \
                rating_rate = COALESCE($7, rating_rate), \
                rating_count = COALESCE($8, rating_count), \
                specifications = COALESCE($9, specifications), \
                is_featured = COALESCE($10, is_featured), \
                updated_at = now() \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        );
        let rating_count = update
            .rating
            .map(|r| to_i32(r.count, "rating count"))
            .transpose()?;
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(update.title)
            .bind(update.price)
            .bind(update.description)
            .bind(update.category)
            .bind(update.image)
            .bind(update.rating.map(|r| r.rate))
            .bind(rating_count)
            .bind(update.specifications.map(Json))
            .bind(update.is_featured)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn delete_product(&self, id: &ProductId) -> Result<bool, BackendError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn categories(&self) -> Result<Vec<String>, BackendError> {
        let categories: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM products WHERE category <> '' ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>, BackendError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE title ILIKE $1 OR category ILIKE $1 OR description ILIKE $1 \
             ORDER BY created_at, id"
        );
        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(contains_pattern(query))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn cart_items(&self, user: &UserId) -> Result<Vec<StoredCartItem>, BackendError> {
        let sql = format!(
            "SELECT {CART_COLUMNS} FROM cart_items WHERE user_id = $1 ORDER BY created_at"
        );
        let rows: Vec<CartRow> = sqlx::query_as(&sql)
            .bind(user)
            .fetch_all(&self.pool)
            .await?;
        self.join_cart(rows).await
    }

    async fn add_to_cart(
        &self,
        user: &UserId,
        product: &ProductId,
        quantity: u32,
    ) -> Result<StoredCartItem, BackendError> {
        let sql = format!(
            "INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, product_id) \
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity \
             RETURNING {CART_COLUMNS}"
        );
        let row: CartRow = sqlx::query_as(&sql)
            .bind(user)
            .bind(product)
            .bind(to_i32(quantity, "quantity")?)
            .fetch_one(&self.pool)
            .await?;
        let joined = self.get_product(&row.product_id).await?;
        Ok(row.into_item(joined))
    }

    async fn update_cart_item(
        &self,
        user: &UserId,
        item: &CartItemId,
        quantity: u32,
    ) -> Result<Option<StoredCartItem>, BackendError> {
        let sql = format!(
            "UPDATE cart_items SET quantity = $3 WHERE id = $1 AND user_id = $2 \
             RETURNING {CART_COLUMNS}"
        );
        let row: Option<CartRow> = sqlx::query_as(&sql)
            .bind(item)
            .bind(user)
            .bind(to_i32(quantity, "quantity")?)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let joined = self.get_product(&row.product_id).await?;
                Ok(Some(row.into_item(joined)))
            }
            None => Ok(None),
        }
    }

    async fn remove_cart_item(
        &self,
        user: &UserId,
        item: &CartItemId,
    ) -> Result<bool, BackendError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(item)
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user: &UserId) -> Result<(), BackendError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, BackendError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(user)
            .fetch_all(&self.pool)
            .await?;
        self.with_items(rows).await
    }

    async fn get_order(&self, user: &UserId, id: &OrderId) -> Result<Option<Order>, BackendError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;
        let orders = self.with_items(row.into_iter().collect()).await?;
        Ok(orders.into_iter().next())
    }

    async fn insert_order_header(&self, header: &OrderHeader) -> Result<Order, BackendError> {
        let row = insert_header(&self.pool, header).await?;
        row.into_order(Vec::new())
    }

    async fn insert_order_items(
        &self,
        order: &OrderId,
        items: &[OrderItem],
    ) -> Result<(), BackendError> {
        insert_items(&self.pool, order, items).await
    }

    async fn delete_order(&self, order: &OrderId) -> Result<(), BackendError> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_order(
        &self,
        header: OrderHeader,
        items: Vec<OrderItem>,
    ) -> Result<Order, BackendError> {
        let mut tx = self.pool.begin().await?;
        let row = insert_header(&mut *tx, &header).await?;
        insert_items(&mut *tx, &row.id, &items).await?;
        tx.commit().await?;
        row.into_order(items)
    }

    async fn update_order_status(
        &self,
        user: &UserId,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, BackendError> {
        let sql = format!(
            "UPDATE orders SET status = $3, updated_at = now() \
             WHERE id = $1 AND user_id = $2 RETURNING {ORDER_COLUMNS}"
        );
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(user)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;
        let orders = self.with_items(row.into_iter().collect()).await?;
        Ok(orders.into_iter().next())
    }

    async fn get_profile(&self, user: &AuthUser) -> Result<UserProfile, BackendError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");
        let row: Option<ProfileRow> = sqlx::query_as(&sql)
            .bind(&user.id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map_or_else(|| UserProfile::from(user), UserProfile::from))
    }

    async fn update_profile(
        &self,
        user: &AuthUser,
        update: ProfileUpdate,
    ) -> Result<UserProfile, BackendError> {
        let sql = format!(
            "INSERT INTO profiles (id, email, full_name, avatar_url, phone) \
             VALUES ($1, $2, COALESCE($3, $6), $4, $5) \
             ON CONFLICT (id) DO UPDATE SET \
                email = COALESCE(profiles.email, EXCLUDED.email), \
                full_name = COALESCE($3, profiles.full_name, $6), \
                avatar_url = COALESCE($4, profiles.avatar_url), \
                phone = COALESCE($5, profiles.phone), \
                updated_at = now() \
             RETURNING {PROFILE_COLUMNS}"
        );
        let row: ProfileRow = sqlx::query_as(&sql)
            .bind(&user.id)
            .bind(&user.email)
            .bind(update.full_name)
            .bind(update.avatar_url)
            .bind(update.phone)
            .bind(&user.full_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(UserProfile::from(row))
    }
}
