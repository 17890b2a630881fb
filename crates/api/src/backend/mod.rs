//! Data backends.
//!
//! Every route talks to storage through [`DataBackend`]. One implementation
//! is chosen at startup from [`BackendConfig`]:
//!
//! - [`MockBackend`] - in-memory, seeded with the sample catalog
//! - [`SupabaseBackend`] - Supabase Postgres through `sqlx`
//! - [`FirestoreBackend`] - Firestore REST API through `reqwest`
//!
//! Cart and order operations always take the owning user's id; a backend
//! never returns or mutates rows belonging to someone else.

pub mod firestore;
pub mod mock;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use emporium_core::product::distinct_categories;
use emporium_core::{
    AuthUser, CartItemId, NewProduct, Order, OrderHeader, OrderId, OrderItem, OrderStatus,
    Product, ProductFilter, ProductId, ProductUpdate, ProfileUpdate, StoredCartItem, UserId,
    UserProfile,
};
use thiserror::Error;

use crate::config::BackendConfig;

pub use firestore::FirestoreBackend;
pub use mock::MockBackend;
pub use supabase::SupabaseBackend;

/// Errors raised by a data backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Postgres query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP request to a remote store failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Firestore answered with an error status.
    #[error("Firestore error: {status} - {message}")]
    Firestore { status: u16, message: String },

    /// Could not obtain an access token for the remote store.
    #[error("Token error: {0}")]
    Token(String),

    /// A stored record could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The backend is temporarily unable to serve the request.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Which implementation is serving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Mock,
    Supabase,
    Firestore,
}

impl BackendKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Supabase => "supabase",
            Self::Firestore => "firestore",
        }
    }
}

/// Storage operations used by the route handlers.
#[async_trait]
pub trait DataBackend: Send + Sync + 'static {
    /// Which implementation this is.
    fn kind(&self) -> BackendKind;

    /// Cheap connectivity check for the readiness probe.
    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, BackendError>;

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, BackendError>;

    async fn create_product(&self, product: NewProduct) -> Result<Product, BackendError>;

    /// Apply a partial update. `None` if the product does not exist.
    async fn update_product(
        &self,
        id: &ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, BackendError>;

    /// Delete a product. `false` if it did not exist.
    async fn delete_product(&self, id: &ProductId) -> Result<bool, BackendError>;

    /// Distinct product categories.
    async fn categories(&self) -> Result<Vec<String>, BackendError> {
        let products = self.list_products(&ProductFilter::default()).await?;
        Ok(distinct_categories(&products))
    }

    /// Products whose title, category or description contain `query`.
    async fn search_products(&self, query: &str) -> Result<Vec<Product>, BackendError> {
        let products = self.list_products(&ProductFilter::default()).await?;
        Ok(products
            .into_iter()
            .filter(|p| p.matches_query(query))
            .collect())
    }

    // -------------------------------------------------------------------------
    // Server-side cart
    // -------------------------------------------------------------------------

    async fn cart_items(&self, user: &UserId) -> Result<Vec<StoredCartItem>, BackendError>;

    /// Add `quantity` of a product, merging with an existing row.
    async fn add_to_cart(
        &self,
        user: &UserId,
        product: &ProductId,
        quantity: u32,
    ) -> Result<StoredCartItem, BackendError>;

    /// Overwrite a row's quantity (at least 1). `None` if the row does not
    /// exist for this user.
    async fn update_cart_item(
        &self,
        user: &UserId,
        item: &CartItemId,
        quantity: u32,
    ) -> Result<Option<StoredCartItem>, BackendError>;

    /// Remove a row. `false` if it did not exist for this user.
    async fn remove_cart_item(&self, user: &UserId, item: &CartItemId)
    -> Result<bool, BackendError>;

    async fn clear_cart(&self, user: &UserId) -> Result<(), BackendError>;

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// A user's orders, newest first.
    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, BackendError>;

    async fn get_order(&self, user: &UserId, id: &OrderId) -> Result<Option<Order>, BackendError>;

    /// Write the order row without items.
    async fn insert_order_header(&self, header: &OrderHeader) -> Result<Order, BackendError>;

    /// Write the line items of an existing order.
    async fn insert_order_items(
        &self,
        order: &OrderId,
        items: &[OrderItem],
    ) -> Result<(), BackendError>;

    /// Remove an order and any items already written for it.
    async fn delete_order(&self, order: &OrderId) -> Result<(), BackendError>;

    /// Create an order with its items.
    ///
    /// The header is written first, then the items. If the item write fails
    /// the header is deleted again; a failure of that delete is logged and
    /// the item error is returned. Backends that can write both at once
    /// override this.
    async fn create_order(
        &self,
        header: OrderHeader,
        items: Vec<OrderItem>,
    ) -> Result<Order, BackendError> {
        let mut order = self.insert_order_header(&header).await?;

        if let Err(e) = self.insert_order_items(&order.id, &items).await {
            tracing::error!(
                order_id = %order.id,
                error = %e,
                "Failed to insert order items, removing order header"
            );
            if let Err(cleanup) = self.delete_order(&order.id).await {
                tracing::error!(
                    order_id = %order.id,
                    error = %cleanup,
                    "Failed to remove orphaned order header"
                );
            }
            return Err(e);
        }

        order.items = items;
        Ok(order)
    }

    /// Change the status of one of the user's orders. `None` if not found.
    async fn update_order_status(
        &self,
        user: &UserId,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, BackendError>;

    // -------------------------------------------------------------------------
    // Profiles
    // -------------------------------------------------------------------------

    /// The stored profile, or one built from the token identity.
    async fn get_profile(&self, user: &AuthUser) -> Result<UserProfile, BackendError>;

    /// Create or update the stored profile.
    async fn update_profile(
        &self,
        user: &AuthUser,
        update: ProfileUpdate,
    ) -> Result<UserProfile, BackendError>;
}

/// Build the backend selected by configuration.
///
/// # Errors
///
/// Returns `BackendError` if the Postgres pool cannot be created or the
/// Firestore HTTP client fails to build.
pub async fn connect(config: &BackendConfig) -> Result<Arc<dyn DataBackend>, BackendError> {
    let backend: Arc<dyn DataBackend> = match config {
        BackendConfig::Mock => Arc::new(MockBackend::seeded()),
        BackendConfig::Supabase(supabase) => {
            let pool = crate::db::create_pool(&supabase.database_url).await?;
            tracing::info!("Database pool created");
            Arc::new(SupabaseBackend::new(pool))
        }
        BackendConfig::Firestore(firestore) => Arc::new(FirestoreBackend::new(firestore)?),
    };
    tracing::info!(backend = backend.kind().as_str(), "Data backend ready");
    Ok(backend)
}
