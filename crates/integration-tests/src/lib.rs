//! Integration tests for Emporium.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process router and client tests
//! cargo test -p emporium-integration-tests
//!
//! # Tests against a real Supabase database
//! SUPABASE_DATABASE_URL=postgres://... cargo test -p emporium-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `api_routes` - Router driven in-process with `oneshot`
//! - `order_compensation` - Header cleanup when item writes fail
//! - `client_fallback` - Storefront client against a live socket
//! - `firestore` - Firestore backend against an in-process emulator
//! - `supabase` - Real database (ignored by default)
//!
//! This crate provides the shared helpers: a router wired to the mock
//! backend with a fixed bearer token, [`TestBackend`], which wraps the
//! mock backend to count calls and inject order write failures, and
//! [`firestore_emulator::FirestoreEmulator`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod firestore_emulator;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use emporium_api::auth::StaticTokenAuth;
use emporium_api::backend::{BackendError, BackendKind, DataBackend, MockBackend};
use emporium_api::config::ApiConfig;
use emporium_api::payments::MockGateway;
use emporium_api::state::AppState;
use emporium_core::{
    AuthUser, CartItemId, NewProduct, Order, OrderHeader, OrderId, OrderItem, OrderStatus,
    Product, ProductFilter, ProductId, ProductUpdate, ProfileUpdate, StoredCartItem, UserId,
    UserProfile,
};
use serde_json::Value;
use tower::ServiceExt;

/// Bearer token accepted by [`state_with`].
pub const TEST_TOKEN: &str = "test-token";

/// User the test token resolves to.
pub const TEST_USER: &str = "user-1";

/// State with the given backend, one valid token and mocked payments.
#[must_use]
pub fn state_with(backend: Arc<dyn DataBackend>) -> AppState {
    AppState::new(
        ApiConfig::mock(),
        backend,
        Arc::new(StaticTokenAuth::single(TEST_TOKEN, TEST_USER)),
        Arc::new(MockGateway),
    )
}

/// Full application router over the seeded mock backend.
#[must_use]
pub fn mock_app() -> Router {
    emporium_api::app(state_with(Arc::new(MockBackend::seeded())))
}

/// Build a request, optionally authenticated and with a JSON body.
///
/// # Panics
///
/// Panics if the request cannot be built (invalid URI).
#[must_use]
#[allow(clippy::expect_used)]
pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<&Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid test request")
}

/// Send a request through the router and decode the JSON body.
///
/// Empty bodies decode as `Value::Null`.
///
/// # Panics
///
/// Panics if the router fails or the body is not JSON.
#[allow(clippy::expect_used)]
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    };
    (status, body)
}

/// Serve `state` on an ephemeral localhost port.
///
/// The server runs until the test runtime shuts down.
///
/// # Panics
///
/// Panics if the listener cannot be bound.
#[allow(clippy::expect_used)]
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, emporium_api::app(state)).await;
    });
    addr
}

// =============================================================================
// Test backend
// =============================================================================

/// Mock backend wrapper that records calls and can fail order writes.
///
/// `create_order` is deliberately not overridden, so orders go through the
/// trait's header-then-items path with its compensating delete.
#[derive(Default)]
pub struct TestBackend {
    inner: MockBackend,
    calls: AtomicUsize,
    deletes: AtomicUsize,
    fail_order_items: AtomicBool,
    fail_delete_order: AtomicBool,
}

impl TestBackend {
    /// Wrapper over the seeded sample catalog.
    #[must_use]
    pub fn seeded() -> Self {
        Self {
            inner: MockBackend::seeded(),
            ..Self::default()
        }
    }

    /// Make every `insert_order_items` call fail.
    #[must_use]
    pub fn failing_order_items(self) -> Self {
        self.fail_order_items.store(true, Ordering::SeqCst);
        self
    }

    /// Make every `delete_order` call fail.
    #[must_use]
    pub fn failing_delete(self) -> Self {
        self.fail_delete_order.store(true, Ordering::SeqCst);
        self
    }

    /// Number of storage calls made so far, `ping` excluded.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of `delete_order` attempts.
    #[must_use]
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DataBackend for TestBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mock
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, BackendError> {
        self.record();
        self.inner.list_products(filter).await
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, BackendError> {
        self.record();
        self.inner.get_product(id).await
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, BackendError> {
        self.record();
        self.inner.create_product(product).await
    }

    async fn update_product(
        &self,
        id: &ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, BackendError> {
        self.record();
        self.inner.update_product(id, update).await
    }

    async fn delete_product(&self, id: &ProductId) -> Result<bool, BackendError> {
        self.record();
        self.inner.delete_product(id).await
    }

    async fn cart_items(&self, user: &UserId) -> Result<Vec<StoredCartItem>, BackendError> {
        self.record();
        self.inner.cart_items(user).await
    }

    async fn add_to_cart(
        &self,
        user: &UserId,
        product: &ProductId,
        quantity: u32,
    ) -> Result<StoredCartItem, BackendError> {
        self.record();
        self.inner.add_to_cart(user, product, quantity).await
    }

    async fn update_cart_item(
        &self,
        user: &UserId,
        item: &CartItemId,
        quantity: u32,
    ) -> Result<Option<StoredCartItem>, BackendError> {
        self.record();
        self.inner.update_cart_item(user, item, quantity).await
    }

    async fn remove_cart_item(
        &self,
        user: &UserId,
        item: &CartItemId,
    ) -> Result<bool, BackendError> {
        self.record();
        self.inner.remove_cart_item(user, item).await
    }

    async fn clear_cart(&self, user: &UserId) -> Result<(), BackendError> {
        self.record();
        self.inner.clear_cart(user).await
    }

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, BackendError> {
        self.record();
        self.inner.orders_for_user(user).await
    }

    async fn get_order(&self, user: &UserId, id: &OrderId) -> Result<Option<Order>, BackendError> {
        self.record();
        self.inner.get_order(user, id).await
    }

    async fn insert_order_header(&self, header: &OrderHeader) -> Result<Order, BackendError> {
        self.record();
        self.inner.insert_order_header(header).await
    }

    async fn insert_order_items(
        &self,
        order: &OrderId,
        items: &[OrderItem],
    ) -> Result<(), BackendError> {
        self.record();
        if self.fail_order_items.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("order_items insert failed".to_string()));
        }
        self.inner.insert_order_items(order, items).await
    }

    async fn delete_order(&self, order: &OrderId) -> Result<(), BackendError> {
        self.record();
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete_order.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("orders delete failed".to_string()));
        }
        self.inner.delete_order(order).await
    }

    async fn update_order_status(
        &self,
        user: &UserId,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, BackendError> {
        self.record();
        self.inner.update_order_status(user, id, status).await
    }

    async fn get_profile(&self, user: &AuthUser) -> Result<UserProfile, BackendError> {
        self.record();
        self.inner.get_profile(user).await
    }

    async fn update_profile(
        &self,
        user: &AuthUser,
        update: ProfileUpdate,
    ) -> Result<UserProfile, BackendError> {
        self.record();
        self.inner.update_profile(user, update).await
    }
}
