//! HTTP route handlers.
//!
//! Everything is mounted twice: at `/` and under `/api`.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Service summary
//! GET  /health/ready               - Backend ping (503 on failure)
//!
//! # Products (writes require auth)
//! GET    /products                 - List (?category&featured&limit&search)
//! POST   /products                 - Create
//! GET    /products/{id}            - Detail
//! PUT    /products/{id}            - Partial update
//! DELETE /products/{id}            - Delete
//! GET    /categories               - Distinct categories
//! GET    /search?q=                - Title/category/description search
//!
//! # Server cart (auth)
//! GET    /cart                     - Rows for the user
//! POST   /cart                     - Add {productId, quantity}
//! DELETE /cart                     - Clear
//! PUT    /cart/{itemId}            - Set quantity (0 removes)
//! DELETE /cart/{itemId}            - Remove row
//!
//! # Orders (auth)
//! GET  /orders                     - Newest first
//! POST /orders                     - Place order, clears the cart
//! GET  /orders/{orderId}           - Detail
//! PUT  /orders/{orderId}/status    - Change status
//!
//! # Payments and profile (auth)
//! POST /create-payment-intent      - {amount, currency?}
//! GET  /user/profile               - Stored or token profile
//! PUT  /user/profile               - Upsert
//! ```
//!
//! The flat envelope endpoints (`/getProducts`, `/createPaymentIntent`, ...)
//! live in [`legacy`].

pub mod cart;
pub mod catalog;
pub mod health;
pub mod legacy;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

use axum::{
    Router,
    routing::{get, post, put},
};
use serde::Serialize;

use crate::state::AppState;

/// `{"success": true}` or `{"success": true, "message": ...}`.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl SuccessResponse {
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    #[must_use]
    pub const fn with_message(message: &'static str) -> Self {
        Self {
            success: true,
            message: Some(message),
        }
    }
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add).delete(cart::clear))
        .route("/{item_id}", put(cart::update).delete(cart::remove))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{order_id}", get(orders::show))
        .route("/{order_id}/status", put(orders::update_status))
}

/// The REST surface.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .route("/categories", get(catalog::categories))
        .route("/search", get(catalog::search))
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .route("/create-payment-intent", post(payments::create_intent))
        .route(
            "/user/profile",
            get(users::profile).put(users::update_profile),
        )
}

/// REST surface plus legacy endpoints, mounted at the root and under `/api`.
pub fn api_routes() -> Router<AppState> {
    let surface = routes().merge(legacy::routes());
    Router::new().merge(surface.clone()).nest("/api", surface)
}
