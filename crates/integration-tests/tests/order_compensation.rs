//! Integration tests for order creation when the item write fails.
//!
//! Orders are written as a header followed by its line items. When the item
//! write fails the header must be removed again, and a failure of that
//! cleanup must not take the request down with it.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use emporium_api::backend::DataBackend;
use emporium_core::{NewOrder, OrderItem, ProductId, UserId};
use emporium_integration_tests::{TEST_TOKEN, TEST_USER, TestBackend, request, send, state_with};
use rust_decimal::Decimal;
use serde_json::json;

fn order_body() -> serde_json::Value {
    json!({
        "items": [{"productId": "3", "title": "Jacket", "price": 55.99, "quantity": 1}]
    })
}

fn new_order() -> NewOrder {
    NewOrder {
        items: vec![OrderItem {
            product_id: ProductId::new("3"),
            title: "Jacket".to_string(),
            price: Decimal::new(5599, 2),
            quantity: 1,
            image: None,
        }],
        shipping_address: None,
        payment_intent_id: None,
    }
}

#[tokio::test]
async fn test_failed_item_insert_removes_header() {
    let backend = TestBackend::seeded().failing_order_items();
    let user = UserId::new(TEST_USER);
    let order = new_order();

    let result = backend
        .create_order(order.header(user.clone()).unwrap(), order.items)
        .await;

    assert!(result.is_err());
    assert_eq!(backend.deletes(), 1);
    assert!(backend.orders_for_user(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_cleanup_still_returns_item_error() {
    let backend = TestBackend::seeded()
        .failing_order_items()
        .failing_delete();
    let user = UserId::new(TEST_USER);
    let order = new_order();

    let err = backend
        .create_order(order.header(user.clone()).unwrap(), order.items)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("order_items insert failed"));
    assert_eq!(backend.deletes(), 1);
}

#[tokio::test]
async fn test_order_route_reports_500_without_orphan() {
    let backend = Arc::new(TestBackend::seeded().failing_order_items());
    let app = emporium_api::app(state_with(backend.clone()));

    let (status, body) = send(
        &app,
        request(Method::POST, "/orders", Some(TEST_TOKEN), Some(&order_body())),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Internal server error"}));

    let (_, orders) = send(&app, request(Method::GET, "/orders", Some(TEST_TOKEN), None)).await;
    assert_eq!(orders, json!([]));
}

#[tokio::test]
async fn test_order_route_survives_failed_cleanup() {
    let backend = Arc::new(
        TestBackend::seeded()
            .failing_order_items()
            .failing_delete(),
    );
    let app = emporium_api::app(state_with(backend.clone()));

    let (status, _) = send(
        &app,
        request(Method::POST, "/orders", Some(TEST_TOKEN), Some(&order_body())),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(backend.deletes(), 1);

    // The server keeps answering after the failed cleanup.
    let (status, _) = send(&app, request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_successful_order_writes_items() {
    let backend = Arc::new(TestBackend::seeded());
    let app = emporium_api::app(state_with(backend.clone()));

    let (status, created) = send(
        &app,
        request(Method::POST, "/orders", Some(TEST_TOKEN), Some(&order_body())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(backend.deletes(), 0);

    let stored = backend.orders_for_user(&UserId::new(TEST_USER)).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored.first().unwrap().items.len(), 1);
    assert_eq!(created["id"], stored.first().unwrap().id.as_str());
}
