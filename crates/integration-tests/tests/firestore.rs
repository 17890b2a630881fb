//! Integration tests for the Firestore backend against the in-process
//! emulator.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use emporium_api::backend::DataBackend;
use emporium_core::catalog::mock_products;
use emporium_core::{
    AuthUser, NewOrder, NewProduct, OrderId, OrderItem, OrderStatus, ProductFilter, ProductId,
    ProductUpdate, ProfileUpdate, Rating, UserId,
};
use emporium_integration_tests::firestore_emulator::FirestoreEmulator;
use emporium_integration_tests::{TEST_TOKEN, TEST_USER, request, send, state_with};
use rust_decimal::Decimal;
use serde_json::json;

fn lamp() -> NewProduct {
    NewProduct {
        title: "Desk Lamp".to_string(),
        price: Decimal::new(1999, 2),
        description: "Warm light".to_string(),
        category: "home".to_string(),
        image: String::new(),
        rating: Rating::default(),
        specifications: None,
        is_featured: false,
        duplicated_from: None,
    }
}

fn new_order() -> NewOrder {
    NewOrder {
        items: vec![
            OrderItem {
                product_id: ProductId::new("3"),
                title: "Jacket".to_string(),
                price: Decimal::new(5599, 2),
                quantity: 1,
                image: None,
            },
            OrderItem {
                product_id: ProductId::new("2"),
                title: "Shirt".to_string(),
                price: Decimal::new(2230, 2),
                quantity: 2,
                image: None,
            },
        ],
        shipping_address: None,
        payment_intent_id: Some("pi_123".to_string()),
    }
}

// =============================================================================
// Through the router
// =============================================================================

#[tokio::test]
async fn test_unknown_product_is_404() {
    let emulator = FirestoreEmulator::seeded().await;
    let app = emporium_api::app(state_with(Arc::new(emulator.backend())));

    for uri in ["/products/does-not-exist", "/api/products/does-not-exist"] {
        let (status, body) = send(&app, request(Method::GET, uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Product not found"}));
    }

    let (status, body) = send(&app, request(Method::GET, "/products/3", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "3");
}

#[tokio::test]
async fn test_order_route_round_trip() {
    let emulator = FirestoreEmulator::seeded().await;
    let app = emporium_api::app(state_with(Arc::new(emulator.backend())));

    let order = json!({
        "items": [{"productId": "3", "title": "Jacket", "price": 55.99, "quantity": 2}]
    });
    let (status, created) = send(
        &app,
        request(Method::POST, "/orders", Some(TEST_TOKEN), Some(&order)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, orders) = send(&app, request(Method::GET, "/orders", Some(TEST_TOKEN), None)).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["id"], created["id"]);
    assert_eq!(orders[0]["items"][0]["quantity"], 2);
}

// =============================================================================
// Products
// =============================================================================

#[tokio::test]
async fn test_list_follows_page_tokens() {
    let emulator = FirestoreEmulator::seeded().await;
    let backend = emulator.backend();

    let products = backend.list_products(&ProductFilter::default()).await.unwrap();
    assert_eq!(products.len(), mock_products().len());
    assert!(emulator.requests(&Method::GET, "/products").await >= 3);

    let categories = backend.categories().await.unwrap();
    assert!(categories.contains(&"electronics".to_string()));
}

#[tokio::test]
async fn test_product_create_get_update_delete() {
    let emulator = FirestoreEmulator::start().await;
    let backend = emulator.backend();

    let created = backend.create_product(lamp()).await.unwrap();
    let fetched = backend.get_product(&created.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "Desk Lamp");
    assert_eq!(fetched.price, Decimal::new(1999, 2));
    assert_eq!(fetched.category, "home");
    assert_eq!(fetched.created_at, created.created_at);

    let stored = emulator.document("products", created.id.as_str()).await.unwrap();
    assert!(!stored.contains_key("id"));
    assert_eq!(stored["title"], json!({"stringValue": "Desk Lamp"}));

    let update = ProductUpdate {
        title: Some("Desk Lamp II".to_string()),
        ..ProductUpdate::default()
    };
    let updated = backend
        .update_product(&created.id, update)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "Desk Lamp II");
    assert_eq!(updated.price, Decimal::new(1999, 2));

    let missing = ProductId::new("missing");
    assert!(
        backend
            .update_product(&missing, ProductUpdate::default())
            .await
            .unwrap()
            .is_none()
    );

    assert!(backend.delete_product(&created.id).await.unwrap());
    assert!(backend.get_product(&created.id).await.unwrap().is_none());
    assert!(!backend.delete_product(&created.id).await.unwrap());
}

// =============================================================================
// Cart
// =============================================================================

#[tokio::test]
async fn test_cart_rows_merge_and_are_scoped() {
    let emulator = FirestoreEmulator::seeded().await;
    let backend = emulator.backend();
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    let jacket = ProductId::new("3");

    backend.add_to_cart(&alice, &jacket, 1).await.unwrap();
    let row = backend.add_to_cart(&alice, &jacket, 2).await.unwrap();
    assert_eq!(row.id.as_str(), "alice_3");
    assert_eq!(row.quantity, 3);
    assert_eq!(row.product.unwrap().id, jacket);
    assert_eq!(emulator.count("carts").await, 1);

    let rows = backend.cart_items(&alice).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(backend.cart_items(&bob).await.unwrap().is_empty());
    assert!(
        backend
            .update_cart_item(&bob, &row.id, 9)
            .await
            .unwrap()
            .is_none()
    );

    let updated = backend
        .update_cart_item(&alice, &row.id, 5)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.quantity, 5);

    backend.clear_cart(&alice).await.unwrap();
    assert!(backend.cart_items(&alice).await.unwrap().is_empty());
    assert_eq!(emulator.count("carts").await, 0);
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn test_order_is_written_as_one_document() {
    let emulator = FirestoreEmulator::seeded().await;
    let backend = emulator.backend();
    let user = UserId::new(TEST_USER);
    let order = new_order();

    emulator.reset_requests().await;
    let created = backend
        .create_order(order.header(user.clone()).unwrap(), order.items.clone())
        .await
        .unwrap();

    assert_eq!(emulator.requests(&Method::POST, "/orders").await, 1);
    assert_eq!(emulator.requests(&Method::PATCH, "/orders").await, 0);
    assert_eq!(emulator.count("orders").await, 1);

    let fetched = backend.get_order(&user, &created.id).await.unwrap().unwrap();
    assert_eq!(fetched.items, order.items);
    assert_eq!(fetched.total, Decimal::new(10059, 2));
    assert_eq!(fetched.payment_intent_id.as_deref(), Some("pi_123"));

    let listed = backend.orders_for_user(&user).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(
        backend
            .orders_for_user(&UserId::new("someone-else"))
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        backend
            .get_order(&UserId::new("someone-else"), &created.id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_status_update_keeps_items() {
    let emulator = FirestoreEmulator::seeded().await;
    let backend = emulator.backend();
    let user = UserId::new(TEST_USER);
    let order = new_order();
    let created = backend
        .create_order(order.header(user.clone()).unwrap(), order.items.clone())
        .await
        .unwrap();

    let shipped = backend
        .update_order_status(&user, &created.id, OrderStatus::Shipped)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);

    let stored = backend.get_order(&user, &created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Shipped);
    assert!(stored.updated_at.is_some());
    assert_eq!(stored.items.len(), 2);

    assert!(
        backend
            .update_order_status(&user, &OrderId::new("missing"), OrderStatus::Shipped)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_header_then_items_path_appends_items() {
    let emulator = FirestoreEmulator::seeded().await;
    let backend = emulator.backend();
    let user = UserId::new(TEST_USER);
    let order = new_order();

    let header = backend
        .insert_order_header(&order.header(user.clone()).unwrap())
        .await
        .unwrap();
    backend
        .insert_order_items(&header.id, &order.items)
        .await
        .unwrap();

    let stored = backend.get_order(&user, &header.id).await.unwrap().unwrap();
    assert_eq!(stored.items, order.items);

    backend.delete_order(&header.id).await.unwrap();
    assert!(
        backend
            .insert_order_items(&header.id, &order.items)
            .await
            .is_err()
    );
}

// =============================================================================
// Profiles
// =============================================================================

#[tokio::test]
async fn test_profile_is_created_on_first_update() {
    let emulator = FirestoreEmulator::start().await;
    let backend = emulator.backend();
    let user = AuthUser {
        id: UserId::new("u1"),
        email: Some("ada@example.com".to_string()),
        full_name: None,
    };

    let profile = backend.get_profile(&user).await.unwrap();
    assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
    assert_eq!(emulator.count("users").await, 0);

    let update = ProfileUpdate {
        full_name: Some("Ada Lovelace".to_string()),
        avatar_url: None,
        phone: None,
    };
    backend.update_profile(&user, update).await.unwrap();
    assert_eq!(emulator.count("users").await, 1);

    let stored = backend.get_profile(&user).await.unwrap();
    assert_eq!(stored.email.as_deref(), Some("ada@example.com"));
    assert_eq!(stored.full_name.as_deref(), Some("Ada Lovelace"));
}
