//! Integration tests for the storefront client against a live server.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use emporium_api::backend::MockBackend;
use emporium_client::{ApiClient, CardToken, CartStore, MemoryStorage, PaymentRequest, Storefront};
use emporium_core::catalog::mock_products;
use emporium_core::{NewProduct, OrderItem, ProductId, Rating};
use emporium_integration_tests::{TEST_TOKEN, TEST_USER, spawn_server, state_with};
use rust_decimal::Decimal;

async fn live_storefront(token: Option<&str>) -> Storefront {
    let addr = spawn_server(state_with(Arc::new(MockBackend::seeded()))).await;
    let mut api = ApiClient::new(&format!("http://{addr}")).unwrap();
    if let Some(token) = token {
        api = api.with_token(token);
    }
    Storefront::new(api)
}

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

#[tokio::test]
async fn test_catalog_comes_from_server() {
    let store = live_storefront(None).await;

    let products = store.products().await;
    assert_eq!(products.len(), mock_products().len());

    let product = store.product("3").await.unwrap();
    assert_eq!(product.id.as_str(), "3");

    let categories = store.categories().await;
    assert!(categories.contains(&"electronics".to_string()));

    let picks = store.recommendations("3", Some("men's clothing")).await;
    assert!(picks.iter().all(|p| p.id.as_str() != "3"));
}

#[tokio::test]
async fn test_admin_mutations_require_token() {
    let anonymous = live_storefront(None).await;
    let result = anonymous.create_product(&lamp()).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Failed to create product"));

    let admin = live_storefront(Some(TEST_TOKEN)).await;
    let result = admin.create_product(&lamp()).await;
    assert!(result.success);
    let id = result.product_id.unwrap();

    let copy = admin
        .duplicate_product(&id, Some("Desk Lamp II"), Some(Decimal::new(2499, 2)))
        .await;
    assert!(copy.success);

    let fetched = admin.product(copy.product_id.unwrap().as_str()).await.unwrap();
    assert_eq!(fetched.title, "Desk Lamp II");
    assert_eq!(fetched.price, Decimal::new(2499, 2));
    assert_eq!(fetched.duplicated_from, Some(id.clone()));

    assert!(admin.delete_product(&id).await.success);
    assert!(!admin.delete_product(&ProductId::new("missing")).await.success);
}

#[tokio::test]
async fn test_orders_and_payment_intent_with_token() {
    let store = live_storefront(Some(TEST_TOKEN)).await;

    assert!(store.orders().await.is_empty());
    assert!(store.payment_history().await.is_empty());

    let intent = store.create_payment_intent(2599, "usd").await.unwrap();
    assert_eq!(intent.payment_intent_id, format!("pi_mock_{TEST_USER}_2599"));

    assert!(store.health().await.is_some());
}

fn checkout() -> PaymentRequest {
    PaymentRequest {
        token: CardToken {
            id: "tok_visa".to_string(),
            email: Some("ada@example.com".to_string()),
        },
        amount: 5599,
        items: vec![OrderItem {
            product_id: ProductId::new("3"),
            title: "Jacket".to_string(),
            price: Decimal::new(5599, 2),
            quantity: 1,
            image: None,
        }],
        order_id: None,
        currency: Some("usd".to_string()),
        shipping_address: None,
    }
}

#[tokio::test]
async fn test_process_payment_records_order() {
    let anonymous = live_storefront(None).await;
    let result = anonymous.process_payment(&checkout()).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Failed to process payment"));

    let store = live_storefront(Some(TEST_TOKEN)).await;
    let result = store.process_payment(&checkout()).await;
    assert!(result.success);
    assert_eq!(result.payment_id, Some(format!("ch_mock_{TEST_USER}_5599")));

    let orders = store.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(Some(&orders[0].id), result.order_id.as_ref());
    assert_eq!(orders[0].total, Decimal::new(5599, 2));
}

#[tokio::test]
async fn test_unreachable_server_falls_back_to_mock_catalog() {
    let store = Storefront::new(ApiClient::new("http://127.0.0.1:9").unwrap());

    assert_eq!(store.products().await, mock_products());
    assert!(store.orders().await.is_empty());
    assert!(store.create_payment_intent(100, "usd").await.is_none());
    assert!(!store.update_product(&ProductId::new("1"), &Default::default()).await.success);
}

#[tokio::test]
async fn test_cart_built_from_fetched_products() {
    let store = live_storefront(None).await;
    let products = store.products().await;
    let mut cart = CartStore::load(MemoryStorage::new()).unwrap();

    for product in products.iter().take(2) {
        cart.add(product, 2).unwrap();
    }

    assert_eq!(cart.item_count(), 4);
    let expected: Decimal = products
        .iter()
        .take(2)
        .map(|p| p.price * Decimal::from(2))
        .sum();
    assert_eq!(cart.subtotal(), expected);
}
