//! Integration tests for the HTTP surface, driven in-process.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use emporium_integration_tests::{
    TEST_TOKEN, TEST_USER, TestBackend, mock_app, request, send, state_with,
};
use serde_json::json;

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_reports_mock_mode() {
    let app = mock_app();
    let (status, body) = send(&app, request(Method::GET, "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["backend"], "mock");
    assert_eq!(body["services"]["database"], false);
    assert_eq!(body["services"]["stripe"], false);
}

#[tokio::test]
async fn test_routes_are_mounted_under_api_prefix() {
    let app = mock_app();
    let (root, _) = send(&app, request(Method::GET, "/products", None, None)).await;
    let (prefixed, body) = send(&app, request(Method::GET, "/api/products", None, None)).await;

    assert_eq!(root, StatusCode::OK);
    assert_eq!(prefixed, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 20);
}

// =============================================================================
// Products
// =============================================================================

#[tokio::test]
async fn test_unknown_product_is_404() {
    let app = mock_app();
    for uri in ["/products/does-not-exist", "/api/products/does-not-exist"] {
        let (status, body) = send(&app, request(Method::GET, uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body, json!({"error": "Product not found"}));
    }
}

#[tokio::test]
async fn test_product_filters() {
    let app = mock_app();

    let (_, body) = send(
        &app,
        request(Method::GET, "/products?category=electronics&limit=2", None, None),
    )
    .await;
    let products = body.as_array().unwrap();
    assert_eq!(products.len(), 2);
    assert!(products.iter().all(|p| p["category"] == "electronics"));

    let (status, _) = send(&app, request(Method::GET, "/products?limit=abc", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_and_categories() {
    let app = mock_app();

    let (_, body) = send(&app, request(Method::GET, "/search?q=backpack", None, None)).await;
    assert_eq!(body[0]["id"], "1");

    let (_, body) = send(&app, request(Method::GET, "/search?q=", None, None)).await;
    assert_eq!(body, json!([]));

    let (_, body) = send(&app, request(Method::GET, "/categories", None, None)).await;
    assert_eq!(body.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_create_product_without_token_never_reaches_backend() {
    let backend = Arc::new(TestBackend::seeded());
    let app = emporium_api::app(state_with(backend.clone()));
    let product = json!({"title": "Lamp", "price": 19.99});

    let (status, body) = send(
        &app,
        request(Method::POST, "/api/products", None, Some(&product)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Unauthorized"}));

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/products", Some("wrong-token"), Some(&product)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_product_crud_with_token() {
    let app = mock_app();

    let (status, created) = send(
        &app,
        request(
            Method::POST,
            "/products",
            Some(TEST_TOKEN),
            Some(&json!({"title": "Lamp", "price": 19.99, "category": "home"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &app,
        request(
            Method::PUT,
            &format!("/products/{id}"),
            Some(TEST_TOKEN),
            Some(&json!({"price": 24.5})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], 24.5);
    assert_eq!(updated["title"], "Lamp");

    let (status, body) = send(
        &app,
        request(Method::DELETE, &format!("/products/{id}"), Some(TEST_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "message": "Product deleted"}));

    let (status, _) = send(&app, request(Method::GET, &format!("/products/{id}"), None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_product_payload_is_400() {
    let app = mock_app();
    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/products",
            Some(TEST_TOKEN),
            Some(&json!({"title": "  ", "price": 5})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

// =============================================================================
// Cart and orders
// =============================================================================

#[tokio::test]
async fn test_cart_flow() {
    let app = mock_app();

    for quantity in [1, 2] {
        let (status, _) = send(
            &app,
            request(
                Method::POST,
                "/cart",
                Some(TEST_TOKEN),
                Some(&json!({"productId": "5", "quantity": quantity})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, cart) = send(&app, request(Method::GET, "/cart", Some(TEST_TOKEN), None)).await;
    let rows = cart.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["quantity"], 3);
    assert_eq!(rows[0]["product"]["id"], "5");
    let item_id = rows[0]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        request(
            Method::PUT,
            &format!("/cart/{item_id}"),
            Some(TEST_TOKEN),
            Some(&json!({"quantity": -1})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            &format!("/cart/{item_id}"),
            Some(TEST_TOKEN),
            Some(&json!({"quantity": 0})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (_, cart) = send(&app, request(Method::GET, "/cart", Some(TEST_TOKEN), None)).await;
    assert_eq!(cart, json!([]));
}

#[tokio::test]
async fn test_add_unknown_product_to_cart_is_404() {
    let app = mock_app();
    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/cart",
            Some(TEST_TOKEN),
            Some(&json!({"productId": "nope"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Product not found"}));
}

#[tokio::test]
async fn test_placing_order_clears_cart() {
    let app = mock_app();
    send(
        &app,
        request(
            Method::POST,
            "/cart",
            Some(TEST_TOKEN),
            Some(&json!({"productId": "1"})),
        ),
    )
    .await;

    let order = json!({
        "items": [
            {"productId": "1", "title": "Backpack", "price": 109.95, "quantity": 1},
            {"productId": "2", "title": "T-Shirt", "price": 22.3, "quantity": 2}
        ],
        "shippingAddress": {
            "fullName": "Ada Lovelace",
            "address": "1 Analytical Way",
            "city": "London",
            "postalCode": "N1"
        }
    });
    let (status, created) = send(
        &app,
        request(Method::POST, "/orders", Some(TEST_TOKEN), Some(&order)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["user_id"], TEST_USER);
    assert!((created["total"].as_f64().unwrap() - 154.55).abs() < 1e-9);
    assert_eq!(created["items"].as_array().unwrap().len(), 2);

    let (_, cart) = send(&app, request(Method::GET, "/cart", Some(TEST_TOKEN), None)).await;
    assert_eq!(cart, json!([]));

    let order_id = created["id"].as_str().unwrap();
    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            &format!("/orders/{order_id}/status"),
            Some(TEST_TOKEN),
            Some(&json!({"status": "shipped"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "shipped");

    let (_, orders) = send(&app, request(Method::GET, "/orders", Some(TEST_TOKEN), None)).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_order_is_rejected() {
    let app = mock_app();
    let (status, _) = send(
        &app,
        request(Method::POST, "/orders", Some(TEST_TOKEN), Some(&json!({"items": []}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_total_overflow_is_400() {
    let app = mock_app();
    let order = json!({
        "items": [{"productId": "1", "title": "x", "price": 7.0e28, "quantity": 2}]
    });
    let (status, body) = send(
        &app,
        request(Method::POST, "/orders", Some(TEST_TOKEN), Some(&order)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "order total is out of range"}));

    let (_, orders) = send(&app, request(Method::GET, "/orders", Some(TEST_TOKEN), None)).await;
    assert_eq!(orders, json!([]));
}

#[tokio::test]
async fn test_unknown_order_is_404() {
    let app = mock_app();
    let (status, body) = send(
        &app,
        request(Method::GET, "/orders/missing", Some(TEST_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Order not found"}));
}

// =============================================================================
// Payments, profile and flat endpoints
// =============================================================================

#[tokio::test]
async fn test_payment_intent_uses_cents() {
    let app = mock_app();
    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/create-payment-intent",
            Some(TEST_TOKEN),
            Some(&json!({"amount": 25.99})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paymentIntentId"], format!("pi_mock_{TEST_USER}_2599"));

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/create-payment-intent",
            Some(TEST_TOKEN),
            Some(&json!({"amount": 0})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/create-payment-intent",
            Some(TEST_TOKEN),
            Some(&json!({"amount": 1.0e27})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "amount is out of range"}));
}

#[tokio::test]
async fn test_profile_round_trip() {
    let app = mock_app();
    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            "/user/profile",
            Some(TEST_TOKEN),
            Some(&json!({"full_name": "Ada"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["full_name"], "Ada");

    let (_, body) = send(&app, request(Method::GET, "/user/profile", Some(TEST_TOKEN), None)).await;
    assert_eq!(body["full_name"], "Ada");
    assert_eq!(body["id"], TEST_USER);
}

#[tokio::test]
async fn test_flat_endpoints_wrap_in_success_envelope() {
    let app = mock_app();

    let (_, body) = send(&app, request(Method::GET, "/getProducts", None, None)).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["products"].as_array().unwrap().len(), 20);

    let (_, body) = send(
        &app,
        request(Method::GET, "/getProductsByCategory?category=JEWELERY", None, None),
    )
    .await;
    assert_eq!(body["products"].as_array().unwrap().len(), 4);

    let (_, body) = send(
        &app,
        request(Method::GET, "/getRecommendations?productId=1", None, None),
    )
    .await;
    let picks = body["recommendations"].as_array().unwrap();
    assert_eq!(picks.len(), 4);
    assert!(picks.iter().all(|p| p["id"] != "1"));

    let (status, _) = send(
        &app,
        request(Method::GET, "/getProductById?productId=nope", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_flat_duplicate_product() {
    let app = mock_app();
    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/duplicateProduct",
            Some(TEST_TOKEN),
            Some(&json!({"productId": 1, "newPrice": 5})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let copy_id = body["productId"].as_str().unwrap();
    let (_, copy) = send(&app, request(Method::GET, &format!("/products/{copy_id}"), None, None)).await;
    assert_eq!(copy["price"], 5.0);
    assert!(copy["title"].as_str().unwrap().starts_with("Copy of "));
    assert_eq!(copy["duplicated_from"], "1");
}

#[tokio::test]
async fn test_flat_cart_replace_and_clear() {
    let app = mock_app();
    let lines = json!({"items": [
        {"productId": "1", "quantity": 1},
        {"id": 2, "title": "Shirt", "price": 22.3, "quantity": 2}
    ]});

    let (status, _) = send(&app, request(Method::POST, "/updateCart", None, Some(&lines))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        request(Method::POST, "/updateCart", Some(TEST_TOKEN), Some(&lines)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Cart updated successfully");
    assert!((body["total"].as_f64().unwrap() - 154.55).abs() < 1e-9);

    let (_, body) = send(&app, request(Method::GET, "/getCart", Some(TEST_TOKEN), None)).await;
    assert_eq!(body["cart"]["items"].as_array().unwrap().len(), 2);
    assert!((body["cart"]["total"].as_f64().unwrap() - 154.55).abs() < 1e-9);

    // Lines replace the cart rather than merging into it.
    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/updateCart",
            Some(TEST_TOKEN),
            Some(&json!({"items": [{"productId": "1", "quantity": 3}]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, rows) = send(&app, request(Method::GET, "/cart", Some(TEST_TOKEN), None)).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["quantity"], 3);

    // An unknown product rejects the whole update.
    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/updateCart",
            Some(TEST_TOKEN),
            Some(&json!({"items": [{"productId": "2"}, {"productId": "missing"}]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, rows) = send(&app, request(Method::GET, "/cart", Some(TEST_TOKEN), None)).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["product_id"], "1");

    let (status, _) = send(
        &app,
        request(Method::POST, "/updateCart", Some(TEST_TOKEN), Some(&json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, request(Method::POST, "/clearCart", Some(TEST_TOKEN), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Cart cleared successfully");

    let (_, body) = send(&app, request(Method::GET, "/getCart", Some(TEST_TOKEN), None)).await;
    assert_eq!(body["cart"]["items"], json!([]));
    assert_eq!(body["cart"]["total"].as_f64(), Some(0.0));
}

#[tokio::test]
async fn test_flat_process_payment_records_paid_order() {
    let app = mock_app();
    let items = json!([{"productId": "3", "title": "Jacket", "price": 55.99, "quantity": 1}]);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/processPayment",
            Some(TEST_TOKEN),
            Some(&json!({"amount": 5599, "items": items})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing required payment information"}));

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/processPayment",
            Some(TEST_TOKEN),
            Some(&json!({"token": {"id": "tok_visa"}, "amount": 5599, "items": []})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/processPayment",
            Some(TEST_TOKEN),
            Some(&json!({
                "token": {"id": "tok_visa", "email": "ada@example.com"},
                "amount": 5599,
                "items": items,
                "orderId": "checkout-1"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["paymentId"], format!("ch_mock_{TEST_USER}_5599"));
    assert_eq!(body["message"], "Payment processed successfully");

    let (_, orders) = send(&app, request(Method::GET, "/orders", Some(TEST_TOKEN), None)).await;
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], body["orderId"]);
    assert_eq!(orders[0]["status"], "processing");
    assert_eq!(orders[0]["payment_intent_id"], format!("ch_mock_{TEST_USER}_5599"));
}
