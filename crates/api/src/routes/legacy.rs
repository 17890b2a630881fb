//! Flat envelope endpoints used by the storefront client.
//!
//! Every success body carries `"success": true` plus a payload key
//! (`products`, `product`, `categories`, ...). Missing required parameters
//! are a 400. User-scoped endpoints take the user from the bearer token,
//! never from a query parameter.

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection, rejection::QueryRejection},
    routing::{get, post},
};
use chrono::Utc;
use emporium_core::product::recommendations;
use emporium_core::{
    CurrencyCode, NewOrder, NewProduct, OrderId, OrderItem, OrderStatus, ProductFilter, ProductId,
    ProductUpdate, ShippingAddress, StoredCartItem, line_total,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use super::payments::amount_in_cents;
use crate::auth::RequireUser;
use crate::error::{AppError, Result};
use crate::state::AppState;

const RECOMMENDATION_LIMIT: usize = 4;

/// Create the legacy routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/getProducts", get(get_products))
        .route("/getProductById", get(get_product_by_id))
        .route("/getProductsByCategory", get(get_products_by_category))
        .route("/getCategories", get(get_categories))
        .route("/searchProducts", get(search_products))
        .route("/getRecommendations", get(get_recommendations))
        .route("/createProduct", post(create_product))
        .route("/updateProduct", post(update_product))
        .route("/deleteProduct", post(delete_product))
        .route("/duplicateProduct", post(duplicate_product))
        .route("/getUserOrders", get(get_user_orders))
        .route("/getPaymentHistory", get(get_payment_history))
        .route("/getDeliveryStatus", get(get_delivery_status))
        .route("/getCart", get(get_cart))
        .route("/updateCart", post(update_cart))
        .route("/clearCart", post(clear_cart))
        .route("/createPaymentIntent", post(create_payment_intent))
        .route("/processPayment", post(process_payment))
}

/// `{"success": true, ...body}`
#[derive(Debug, Serialize)]
struct Envelope<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

fn envelope<T: Serialize>(body: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        body,
    })
}

fn mutation(product_id: &ProductId, message: &'static str) -> Json<Value> {
    Json(json!({ "success": true, "productId": product_id, "message": message }))
}

/// Ids arrive as strings or, from older clients, as numbers.
fn id_param(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("Missing {name} parameter")))
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyQuery {
    pub product_id: Option<String>,
    pub category: Option<String>,
    pub query: Option<String>,
    pub order_id: Option<String>,
}

type LegacyParams = std::result::Result<Query<LegacyQuery>, QueryRejection>;

async fn get_products(State(state): State<AppState>) -> Result<Json<Value>> {
    let products = state
        .backend()
        .list_products(&ProductFilter::default())
        .await?;
    Ok(Json(json!({ "success": true, "products": products })))
}

#[instrument(skip(state))]
async fn get_product_by_id(
    State(state): State<AppState>,
    params: LegacyParams,
) -> Result<Json<Value>> {
    let Query(params) = params?;
    let id = ProductId::new(required(params.product_id, "productId")?);
    let product = state
        .backend()
        .get_product(&id)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    Ok(Json(json!({ "success": true, "product": product })))
}

#[instrument(skip(state))]
async fn get_products_by_category(
    State(state): State<AppState>,
    params: LegacyParams,
) -> Result<Json<Value>> {
    let Query(params) = params?;
    let category = required(params.category, "category")?;
    let products: Vec<_> = state
        .backend()
        .list_products(&ProductFilter::default())
        .await?
        .into_iter()
        .filter(|p| p.category.eq_ignore_ascii_case(&category))
        .collect();
    Ok(Json(json!({ "success": true, "products": products })))
}

async fn get_categories(State(state): State<AppState>) -> Result<Json<Value>> {
    let categories = state.backend().categories().await?;
    Ok(Json(json!({ "success": true, "categories": categories })))
}

#[instrument(skip(state))]
async fn search_products(
    State(state): State<AppState>,
    params: LegacyParams,
) -> Result<Json<Value>> {
    let Query(params) = params?;
    let query = required(params.query, "search query")?;
    let products = state.backend().search_products(&query).await?;
    Ok(Json(json!({ "success": true, "products": products })))
}

#[instrument(skip(state))]
async fn get_recommendations(
    State(state): State<AppState>,
    params: LegacyParams,
) -> Result<Json<Value>> {
    let Query(params) = params?;
    let exclude = params.product_id.unwrap_or_default();
    let products = state
        .backend()
        .list_products(&ProductFilter::default())
        .await?;
    let picks = recommendations(
        products,
        &exclude,
        params.category.as_deref(),
        RECOMMENDATION_LIMIT,
    );
    Ok(Json(json!({ "success": true, "recommendations": picks })))
}

// =============================================================================
// Admin mutations
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub product_id: Option<Value>,
    #[serde(default)]
    pub product_data: Option<ProductUpdate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductIdRequest {
    #[serde(default)]
    pub product_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateProductRequest {
    #[serde(default)]
    pub product_id: Option<Value>,
    #[serde(default)]
    pub new_title: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub new_price: Option<Decimal>,
}

#[instrument(skip_all)]
async fn create_product(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
    payload: std::result::Result<Json<NewProduct>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(product) = payload?;
    product.validate()?;
    let product = state.backend().create_product(product).await?;
    Ok(mutation(&product.id, "Product created successfully"))
}

#[instrument(skip_all)]
async fn update_product(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
    payload: std::result::Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload?;
    let (Some(id), Some(update)) = (id_param(request.product_id.as_ref()), request.product_data)
    else {
        return Err(AppError::BadRequest(
            "Missing productId or productData".to_string(),
        ));
    };
    update.validate()?;

    let id = ProductId::new(id);
    state
        .backend()
        .update_product(&id, update)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    Ok(mutation(&id, "Product updated successfully"))
}

#[instrument(skip_all)]
async fn delete_product(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
    payload: std::result::Result<Json<ProductIdRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload?;
    let id = id_param(request.product_id.as_ref())
        .map(ProductId::new)
        .ok_or_else(|| AppError::BadRequest("Missing productId".to_string()))?;

    if !state.backend().delete_product(&id).await? {
        return Err(AppError::NotFound("Product"));
    }
    Ok(mutation(&id, "Product deleted successfully"))
}

#[instrument(skip_all)]
async fn duplicate_product(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
    payload: std::result::Result<Json<DuplicateProductRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload?;
    let id = id_param(request.product_id.as_ref())
        .map(ProductId::new)
        .ok_or_else(|| AppError::BadRequest("Missing productId".to_string()))?;

    let backend = state.backend();
    let source = backend
        .get_product(&id)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    let copy = source.duplicate(request.new_title, request.new_price);
    copy.validate()?;

    let created = backend.create_product(copy).await?;
    tracing::info!(source_id = %id, product_id = %created.id, "Product duplicated");
    Ok(mutation(&created.id, "Product duplicated successfully"))
}

// =============================================================================
// Cart
// =============================================================================

/// The user's server cart with a total over the rows whose product resolved.
#[derive(Debug, Serialize)]
struct CartView {
    items: Vec<StoredCartItem>,
    #[serde(with = "rust_decimal::serde::float")]
    total: Decimal,
}

#[derive(Debug, Serialize)]
struct CartUpdated {
    message: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    total: Decimal,
}

/// One line of `POST /updateCart`. Extra snapshot fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRequest {
    #[serde(default, alias = "id")]
    pub product_id: Option<Value>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    #[serde(default)]
    pub items: Option<Vec<CartLineRequest>>,
}

fn cart_view(items: Vec<StoredCartItem>) -> Result<CartView> {
    let total = line_total(
        items
            .iter()
            .filter_map(|item| item.product.as_ref().map(|p| (p.price, item.quantity))),
    )
    .ok_or_else(|| AppError::BadRequest("cart total is out of range".to_string()))?;
    Ok(CartView { items, total })
}

/// Validate one requested line. `None` for a zero quantity.
fn cart_line(line: &CartLineRequest) -> Result<Option<(ProductId, u32)>> {
    let id = id_param(line.product_id.as_ref())
        .map(ProductId::new)
        .ok_or_else(|| AppError::BadRequest("Missing productId in cart item".to_string()))?;
    let quantity = line.quantity.unwrap_or(1);
    if quantity == 0 {
        return Ok(None);
    }
    let quantity = u32::try_from(quantity)
        .map_err(|_| AppError::BadRequest("quantity must be a positive integer".to_string()))?;
    Ok(Some((id, quantity)))
}

#[instrument(skip_all)]
async fn get_cart(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Value>> {
    let items = state.backend().cart_items(&user.id).await?;
    Ok(Json(json!({ "success": true, "cart": cart_view(items)? })))
}

/// Replace the whole cart with the given lines.
///
/// Every line is checked before anything is written, so a bad line leaves
/// the stored cart as it was.
#[instrument(skip_all, fields(user_id = %user.id))]
async fn update_cart(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<UpdateCartRequest>, JsonRejection>,
) -> Result<Json<Envelope<CartUpdated>>> {
    let Json(request) = payload?;
    let Some(lines) = request.items else {
        return Err(AppError::BadRequest("Missing items".to_string()));
    };

    let backend = state.backend();
    let mut wanted = Vec::with_capacity(lines.len());
    for line in &lines {
        let Some((id, quantity)) = cart_line(line)? else {
            continue;
        };
        if backend.get_product(&id).await?.is_none() {
            return Err(AppError::NotFound("Product"));
        }
        wanted.push((id, quantity));
    }

    backend.clear_cart(&user.id).await?;
    for (id, quantity) in &wanted {
        backend.add_to_cart(&user.id, id, *quantity).await?;
    }

    let view = cart_view(backend.cart_items(&user.id).await?)?;
    tracing::info!(lines = wanted.len(), total = %view.total, "Cart replaced");
    Ok(envelope(CartUpdated {
        message: "Cart updated successfully",
        total: view.total,
    }))
}

#[instrument(skip_all)]
async fn clear_cart(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Value>> {
    state.backend().clear_cart(&user.id).await?;
    Ok(Json(json!({ "success": true, "message": "Cart cleared successfully" })))
}

// =============================================================================
// Orders and payments
// =============================================================================

#[instrument(skip_all)]
async fn get_user_orders(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Value>> {
    let orders = state.backend().orders_for_user(&user.id).await?;
    Ok(Json(json!({ "success": true, "orders": orders })))
}

#[instrument(skip_all)]
async fn get_payment_history(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Value>> {
    let payments: Vec<_> = state
        .backend()
        .orders_for_user(&user.id)
        .await?
        .iter()
        .map(|order| order.payment_record())
        .collect();
    Ok(Json(json!({ "success": true, "payments": payments })))
}

#[instrument(skip_all)]
async fn get_delivery_status(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    params: LegacyParams,
) -> Result<Json<Envelope<emporium_core::DeliveryStatus>>> {
    let Query(params) = params?;
    let order_id = OrderId::new(required(params.order_id, "orderId")?);
    let order = state
        .backend()
        .get_order(&user.id, &order_id)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    Ok(envelope(order.delivery_status(Utc::now())))
}

/// Body of `POST /createPaymentIntent`. `amount` is already in cents.
#[derive(Debug, Deserialize)]
pub struct LegacyIntentRequest {
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub currency: Option<String>,
}

fn currency_param(state: &AppState, code: Option<&str>) -> Result<CurrencyCode> {
    match code.filter(|c| !c.is_empty()) {
        Some(code) => code.parse().map_err(AppError::BadRequest),
        None => Ok(state.config().default_currency),
    }
}

/// Parse a cent amount given as an integer, a float or a numeric string.
fn cents_param(value: Option<&Value>) -> Option<i64> {
    let amount: Decimal = match value? {
        Value::Number(n) => n.to_string().parse().ok()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    amount_in_cents(amount / Decimal::ONE_HUNDRED).ok()
}

#[instrument(skip_all)]
async fn create_payment_intent(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<LegacyIntentRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload?;
    let Some(cents) = cents_param(request.amount.as_ref()) else {
        return Err(AppError::BadRequest(
            "Missing required payment information".to_string(),
        ));
    };
    let currency = currency_param(&state, request.currency.as_deref())?;

    let intent = state
        .payments()
        .create_intent(&user.id, cents, currency)
        .await?;
    Ok(Json(json!({
        "success": true,
        "paymentIntentId": intent.payment_intent_id,
        "clientSecret": intent.client_secret,
    })))
}

/// Tokenized card from the checkout form.
#[derive(Debug, Deserialize)]
pub struct CardToken {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Body of `POST /processPayment`. `amount` is in cents.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    #[serde(default)]
    pub token: Option<CardToken>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub items: Option<Vec<OrderItem>>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, alias = "shipping_address")]
    pub shipping_address: Option<ShippingAddress>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentProcessed {
    order_id: OrderId,
    payment_id: String,
    message: &'static str,
}

/// Charge the card, then record the paid order.
///
/// The order total is the sum of its lines; `amount` is what the card is
/// charged.
#[instrument(skip_all, fields(user_id = %user.id))]
async fn process_payment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<ProcessPaymentRequest>, JsonRejection>,
) -> Result<Json<Envelope<PaymentProcessed>>> {
    let Json(request) = payload?;
    let (Some(token), Some(cents), Some(items)) = (
        request.token.filter(|t| !t.id.trim().is_empty()),
        cents_param(request.amount.as_ref()),
        request.items,
    ) else {
        return Err(AppError::BadRequest(
            "Missing required payment information".to_string(),
        ));
    };
    let currency = currency_param(&state, request.currency.as_deref())?;

    let new_order = NewOrder {
        items,
        shipping_address: request.shipping_address,
        payment_intent_id: None,
    };
    new_order.validate()?;
    let mut header = new_order.header(user.id.clone())?;

    let description = format!(
        "Emporium order - {}",
        request.order_id.as_deref().unwrap_or("New Order")
    );
    let charge = state
        .payments()
        .charge(&user.id, cents, currency, &token.id, &description)
        .await?;
    tracing::debug!(has_email = token.email.is_some(), "Card charged");

    header.payment_intent_id = Some(charge.id.clone());
    header.status = OrderStatus::Processing;
    let order = state
        .backend()
        .create_order(header, new_order.items)
        .await
        .inspect_err(|e| {
            tracing::error!(charge_id = %charge.id, error = %e, "Charged card but failed to record order");
        })?;

    tracing::info!(order_id = %order.id, charge_id = %charge.id, "Payment processed");
    Ok(envelope(PaymentProcessed {
        order_id: order.id,
        payment_id: charge.id,
        message: "Payment processed successfully",
    }))
}
