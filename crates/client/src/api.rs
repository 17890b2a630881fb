//! HTTP client for the Emporium API with local fallback data.
//!
//! Every call is a single attempt. When the API is unreachable, answers
//! with a non-2xx status, returns unparseable JSON or reports
//! `success: false`, the [`Storefront`] facade serves the built-in mock
//! catalog instead so the storefront keeps rendering.

use emporium_core::catalog::{mock_categories, mock_product, mock_products, mock_recommendations};
use emporium_core::{
    NewProduct, Order, OrderId, OrderItem, PaymentRecord, Product, ProductId, ProductUpdate,
    ShippingAddress,
};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;
use url::Url;

/// Environment variable holding the API base URL.
pub const BASE_URL_ENV: &str = "EMPORIUM_API_BASE_URL";

/// Base URL used when [`BASE_URL_ENV`] is not set.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Number of products returned by the recommendation fallback.
pub const RECOMMENDATION_LIMIT: usize = 4;

/// Errors constructing the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Thin HTTP wrapper. Knows the base URL and the optional bearer token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns `ClientError` if `base_url` does not parse or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        // A trailing slash makes `Url::join` append instead of replace.
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url,
            token: None,
        })
    }

    /// Build a client from `EMPORIUM_API_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the configured URL is invalid.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(&base_url)
    }

    /// Attach a bearer token to every subsequent request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Perform one request and return the parsed JSON body.
    ///
    /// Returns `None` on any transport error, non-2xx status or body that
    /// is not JSON. Failures are logged, never raised.
    #[instrument(skip(self, query, body), fields(base_url = %self.base_url))]
    pub async fn fetch_with_fallback(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Option<Value> {
        let mut url = match self.base_url.join(path.trim_start_matches('/')) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid API path");
                return None;
            }
        };
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let mut request = self.http.request(method, url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "API unreachable, using fallback");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "API request failed, using fallback");
            return None;
        }

        match response.json::<Value>().await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "API returned invalid JSON, using fallback");
                None
            }
        }
    }
}

/// Pull `key` out of a response body whose `success` flag is true.
fn success_field<T: DeserializeOwned>(body: Option<Value>, key: &str) -> Option<T> {
    let mut body = body?;
    if body.get("success").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let field = body.get_mut(key)?.take();
    match serde_json::from_value(field) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, field = key, "Unexpected API payload, using fallback");
            None
        }
    }
}

/// Outcome of an admin mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MutationResult {
    fn failed(error: &str) -> Self {
        Self {
            success: false,
            product_id: None,
            message: None,
            error: Some(error.to_string()),
        }
    }

    fn from_body(body: Option<Value>, error: &str) -> Self {
        body.and_then(|body| serde_json::from_value::<Self>(body).ok())
            .filter(|result| result.success)
            .unwrap_or_else(|| Self::failed(error))
    }
}

/// Client secret for a freshly created payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub payment_intent_id: String,
    pub client_secret: String,
}

/// Tokenized card handed to `processPayment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardToken {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Checkout payload for [`Storefront::process_payment`]. `amount` is in cents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub token: CardToken,
    pub amount: i64,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<ShippingAddress>,
}

/// Outcome of a card payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentResult {
    fn from_body(body: Option<Value>) -> Self {
        body.and_then(|body| serde_json::from_value::<Self>(body).ok())
            .filter(|result| result.success)
            .unwrap_or_else(|| Self {
                success: false,
                order_id: None,
                payment_id: None,
                message: None,
                error: Some("Failed to process payment".to_string()),
            })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DuplicateRequest<'a> {
    product_id: &'a ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_title: Option<&'a str>,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    new_price: Option<Decimal>,
}

/// Storefront-facing operations with fallback semantics.
#[derive(Debug, Clone)]
pub struct Storefront {
    api: ApiClient,
}

impl Storefront {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Option<Value> {
        self.api
            .fetch_with_fallback(Method::GET, path, query, None)
            .await
    }

    async fn post(&self, path: &str, body: &Value) -> Option<Value> {
        self.api
            .fetch_with_fallback(Method::POST, path, &[], Some(body))
            .await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub async fn products(&self) -> Vec<Product> {
        success_field(self.get("getProducts", &[]).await, "products")
            .unwrap_or_else(mock_products)
    }

    pub async fn product(&self, id: &str) -> Option<Product> {
        let body = self.get("getProductById", &[("productId", id)]).await;
        match success_field(body, "product") {
            Some(product) => Some(product),
            None => mock_product(id),
        }
    }

    pub async fn products_by_category(&self, category: &str) -> Vec<Product> {
        let body = self
            .get("getProductsByCategory", &[("category", category)])
            .await;
        success_field(body, "products").unwrap_or_else(|| {
            mock_products()
                .into_iter()
                .filter(|p| p.category.eq_ignore_ascii_case(category))
                .collect()
        })
    }

    pub async fn search(&self, query: &str) -> Vec<Product> {
        let body = self.get("searchProducts", &[("query", query)]).await;
        success_field(body, "products").unwrap_or_else(|| {
            mock_products()
                .into_iter()
                .filter(|p| p.matches_query(query))
                .collect()
        })
    }

    pub async fn categories(&self) -> Vec<String> {
        success_field(self.get("getCategories", &[]).await, "categories")
            .unwrap_or_else(mock_categories)
    }

    pub async fn recommendations(&self, product_id: &str, category: Option<&str>) -> Vec<Product> {
        let mut query = vec![("productId", product_id)];
        if let Some(category) = category {
            query.push(("category", category));
        }
        let body = self.get("getRecommendations", &query).await;
        success_field(body, "recommendations")
            .unwrap_or_else(|| mock_recommendations(product_id, category, RECOMMENDATION_LIMIT))
    }

    // =========================================================================
    // Orders and payments
    // =========================================================================

    /// Orders of the signed-in user. Empty when the API is unavailable.
    pub async fn orders(&self) -> Vec<Order> {
        success_field(self.get("getUserOrders", &[]).await, "orders").unwrap_or_default()
    }

    pub async fn payment_history(&self) -> Vec<PaymentRecord> {
        success_field(self.get("getPaymentHistory", &[]).await, "payments").unwrap_or_default()
    }

    /// Create a payment intent for `amount_cents`. `None` when the API is
    /// unavailable.
    pub async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
    ) -> Option<PaymentIntentResponse> {
        let body = self
            .post(
                "createPaymentIntent",
                &json!({ "amount": amount_cents, "currency": currency }),
            )
            .await?;
        if body.get("success").and_then(Value::as_bool) != Some(true) {
            return None;
        }
        serde_json::from_value(body).ok()
    }

    /// Charge a card and record the order. Reports `success: false` when the
    /// API is unavailable or refuses the payment.
    pub async fn process_payment(&self, request: &PaymentRequest) -> PaymentResult {
        let body = match serde_json::to_value(request) {
            Ok(body) => self.post("processPayment", &body).await,
            Err(e) => {
                tracing::warn!(error = %e, "Could not encode payment request");
                None
            }
        };
        PaymentResult::from_body(body)
    }

    /// Raw `/health` body, `None` when the API is down.
    pub async fn health(&self) -> Option<Value> {
        self.get("health", &[]).await
    }

    // =========================================================================
    // Admin mutations
    // =========================================================================

    pub async fn create_product(&self, product: &NewProduct) -> MutationResult {
        let body = match serde_json::to_value(product) {
            Ok(body) => self.post("createProduct", &body).await,
            Err(e) => {
                tracing::warn!(error = %e, "Could not encode product");
                None
            }
        };
        MutationResult::from_body(body, "Failed to create product")
    }

    pub async fn update_product(&self, id: &ProductId, update: &ProductUpdate) -> MutationResult {
        let body = self
            .post(
                "updateProduct",
                &json!({ "productId": id, "productData": update }),
            )
            .await;
        MutationResult::from_body(body, "Failed to update product")
    }

    pub async fn delete_product(&self, id: &ProductId) -> MutationResult {
        let body = self
            .post("deleteProduct", &json!({ "productId": id }))
            .await;
        MutationResult::from_body(body, "Failed to delete product")
    }

    pub async fn duplicate_product(
        &self,
        id: &ProductId,
        new_title: Option<&str>,
        new_price: Option<Decimal>,
    ) -> MutationResult {
        let request = DuplicateRequest {
            product_id: id,
            new_title,
            new_price,
        };
        let body = match serde_json::to_value(&request) {
            Ok(request) => self.post("duplicateProduct", &request).await,
            Err(e) => {
                tracing::warn!(error = %e, "Could not encode duplicate request");
                None
            }
        };
        MutationResult::from_body(body, "Failed to duplicate product")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Nothing listens on the discard port.
    fn offline() -> Storefront {
        Storefront::new(ApiClient::new("http://127.0.0.1:9").unwrap())
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = ApiClient::new("http://localhost:5000/api").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:5000/api/");
        let joined = client.base_url().join("getProducts").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:5000/api/getProducts");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn success_field_requires_success_flag() {
        let body = json!({"success": false, "products": []});
        assert!(success_field::<Vec<Product>>(Some(body), "products").is_none());

        let body = json!({"products": []});
        assert!(success_field::<Vec<Product>>(Some(body), "products").is_none());

        let body = json!({"success": true, "categories": ["a", "b"]});
        let categories: Vec<String> = success_field(Some(body), "categories").unwrap();
        assert_eq!(categories, vec!["a", "b"]);
    }

    #[test]
    fn mutation_result_falls_back_on_failure() {
        let failed = MutationResult::from_body(None, "Failed to delete product");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("Failed to delete product"));

        let ok = MutationResult::from_body(
            Some(json!({"success": true, "productId": "21", "message": "Product created successfully"})),
            "Failed to create product",
        );
        assert!(ok.success);
        assert_eq!(ok.product_id.unwrap().as_str(), "21");
    }

    #[tokio::test]
    async fn offline_catalog_uses_mock_data() {
        let store = offline();
        assert_eq!(store.products().await, mock_products());
        assert_eq!(store.categories().await, mock_categories());
        assert_eq!(store.product("1").await, mock_product("1"));
        assert!(store.product("does-not-exist").await.is_none());
    }

    #[tokio::test]
    async fn offline_filters_are_case_insensitive() {
        let store = offline();
        let jewelery = store.products_by_category("JEWELERY").await;
        assert!(!jewelery.is_empty());
        assert!(jewelery.iter().all(|p| p.category == "jewelery"));

        let hits = store.search("BACKPACK").await;
        assert!(hits.iter().any(|p| p.id.as_str() == "1"));
    }

    #[tokio::test]
    async fn offline_orders_and_payments_are_empty() {
        let store = offline();
        assert!(store.orders().await.is_empty());
        assert!(store.create_payment_intent(2599, "usd").await.is_none());
        assert!(store.health().await.is_none());
    }

    #[tokio::test]
    async fn offline_recommendations_exclude_current_product() {
        let picks = offline().recommendations("1", None).await;
        assert_eq!(picks.len(), RECOMMENDATION_LIMIT);
        assert!(picks.iter().all(|p| p.id.as_str() != "1"));
    }

    #[test]
    fn payment_result_reads_success_envelope() {
        let ok = PaymentResult::from_body(Some(json!({
            "success": true,
            "orderId": "o1",
            "paymentId": "ch_1",
            "message": "Payment processed successfully"
        })));
        assert!(ok.success);
        assert_eq!(ok.order_id.unwrap().as_str(), "o1");
        assert_eq!(ok.payment_id.as_deref(), Some("ch_1"));

        let failed = PaymentResult::from_body(Some(json!({"error": "Missing required payment information"})));
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("Failed to process payment"));
    }

    #[tokio::test]
    async fn offline_payment_reports_failure() {
        let request = PaymentRequest {
            token: CardToken {
                id: "tok_visa".to_string(),
                email: None,
            },
            amount: 2599,
            items: Vec::new(),
            order_id: None,
            currency: None,
            shipping_address: None,
        };
        let result = offline().process_payment(&request).await;
        assert!(!result.success);
        assert!(result.order_id.is_none());
    }

    #[tokio::test]
    async fn offline_mutations_report_failure() {
        let result = offline().delete_product(&ProductId::new("1")).await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }
}
