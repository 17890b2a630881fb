//! Firestore backend over the REST API.
//!
//! # Collections
//!
//! - `products` - Catalog, one document per product
//! - `carts` - Cart rows; the document id is `{user}_{product}` so repeated
//!   adds land on the same row
//! - `orders` - Orders with their line items embedded
//! - `users` - Profiles keyed by user id
//!
//! Product filtering happens after listing the collection; per-user reads
//! use `runQuery` with an equality filter on `user_id`. Against the emulator
//! requests are sent without authorization.

mod token;
pub mod value;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use emporium_core::{
    AuthUser, CartItemId, NewProduct, Order, OrderHeader, OrderId, OrderItem, OrderStatus,
    Product, ProductFilter, ProductId, ProductUpdate, ProfileUpdate, StoredCartItem, UserId,
    UserProfile,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use url::Url;
use uuid::Uuid;

use self::token::TokenProvider;
use self::value::{Document, encode, to_fields};
use super::{BackendError, BackendKind, DataBackend};
use crate::config::{FirestoreConfig, FirestoreCredentials};

const PRODUCTS: &str = "products";
const CARTS: &str = "carts";
const ORDERS: &str = "orders";
const USERS: &str = "users";
const PAGE_SIZE: &str = "300";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    document: Option<Document>,
}

/// Firestore REST client implementing [`DataBackend`].
pub struct FirestoreBackend {
    client: reqwest::Client,
    documents_url: String,
    tokens: Option<TokenProvider>,
}

impl FirestoreBackend {
    /// Build the HTTP client and, for service accounts, the token provider.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the HTTP client cannot be built or the
    /// service account key is unusable.
    pub fn new(config: &FirestoreConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        let tokens = match &config.credentials {
            FirestoreCredentials::ServiceAccount(key) => {
                Some(TokenProvider::new(key.clone(), client.clone())?)
            }
            FirestoreCredentials::Emulator { host } => {
                tracing::info!(host = %host, "Using Firestore emulator");
                None
            }
        };

        Ok(Self {
            client,
            documents_url: config.documents_url(),
            tokens,
        })
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{collection}", self.documents_url)
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{collection}/{}",
            self.documents_url,
            urlencoding::encode(id)
        )
    }

    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, BackendError> {
        let builder = self.client.request(method, url);
        match &self.tokens {
            Some(tokens) => Ok(builder.bearer_auth(tokens.access_token().await?)),
            None => Ok(builder),
        }
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, BackendError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = parse_url(&self.collection_url(collection))?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", PAGE_SIZE);
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self.request(Method::GET, url).await?.send().await?;
            let page: ListResponse = check(response).await?.json().await?;
            documents.extend(page.documents);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, BackendError> {
        let url = parse_url(&self.document_url(collection, id))?;
        let response = self.request(Method::GET, url).await?.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(response).await?.json().await?))
    }

    /// Create a document with a chosen id.
    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<Document, BackendError> {
        let mut url = parse_url(&self.collection_url(collection))?;
        url.query_pairs_mut().append_pair("documentId", id);

        let response = self
            .request(Method::POST, url)
            .await?
            .json(&json!({ "fields": fields }))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Write `fields` into a document.
    ///
    /// With a `mask` only the named fields are replaced and the document
    /// must already exist (`None` otherwise). Without one the whole document
    /// is written, creating it if needed.
    async fn patch_document(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        mask: Option<&[&str]>,
    ) -> Result<Option<Document>, BackendError> {
        let mut url = parse_url(&self.document_url(collection, id))?;
        if let Some(mask) = mask {
            let mut query = url.query_pairs_mut();
            for field in mask {
                query.append_pair("updateMask.fieldPaths", field);
            }
            query.append_pair("currentDocument.exists", "true");
        }

        let response = self
            .request(Method::PATCH, url)
            .await?
            .json(&json!({ "fields": fields }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(response).await?.json().await?))
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        let url = parse_url(&self.document_url(collection, id))?;
        let response = self.request(Method::DELETE, url).await?.send().await?;
        check(response).await?;
        Ok(())
    }

    /// Documents of `collection` whose `user_id` equals `user`.
    async fn user_documents(
        &self,
        collection: &str,
        user: &UserId,
    ) -> Result<Vec<Document>, BackendError> {
        let url = parse_url(&format!("{}:runQuery", self.documents_url))?;
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": "user_id" },
                        "op": "EQUAL",
                        "value": encode(&Value::String(user.as_str().to_string())),
                    }
                }
            }
        });

        let response = self
            .request(Method::POST, url)
            .await?
            .json(&body)
            .send()
            .await?;
        let results: Vec<QueryResult> = check(response).await?.json().await?;
        Ok(results.into_iter().filter_map(|r| r.document).collect())
    }

    // =========================================================================
    // Record helpers
    // =========================================================================

    async fn load_product(&self, id: &ProductId) -> Result<Option<Product>, BackendError> {
        self.get_document(PRODUCTS, id.as_str())
            .await?
            .map(|doc| doc.decode())
            .transpose()
    }

    async fn load_cart_row(
        &self,
        user: &UserId,
        item: &CartItemId,
    ) -> Result<Option<StoredCartItem>, BackendError> {
        let Some(doc) = self.get_document(CARTS, item.as_str()).await? else {
            return Ok(None);
        };
        let row: StoredCartItem = doc.decode()?;
        Ok((row.user_id == *user).then_some(row))
    }

    async fn save_cart_row(&self, row: &StoredCartItem) -> Result<(), BackendError> {
        self.patch_document(CARTS, row.id.as_str(), cart_fields(row)?, None)
            .await?;
        Ok(())
    }

    async fn with_product(&self, mut row: StoredCartItem) -> Result<StoredCartItem, BackendError> {
        row.product = self.load_product(&row.product_id).await?;
        Ok(row)
    }

    async fn load_order(&self, id: &OrderId) -> Result<Option<Order>, BackendError> {
        self.get_document(ORDERS, id.as_str())
            .await?
            .map(|doc| doc.decode())
            .transpose()
    }
}

fn parse_url(raw: &str) -> Result<Url, BackendError> {
    Url::parse(raw).map_err(|e| BackendError::Unavailable(format!("bad Firestore URL: {e}")))
}

async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(BackendError::Firestore {
        status: status.as_u16(),
        message,
    })
}

/// Stored cart fields, without the joined product.
fn cart_fields(row: &StoredCartItem) -> Result<Map<String, Value>, BackendError> {
    let stored = StoredCartItem {
        product: None,
        ..row.clone()
    };
    to_fields(&stored)
}

fn cart_row_id(user: &UserId, product: &ProductId) -> CartItemId {
    CartItemId::new(format!("{user}_{product}"))
}

fn decode_all<T: serde::de::DeserializeOwned>(documents: &[Document], kind: &str) -> Vec<T> {
    documents
        .iter()
        .filter_map(|doc| match doc.decode() {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(document = %doc.name, error = %e, "Skipping undecodable {kind}");
                None
            }
        })
        .collect()
}

#[async_trait]
impl DataBackend for FirestoreBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Firestore
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let mut url = parse_url(&self.collection_url(PRODUCTS))?;
        url.query_pairs_mut().append_pair("pageSize", "1");
        let response = self.request(Method::GET, url).await?.send().await?;
        check(response).await?;
        Ok(())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, BackendError> {
        let documents = self.list_documents(PRODUCTS).await?;
        let products: Vec<Product> = decode_all(&documents, "product");
        Ok(filter.apply(products))
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, BackendError> {
        self.load_product(id).await
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, BackendError> {
        let product = product.into_product(ProductId::new(Uuid::new_v4().to_string()), Utc::now());
        self.create_document(PRODUCTS, product.id.as_str(), to_fields(&product)?)
            .await?;
        Ok(product)
    }

    async fn update_product(
        &self,
        id: &ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, BackendError> {
        let Some(mut product) = self.load_product(id).await? else {
            return Ok(None);
        };
        update.apply_to(&mut product, Utc::now());
        self.patch_document(PRODUCTS, id.as_str(), to_fields(&product)?, None)
            .await?;
        Ok(Some(product))
    }

    async fn delete_product(&self, id: &ProductId) -> Result<bool, BackendError> {
        if self.get_document(PRODUCTS, id.as_str()).await?.is_none() {
            return Ok(false);
        }
        self.delete_document(PRODUCTS, id.as_str()).await?;
        Ok(true)
    }

    async fn cart_items(&self, user: &UserId) -> Result<Vec<StoredCartItem>, BackendError> {
        let documents = self.user_documents(CARTS, user).await?;
        let rows: Vec<StoredCartItem> = decode_all(&documents, "cart row");

        let mut joined = Vec::with_capacity(rows.len());
        for row in rows {
            joined.push(self.with_product(row).await?);
        }
        Ok(joined)
    }

    async fn add_to_cart(
        &self,
        user: &UserId,
        product: &ProductId,
        quantity: u32,
    ) -> Result<StoredCartItem, BackendError> {
        let id = cart_row_id(user, product);
        let row = match self.load_cart_row(user, &id).await? {
            Some(mut row) => {
                row.quantity = row.quantity.saturating_add(quantity);
                row
            }
            None => StoredCartItem {
                id,
                user_id: user.clone(),
                product_id: product.clone(),
                quantity,
                created_at: Some(Utc::now()),
                product: None,
            },
        };
        self.save_cart_row(&row).await?;
        self.with_product(row).await
    }

    async fn update_cart_item(
        &self,
        user: &UserId,
        item: &CartItemId,
        quantity: u32,
    ) -> Result<Option<StoredCartItem>, BackendError> {
        let Some(mut row) = self.load_cart_row(user, item).await? else {
            return Ok(None);
        };
        row.quantity = quantity;
        self.save_cart_row(&row).await?;
        Ok(Some(self.with_product(row).await?))
    }

    async fn remove_cart_item(
        &self,
        user: &UserId,
        item: &CartItemId,
    ) -> Result<bool, BackendError> {
        if self.load_cart_row(user, item).await?.is_none() {
            return Ok(false);
        }
        self.delete_document(CARTS, item.as_str()).await?;
        Ok(true)
    }

    async fn clear_cart(&self, user: &UserId) -> Result<(), BackendError> {
        for doc in self.user_documents(CARTS, user).await? {
            self.delete_document(CARTS, doc.id()).await?;
        }
        Ok(())
    }

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>, BackendError> {
        let documents = self.user_documents(ORDERS, user).await?;
        let mut orders: Vec<Order> = decode_all(&documents, "order");
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn get_order(&self, user: &UserId, id: &OrderId) -> Result<Option<Order>, BackendError> {
        Ok(self
            .load_order(id)
            .await?
            .filter(|order| order.user_id == *user))
    }

    async fn insert_order_header(&self, header: &OrderHeader) -> Result<Order, BackendError> {
        let order = header
            .clone()
            .into_order(OrderId::new(Uuid::new_v4().to_string()), Utc::now());
        self.create_document(ORDERS, order.id.as_str(), to_fields(&order)?)
            .await?;
        Ok(order)
    }

    async fn insert_order_items(
        &self,
        order: &OrderId,
        items: &[OrderItem],
    ) -> Result<(), BackendError> {
        let Some(mut stored) = self.load_order(order).await? else {
            return Err(BackendError::Unavailable(format!(
                "order {order} does not exist"
            )));
        };
        stored.items.extend_from_slice(items);

        let mut fields = Map::new();
        let items = serde_json::to_value(&stored.items)
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        fields.insert("items".to_string(), encode(&items));
        self.patch_document(ORDERS, order.as_str(), fields, Some(&["items"]))
            .await?;
        Ok(())
    }

    async fn delete_order(&self, order: &OrderId) -> Result<(), BackendError> {
        self.delete_document(ORDERS, order.as_str()).await
    }

    async fn create_order(
        &self,
        header: OrderHeader,
        items: Vec<OrderItem>,
    ) -> Result<Order, BackendError> {
        let mut order = header.into_order(OrderId::new(Uuid::new_v4().to_string()), Utc::now());
        order.items = items;
        self.create_document(ORDERS, order.id.as_str(), to_fields(&order)?)
            .await?;
        Ok(order)
    }

    async fn update_order_status(
        &self,
        user: &UserId,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, BackendError> {
        let Some(mut order) = self.get_order(user, id).await? else {
            return Ok(None);
        };
        order.status = status;
        order.updated_at = Some(Utc::now());

        let mut fields = Map::new();
        fields.insert("status".to_string(), encode(&json!(order.status.as_str())));
        fields.insert("updated_at".to_string(), encode(&json!(order.updated_at)));
        let updated = self
            .patch_document(ORDERS, id.as_str(), fields, Some(&["status", "updated_at"]))
            .await?;
        Ok(updated.map(|_| order))
    }

    async fn get_profile(&self, user: &AuthUser) -> Result<UserProfile, BackendError> {
        match self.get_document(USERS, user.id.as_str()).await? {
            Some(doc) => doc.decode(),
            None => Ok(UserProfile::from(user)),
        }
    }

    async fn update_profile(
        &self,
        user: &AuthUser,
        update: ProfileUpdate,
    ) -> Result<UserProfile, BackendError> {
        let current = self.get_profile(user).await?;
        let profile = update.merge_into(current, Utc::now());
        self.patch_document(USERS, user.id.as_str(), to_fields(&profile)?, None)
            .await?;
        Ok(profile)
    }
}
