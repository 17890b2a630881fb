//! In-process stand-in for the Firestore emulator.
//!
//! Serves the subset of the Firestore REST v1 surface that
//! [`FirestoreBackend`] uses: paged collection listing, document get,
//! create with `documentId`, patch with and without an update mask, delete,
//! and `:runQuery` with a single equality filter. Documents live in memory
//! and every request is logged so tests can assert on the writes made.
//!
//! Listing never returns more than [`MAX_PAGE_SIZE`] documents per page,
//! whatever the client asks for, so paging is always exercised.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use emporium_api::backend::FirestoreBackend;
use emporium_api::backend::firestore::value::to_fields;
use emporium_api::config::{FirestoreConfig, FirestoreCredentials};
use emporium_core::catalog::mock_products;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;

/// Project id used by [`FirestoreEmulator::backend`].
pub const PROJECT_ID: &str = "demo-emporium";

/// Largest page the emulator hands out.
pub const MAX_PAGE_SIZE: usize = 8;

const UPDATE_TIME: &str = "2024-01-01T00:00:00Z";

type Key = (String, String);

#[derive(Default)]
struct Store {
    documents: BTreeMap<Key, Map<String, Value>>,
    requests: Vec<(Method, String)>,
}

/// A running emulator. Cloning shares the same documents.
#[derive(Clone)]
pub struct FirestoreEmulator {
    addr: SocketAddr,
    store: Arc<RwLock<Store>>,
}

impl FirestoreEmulator {
    /// Start an empty emulator on an ephemeral localhost port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    #[allow(clippy::expect_used)]
    pub async fn start() -> Self {
        let store = Arc::new(RwLock::new(Store::default()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local address");

        let app = Router::new().fallback(handle).with_state(store.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, store }
    }

    /// Start an emulator holding the sample catalog.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound or a product cannot be encoded.
    #[allow(clippy::expect_used)]
    pub async fn seeded() -> Self {
        let emulator = Self::start().await;
        {
            let mut store = emulator.store.write().await;
            for product in mock_products() {
                let fields = to_fields(&product).expect("encodable product");
                store
                    .documents
                    .insert(("products".to_string(), product.id.to_string()), fields);
            }
        }
        emulator
    }

    /// A backend pointed at this emulator.
    ///
    /// # Panics
    ///
    /// Panics if the backend cannot be built.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn backend(&self) -> FirestoreBackend {
        FirestoreBackend::new(&FirestoreConfig {
            project_id: PROJECT_ID.to_string(),
            credentials: FirestoreCredentials::Emulator {
                host: self.addr.to_string(),
            },
        })
        .expect("emulator backend")
    }

    /// Raw fields of a stored document.
    pub async fn document(&self, collection: &str, id: &str) -> Option<Map<String, Value>> {
        self.store
            .read()
            .await
            .documents
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .documents
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }

    /// Requests received so far whose method matches and whose path, relative
    /// to the documents root, starts with `prefix`.
    pub async fn requests(&self, method: &Method, prefix: &str) -> usize {
        self.store
            .read()
            .await
            .requests
            .iter()
            .filter(|(m, path)| m == method && path.starts_with(prefix))
            .count()
    }

    /// Forget the request log.
    pub async fn reset_requests(&self) {
        self.store.write().await.requests.clear();
    }
}

// =============================================================================
// Request handling
// =============================================================================

fn document_json(collection: &str, id: &str, fields: &Map<String, Value>) -> Value {
    json!({
        "name": format!("projects/{PROJECT_ID}/databases/(default)/documents/{collection}/{id}"),
        "fields": fields,
        "createTime": UPDATE_TIME,
        "updateTime": UPDATE_TIME,
    })
}

fn status(code: StatusCode, message: &str) -> Response {
    (code, axum::Json(json!({ "error": { "code": code.as_u16(), "message": message } })))
        .into_response()
}

fn param<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

async fn handle(
    State(store): State<Arc<RwLock<Store>>>,
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    let Some((_, rest)) = uri.path().split_once("/documents") else {
        return status(StatusCode::NOT_FOUND, "unknown path");
    };
    let rest = urlencoding::decode(rest).map_or_else(|_| rest.to_string(), |s| s.into_owned());
    store
        .write()
        .await
        .requests
        .push((method.clone(), rest.clone()));

    let body: Value = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(_) => return status(StatusCode::BAD_REQUEST, "invalid JSON body"),
        }
    };

    if rest == ":runQuery" && method == Method::POST {
        return run_query(&store, &body).await;
    }

    let segments: Vec<&str> = rest.trim_start_matches('/').split('/').collect();
    match (method, segments.as_slice()) {
        (Method::GET, [collection]) => list(&store, collection, &query).await,
        (Method::POST, [collection]) => create(&store, collection, &query, &body).await,
        (Method::GET, [collection, id]) => get(&store, collection, id).await,
        (Method::PATCH, [collection, id]) => patch(&store, collection, id, &query, &body).await,
        (Method::DELETE, [collection, id]) => {
            let key = ((*collection).to_string(), (*id).to_string());
            store.write().await.documents.remove(&key);
            axum::Json(json!({})).into_response()
        }
        _ => status(StatusCode::NOT_FOUND, "unsupported request"),
    }
}

async fn list(store: &RwLock<Store>, collection: &str, query: &[(String, String)]) -> Response {
    let page_size = param(query, "pageSize")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(MAX_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    let offset = param(query, "pageToken")
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(0);

    let store = store.read().await;
    let all: Vec<Value> = store
        .documents
        .iter()
        .filter(|((c, _), _)| c == collection)
        .map(|((c, id), fields)| document_json(c, id, fields))
        .collect();
    let page: Vec<Value> = all.iter().skip(offset).take(page_size).cloned().collect();

    let mut body = json!({ "documents": page });
    if offset + page_size < all.len() {
        body["nextPageToken"] = Value::String((offset + page_size).to_string());
    }
    axum::Json(body).into_response()
}

async fn get(store: &RwLock<Store>, collection: &str, id: &str) -> Response {
    let key = (collection.to_string(), id.to_string());
    match store.read().await.documents.get(&key) {
        Some(fields) => axum::Json(document_json(collection, id, fields)).into_response(),
        None => status(StatusCode::NOT_FOUND, "document not found"),
    }
}

fn body_fields(body: &Value) -> Map<String, Value> {
    body.get("fields")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

async fn create(
    store: &RwLock<Store>,
    collection: &str,
    query: &[(String, String)],
    body: &Value,
) -> Response {
    let Some(id) = param(query, "documentId") else {
        return status(StatusCode::BAD_REQUEST, "documentId is required");
    };
    let key = (collection.to_string(), id.to_string());
    let fields = body_fields(body);

    let mut store = store.write().await;
    if store.documents.contains_key(&key) {
        return status(StatusCode::CONFLICT, "document already exists");
    }
    store.documents.insert(key, fields.clone());
    axum::Json(document_json(collection, id, &fields)).into_response()
}

async fn patch(
    store: &RwLock<Store>,
    collection: &str,
    id: &str,
    query: &[(String, String)],
    body: &Value,
) -> Response {
    let key = (collection.to_string(), id.to_string());
    let fields = body_fields(body);
    let mask: Vec<&str> = query
        .iter()
        .filter(|(k, _)| k == "updateMask.fieldPaths")
        .map(|(_, v)| v.as_str())
        .collect();
    let must_exist = param(query, "currentDocument.exists") == Some("true");

    let mut store = store.write().await;
    if must_exist && !store.documents.contains_key(&key) {
        return status(StatusCode::NOT_FOUND, "document not found");
    }

    let stored = store.documents.entry(key).or_default();
    if mask.is_empty() {
        *stored = fields;
    } else {
        for path in mask {
            match fields.get(path) {
                Some(value) => {
                    stored.insert(path.to_string(), value.clone());
                }
                None => {
                    stored.remove(path);
                }
            }
        }
    }
    axum::Json(document_json(collection, id, stored)).into_response()
}

async fn run_query(store: &RwLock<Store>, body: &Value) -> Response {
    let query = &body["structuredQuery"];
    let Some(collection) = query["from"][0]["collectionId"].as_str() else {
        return status(StatusCode::BAD_REQUEST, "missing collectionId");
    };
    let filter = &query["where"]["fieldFilter"];
    let field = filter["field"]["fieldPath"].as_str();
    if filter["op"].as_str().is_some_and(|op| op != "EQUAL") {
        return status(StatusCode::BAD_REQUEST, "only EQUAL filters are supported");
    }

    let store = store.read().await;
    let mut results: Vec<Value> = store
        .documents
        .iter()
        .filter(|((c, _), _)| c == collection)
        .filter(|(_, fields)| field.is_none_or(|f| fields.get(f) == Some(&filter["value"])))
        .map(|((c, id), fields)| json!({ "document": document_json(c, id, fields), "readTime": UPDATE_TIME }))
        .collect();

    if results.is_empty() {
        results.push(json!({ "readTime": UPDATE_TIME }));
    }
    axum::Json(Value::Array(results)).into_response()
}
