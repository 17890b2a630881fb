//! Category listing and free-text search.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use emporium_core::Product;
use serde::Deserialize;
use tracing::instrument;

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
}

/// `GET /categories`
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(state.backend().categories().await?))
}

/// `GET /search?q=` - an empty query returns no results.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    query: std::result::Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<Product>>> {
    let Query(SearchQuery { q }) = query?;
    let Some(q) = q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()) else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(state.backend().search_products(&q).await?))
}
