//! Product catalog routes.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use emporium_core::{NewProduct, Product, ProductFilter, ProductId, ProductUpdate};
use serde::Deserialize;
use tracing::instrument;

use super::SuccessResponse;
use crate::auth::RequireUser;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

/// Raw `GET /products` query. Values arrive as strings and are checked in
/// [`ProductQuery::into_filter`].
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub featured: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

impl ProductQuery {
    /// Validate the query.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if `limit` is not a non-negative
    /// integer.
    pub fn into_filter(self) -> Result<ProductFilter> {
        let limit = match self.limit.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
                AppError::BadRequest("limit must be a non-negative integer".to_string())
            })?),
        };

        Ok(ProductFilter {
            category: self.category.filter(|c| !c.is_empty()),
            featured: matches!(self.featured.as_deref(), Some("true" | "1")),
            limit,
            search: self.search.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// `GET /products`
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    query: std::result::Result<Query<ProductQuery>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<Vec<Product>>> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    Ok(Json(state.backend().list_products(&filter).await?))
}

/// `GET /products/{id}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    state
        .backend()
        .get_product(&ProductId::new(id))
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Product"))
}

/// `POST /products`
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>)> {
    let Json(product) = payload?;
    product.validate()?;

    let product = state.backend().create_product(product).await?;
    add_breadcrumb("products", "Product created", Some(&[("product_id", product.id.as_str())]));
    tracing::info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PUT /products/{id}`
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
    payload: std::result::Result<Json<ProductUpdate>, JsonRejection>,
) -> Result<Json<Product>> {
    let Json(update) = payload?;
    update.validate()?;

    state
        .backend()
        .update_product(&ProductId::new(id), update)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Product"))
}

/// `DELETE /products/{id}`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    let id = ProductId::new(id);
    if !state.backend().delete_product(&id).await? {
        return Err(AppError::NotFound("Product"));
    }
    tracing::info!(product_id = %id, "Product deleted");
    Ok(Json(SuccessResponse::with_message("Product deleted")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn query(limit: Option<&str>, featured: Option<&str>) -> ProductQuery {
        ProductQuery {
            limit: limit.map(String::from),
            featured: featured.map(String::from),
            ..ProductQuery::default()
        }
    }

    #[test]
    fn limit_must_be_a_non_negative_integer() {
        assert_eq!(query(Some("5"), None).into_filter().unwrap().limit, Some(5));
        assert_eq!(query(Some(""), None).into_filter().unwrap().limit, None);
        assert!(query(Some("-1"), None).into_filter().is_err());
        assert!(query(Some("ten"), None).into_filter().is_err());
    }

    #[test]
    fn featured_accepts_true_or_one() {
        assert!(query(None, Some("true")).into_filter().unwrap().featured);
        assert!(query(None, Some("1")).into_filter().unwrap().featured);
        assert!(!query(None, Some("yes")).into_filter().unwrap().featured);
        assert!(!query(None, None).into_filter().unwrap().featured);
    }
}
