//! Server-side cart for signed-in users.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use emporium_core::{CartItemId, ProductId, StoredCartItem};
use serde::Deserialize;
use tracing::instrument;

use super::SuccessResponse;
use crate::auth::RequireUser;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Body of `POST /cart`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    #[serde(alias = "product_id")]
    pub product_id: ProductId,
    #[serde(default)]
    pub quantity: Option<i64>,
}

/// Body of `PUT /cart/{itemId}`.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub quantity: i64,
}

fn positive_quantity(quantity: i64) -> Result<u32> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| AppError::BadRequest("quantity must be a positive integer".to_string()))
}

/// `GET /cart`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<StoredCartItem>>> {
    Ok(Json(state.backend().cart_items(&user.id).await?))
}

/// `POST /cart` - merges with an existing row for the same product.
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<Json<StoredCartItem>> {
    let Json(request) = payload?;
    let quantity = positive_quantity(request.quantity.unwrap_or(1))?;

    let backend = state.backend();
    if backend.get_product(&request.product_id).await?.is_none() {
        return Err(AppError::NotFound("Product"));
    }

    let item = backend
        .add_to_cart(&user.id, &request.product_id, quantity)
        .await?;
    Ok(Json(item))
}

/// `PUT /cart/{itemId}` - a quantity of 0 removes the row.
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(item_id): Path<String>,
    payload: std::result::Result<Json<UpdateCartRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload?;
    let item_id = CartItemId::new(item_id);

    if request.quantity < 0 {
        return Err(AppError::BadRequest(
            "quantity must not be negative".to_string(),
        ));
    }

    if request.quantity == 0 {
        state.backend().remove_cart_item(&user.id, &item_id).await?;
        return Ok(Json(SuccessResponse::ok()).into_response());
    }

    let quantity = positive_quantity(request.quantity)?;
    state
        .backend()
        .update_cart_item(&user.id, &item_id, quantity)
        .await?
        .map(|item| Json(item).into_response())
        .ok_or(AppError::NotFound("Cart item"))
}

/// `DELETE /cart/{itemId}` - succeeds whether or not the row existed.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(item_id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    let removed = state
        .backend()
        .remove_cart_item(&user.id, &CartItemId::new(item_id))
        .await?;
    tracing::debug!(removed, "Cart item removal");
    Ok(Json(SuccessResponse::ok()))
}

/// `DELETE /cart`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<SuccessResponse>> {
    state.backend().clear_cart(&user.id).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities_must_be_positive_u32() {
        assert_eq!(positive_quantity(3).ok(), Some(3));
        assert!(positive_quantity(0).is_err());
        assert!(positive_quantity(-2).is_err());
        assert!(positive_quantity(i64::from(u32::MAX) + 1).is_err());
    }
}
