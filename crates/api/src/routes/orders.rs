//! Order placement and history.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use emporium_core::{NewOrder, Order, OrderId, OrderStatus};
use serde::Deserialize;
use tracing::instrument;

use crate::auth::RequireUser;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

/// Body of `PUT /orders/{orderId}/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// `GET /orders` - newest first.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.backend().orders_for_user(&user.id).await?))
}

/// `GET /orders/{orderId}`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    state
        .backend()
        .get_order(&user.id, &OrderId::new(order_id))
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Order"))
}

/// `POST /orders`
///
/// Writes the order and its items, then clears the user's server cart. A
/// failure to clear the cart is logged and does not fail the request.
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>)> {
    let Json(new_order) = payload?;
    new_order.validate()?;

    let backend = state.backend();
    let header = new_order.header(user.id.clone())?;
    let order = backend.create_order(header, new_order.items).await?;

    add_breadcrumb("orders", "Order created", Some(&[("order_id", order.id.as_str())]));
    tracing::info!(order_id = %order.id, total = %order.total, "Order created");

    if let Err(e) = backend.clear_cart(&user.id).await {
        tracing::error!(error = %e, "Failed to clear cart after order");
    }

    Ok((StatusCode::CREATED, Json(order)))
}

/// `PUT /orders/{orderId}/status`
#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(order_id): Path<String>,
    payload: std::result::Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Order>> {
    let Json(request) = payload?;
    state
        .backend()
        .update_order_status(&user.id, &OrderId::new(order_id), request.status)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Order"))
}
