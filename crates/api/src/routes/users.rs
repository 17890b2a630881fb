//! `GET/PUT /user/profile`

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use emporium_core::{ProfileUpdate, UserProfile};
use tracing::instrument;

use crate::auth::RequireUser;
use crate::error::Result;
use crate::state::AppState;

/// Stored profile, or one built from the token when none is stored.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<UserProfile>> {
    Ok(Json(state.backend().get_profile(&user).await?))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<UserProfile>> {
    let Json(update) = payload?;
    Ok(Json(state.backend().update_profile(&user, update).await?))
}
