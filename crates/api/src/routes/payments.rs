//! `POST /create-payment-intent`

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use emporium_core::{CurrencyCode, to_minor_units};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use crate::auth::RequireUser;
use crate::error::{AppError, Result};
use crate::payments::PaymentIntent;
use crate::state::AppState;

/// Body of `POST /create-payment-intent`. `amount` is in major units.
#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

/// Convert a major-unit amount to a positive number of cents.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for zero, negative or out-of-range amounts.
pub fn amount_in_cents(amount: Decimal) -> Result<i64> {
    let cents = to_minor_units(amount)
        .ok_or_else(|| AppError::BadRequest("amount is out of range".to_string()))?;
    if cents <= 0 {
        return Err(AppError::BadRequest("amount must be positive".to_string()));
    }
    Ok(cents)
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_intent(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    payload: std::result::Result<Json<CreateIntentRequest>, JsonRejection>,
) -> Result<Json<PaymentIntent>> {
    let Json(request) = payload?;
    let cents = amount_in_cents(request.amount)?;
    let currency = request
        .currency
        .unwrap_or(state.config().default_currency);

    let intent = state
        .payments()
        .create_intent(&user.id, cents, currency)
        .await?;
    Ok(Json(intent))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn amounts_are_rounded_to_cents() {
        assert_eq!(amount_in_cents(Decimal::new(2599, 2)).ok(), Some(2599));
        assert_eq!(amount_in_cents(Decimal::new(10005, 3)).ok(), Some(1001));
        assert!(amount_in_cents(Decimal::ZERO).is_err());
        assert!(amount_in_cents(Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn huge_amounts_are_rejected() {
        let huge = Decimal::from_i128_with_scale(10_i128.pow(27), 0);
        let err = amount_in_cents(huge).unwrap_err();
        assert_eq!(err.to_string(), "amount is out of range");
        assert!(amount_in_cents(Decimal::MAX).is_err());
    }
}
