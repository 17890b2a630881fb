//! Payment intents and direct charges.
//!
//! [`StripeGateway`] calls Stripe's REST API directly with form-encoded
//! `POST /v1/payment_intents` and `POST /v1/charges`. Without a usable key
//! the [`MockGateway`] returns deterministic fake ids so checkout can be
//! exercised locally.

use std::sync::Arc;

use async_trait::async_trait;
use emporium_core::{CurrencyCode, UserId};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::StripeConfig;

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The request to Stripe failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe rejected the request.
    #[error("Stripe error: {status} - {message}")]
    Stripe { status: u16, message: String },

    /// The gateway could not be configured.
    #[error("Payment configuration error: {0}")]
    Config(String),
}

/// A created payment intent, as returned to the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub client_secret: String,
    pub payment_intent_id: String,
}

/// A completed card charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
    pub amount: i64,
}

/// Creates payment intents and charges.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Provider name for `/health` and logs.
    fn name(&self) -> &'static str;

    /// Whether a real provider is behind this gateway.
    fn is_live(&self) -> bool;

    /// Create an intent for `amount` minor units (cents).
    async fn create_intent(
        &self,
        user: &UserId,
        amount: i64,
        currency: CurrencyCode,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Charge `amount` minor units against a tokenized card `source`.
    async fn charge(
        &self,
        user: &UserId,
        amount: i64,
        currency: CurrencyCode,
        source: &str,
        description: &str,
    ) -> Result<Charge, PaymentError>;
}

// =============================================================================
// Stripe
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Stripe REST client.
pub struct StripeGateway {
    client: reqwest::Client,
    intents_url: String,
    charges_url: String,
}

impl StripeGateway {
    /// # Errors
    ///
    /// Returns `PaymentError::Config` if the key is not a valid header value
    /// and `PaymentError::Http` if the client cannot be built.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!(
            "Bearer {}",
            config.secret_key.expose_secret()
        ))
        .map_err(|_| PaymentError::Config("Stripe key is not a valid header value".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let base = config.api_base.trim_end_matches('/');
        Ok(Self {
            client,
            intents_url: format!("{base}/v1/payment_intents"),
            charges_url: format!("{base}/v1/charges"),
        })
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<T, PaymentError> {
        let response = self.client.post(url).form(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Stripe {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> &'static str {
        "stripe"
    }

    fn is_live(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn create_intent(
        &self,
        user: &UserId,
        amount: i64,
        currency: CurrencyCode,
    ) -> Result<PaymentIntent, PaymentError> {
        let amount = amount.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", currency.as_str()),
            ("metadata[user_id]", user.as_str()),
            ("automatic_payment_methods[enabled]", "true"),
        ];

        let intent: StripeIntent = self.post_form(&self.intents_url, &form).await?;
        tracing::info!(payment_intent_id = %intent.id, "Created payment intent");
        Ok(PaymentIntent {
            client_secret: intent.client_secret,
            payment_intent_id: intent.id,
        })
    }

    #[instrument(skip(self, source), fields(user_id = %user))]
    async fn charge(
        &self,
        user: &UserId,
        amount: i64,
        currency: CurrencyCode,
        source: &str,
        description: &str,
    ) -> Result<Charge, PaymentError> {
        let amount = amount.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", currency.as_str()),
            ("source", source),
            ("description", description),
            ("metadata[user_id]", user.as_str()),
        ];

        let charge: Charge = self.post_form(&self.charges_url, &form).await?;
        tracing::info!(charge_id = %charge.id, "Created charge");
        Ok(charge)
    }
}

// =============================================================================
// Mock
// =============================================================================

/// Deterministic stand-in used when Stripe is not configured.
#[derive(Debug, Default)]
pub struct MockGateway;

impl MockGateway {
    /// The intent id handed out for `user` and `amount`.
    #[must_use]
    pub fn intent_id(user: &UserId, amount: i64) -> String {
        format!("pi_mock_{user}_{amount}")
    }

    /// The charge id handed out for `user` and `amount`.
    #[must_use]
    pub fn charge_id(user: &UserId, amount: i64) -> String {
        format!("ch_mock_{user}_{amount}")
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_live(&self) -> bool {
        false
    }

    async fn create_intent(
        &self,
        user: &UserId,
        amount: i64,
        _currency: CurrencyCode,
    ) -> Result<PaymentIntent, PaymentError> {
        let payment_intent_id = Self::intent_id(user, amount);
        Ok(PaymentIntent {
            client_secret: format!("{payment_intent_id}_secret_mock"),
            payment_intent_id,
        })
    }

    async fn charge(
        &self,
        user: &UserId,
        amount: i64,
        _currency: CurrencyCode,
        _source: &str,
        _description: &str,
    ) -> Result<Charge, PaymentError> {
        Ok(Charge {
            id: Self::charge_id(user, amount),
            amount,
        })
    }
}

/// Build the gateway for the given Stripe settings.
///
/// # Errors
///
/// Returns `PaymentError` if the Stripe client cannot be built.
pub fn from_config(config: Option<&StripeConfig>) -> Result<Arc<dyn PaymentGateway>, PaymentError> {
    match config {
        Some(stripe) => {
            tracing::info!("Stripe payments enabled");
            Ok(Arc::new(StripeGateway::new(stripe)?))
        }
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set, payment intents will be mocked");
            Ok(Arc::new(MockGateway))
        }
    }
}
