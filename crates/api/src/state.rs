//! Application state shared across handlers.

use std::sync::Arc;

use thiserror::Error;

use crate::auth::{self, AuthError, Authenticator};
use crate::backend::{self, BackendError, DataBackend};
use crate::config::ApiConfig;
use crate::payments::{self, PaymentError, PaymentGateway};

/// Error building application state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("data backend: {0}")]
    Backend(#[from] BackendError),
    #[error("auth provider: {0}")]
    Auth(#[from] AuthError),
    #[error("payment gateway: {0}")]
    Payment(#[from] PaymentError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The backend, authenticator and payment
/// gateway are chosen once at startup and never swapped.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    backend: Arc<dyn DataBackend>,
    authenticator: Arc<dyn Authenticator>,
    payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    /// Assemble state from already-built parts.
    #[must_use]
    pub fn new(
        config: ApiConfig,
        backend: Arc<dyn DataBackend>,
        authenticator: Arc<dyn Authenticator>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                authenticator,
                payments,
            }),
        }
    }

    /// Build every collaborator from configuration.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if the database pool or an HTTP client cannot
    /// be created.
    pub async fn from_config(config: ApiConfig) -> Result<Self, StateError> {
        let backend = backend::connect(&config.backend).await?;
        let authenticator = auth::from_config(&config.auth)?;
        let payments = payments::from_config(config.stripe.as_ref())?;
        Ok(Self::new(config, backend, authenticator, payments))
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get the data backend.
    #[must_use]
    pub fn backend(&self) -> &dyn DataBackend {
        self.inner.backend.as_ref()
    }

    /// Get the bearer token verifier.
    #[must_use]
    pub fn authenticator(&self) -> &dyn Authenticator {
        self.inner.authenticator.as_ref()
    }

    /// Get the payment gateway.
    #[must_use]
    pub fn payments(&self) -> &dyn PaymentGateway {
        self.inner.payments.as_ref()
    }
}
