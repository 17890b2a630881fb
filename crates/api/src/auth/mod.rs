//! Bearer token verification.
//!
//! Protected routes take a [`RequireUser`] extractor. It reads
//! `Authorization: Bearer <token>`, asks the configured [`Authenticator`]
//! who the token belongs to and rejects the request with 401 before the
//! handler (and therefore any backend call) runs.
//!
//! Providers:
//! - [`SupabaseAuth`] - `GET {SUPABASE_URL}/auth/v1/user`
//! - [`FirebaseAuth`] - Identity Toolkit `accounts:lookup`
//! - [`StaticTokenAuth`] - fixed table from `MOCK_AUTH_TOKENS`
//!
//! Successful lookups are cached for a minute by [`CachedAuthenticator`].

pub mod firebase;
pub mod supabase;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use emporium_core::AuthUser;
use moka::future::Cache;
use ring::digest::{SHA256, digest};
use serde_json::json;
use thiserror::Error;

use crate::config::AuthConfig;
use crate::error::set_sentry_user;
use crate::state::AppState;

pub use firebase::FirebaseAuth;
pub use supabase::SupabaseAuth;

const VERIFIED_TOKEN_TTL: Duration = Duration::from_secs(60);
const VERIFIED_TOKEN_CAPACITY: u64 = 10_000;

/// Errors from token verification.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider does not recognise the token.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// HTTP request to the provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an unexpected status.
    #[error("Auth provider error: {status} - {message}")]
    Provider { status: u16, message: String },
}

/// Resolves a bearer token to the user it was issued for.
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    /// Verify `token` and return its owner.
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError>;
}

/// Fixed `token -> user id` table.
///
/// With an empty table every token is rejected, so protected routes are
/// unreachable until a real provider or explicit test tokens are configured.
#[derive(Default)]
pub struct StaticTokenAuth {
    tokens: HashMap<String, String>,
}

impl StaticTokenAuth {
    #[must_use]
    pub const fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    /// Table with a single token, handy in tests.
    #[must_use]
    pub fn single(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(HashMap::from([(token.into(), user_id.into())]))
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuth {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        self.tokens
            .get(token)
            .map(|user_id| AuthUser::new(user_id.as_str()))
            .ok_or(AuthError::InvalidToken)
    }
}

/// Caches successful verifications of another authenticator.
///
/// Cache keys are SHA-256 digests of the token, so raw tokens are not kept
/// in memory longer than the request.
pub struct CachedAuthenticator {
    inner: Arc<dyn Authenticator>,
    verified: Cache<String, AuthUser>,
}

impl CachedAuthenticator {
    #[must_use]
    pub fn new(inner: Arc<dyn Authenticator>) -> Self {
        let verified = Cache::builder()
            .max_capacity(VERIFIED_TOKEN_CAPACITY)
            .time_to_live(VERIFIED_TOKEN_TTL)
            .build();
        Self { inner, verified }
    }
}

fn token_key(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(digest(&SHA256, token.as_bytes()))
}

#[async_trait]
impl Authenticator for CachedAuthenticator {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let key = token_key(token);
        if let Some(user) = self.verified.get(&key).await {
            return Ok(user);
        }

        let user = self.inner.verify(token).await?;
        self.verified.insert(key, user.clone()).await;
        Ok(user)
    }
}

/// Build the authenticator selected by configuration.
///
/// # Errors
///
/// Returns `AuthError` if the provider's HTTP client cannot be built.
pub fn from_config(config: &AuthConfig) -> Result<Arc<dyn Authenticator>, AuthError> {
    let provider: Arc<dyn Authenticator> = match config {
        AuthConfig::Supabase { url, api_key } => Arc::new(SupabaseAuth::new(url, api_key)?),
        AuthConfig::Firebase { web_api_key } => Arc::new(FirebaseAuth::new(web_api_key)?),
        AuthConfig::Static { tokens } => {
            if tokens.is_empty() {
                tracing::warn!("No auth provider configured, protected routes will return 401");
            }
            return Ok(Arc::new(StaticTokenAuth::new(tokens.clone())));
        }
    };
    tracing::info!(provider = provider.name(), "Auth provider ready");
    Ok(Arc::new(CachedAuthenticator::new(provider)))
}

/// Extract the token from `Authorization: Bearer <token>`.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn list_cart(
///     State(state): State<AppState>,
///     RequireUser(user): RequireUser,
/// ) -> Result<Json<Vec<StoredCartItem>>> {
///     Ok(Json(state.backend().cart_items(&user.id).await?))
/// }
/// ```
pub struct RequireUser(pub AuthUser);

/// Rejection for [`RequireUser`].
#[derive(Debug)]
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response()
    }
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthRejection)?;

        match state.authenticator().verify(token).await {
            Ok(user) => {
                set_sentry_user(&user.id, user.email.as_deref());
                Ok(Self(user))
            }
            Err(AuthError::InvalidToken) => Err(AuthRejection),
            Err(e) => {
                tracing::warn!(error = %e, "Token verification failed");
                Err(AuthRejection)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer  abc "));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn static_table_lookup() {
        let auth = StaticTokenAuth::single("t1", "user-1");
        assert_eq!(auth.verify("t1").await.unwrap().id.as_str(), "user-1");
        assert!(matches!(
            auth.verify("t2").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn empty_table_rejects_everything() {
        let auth = StaticTokenAuth::default();
        assert!(auth.verify("anything").await.is_err());
    }

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Authenticator for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if token == "good" {
                Ok(AuthUser::new("u1"))
            } else {
                Err(AuthError::InvalidToken)
            }
        }
    }

    #[tokio::test]
    async fn cache_skips_provider_for_known_tokens() {
        let inner = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedAuthenticator::new(inner.clone());

        cached.verify("good").await.unwrap();
        cached.verify("good").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        assert!(cached.verify("bad").await.is_err());
        assert!(cached.verify("bad").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn token_keys_do_not_contain_the_token() {
        let key = token_key("secret-token");
        assert!(!key.contains("secret"));
        assert_eq!(key, token_key("secret-token"));
    }
}
