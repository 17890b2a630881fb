//! Supabase GoTrue token verification.

use async_trait::async_trait;
use emporium_core::AuthUser;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::{AuthError, Authenticator};

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<UserMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    full_name: Option<String>,
}

impl From<GoTrueUser> for AuthUser {
    fn from(user: GoTrueUser) -> Self {
        Self {
            id: user.id.into(),
            email: user.email.filter(|e| !e.is_empty()),
            full_name: user.user_metadata.and_then(|m| m.full_name),
        }
    }
}

/// Verifies access tokens against `GET {SUPABASE_URL}/auth/v1/user`.
pub struct SupabaseAuth {
    client: reqwest::Client,
    user_url: String,
}

impl SupabaseAuth {
    /// Create a verifier for one Supabase project.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Http` if the API key is not a valid header value
    /// or the client cannot be built.
    pub fn new(url: &str, api_key: &SecretString) -> Result<Self, AuthError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key.expose_secret()).map_err(|_| {
            AuthError::Provider {
                status: 0,
                message: "Supabase API key is not a valid header value".to_string(),
            }
        })?;
        key.set_sensitive(true);
        headers.insert("apikey", key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            user_url: format!("{}/auth/v1/user", url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Authenticator for SupabaseAuth {
    fn name(&self) -> &'static str {
        "supabase"
    }

    #[instrument(skip(self, token))]
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .client
            .get(&self.user_url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let user: GoTrueUser = response.json().await?;
        Ok(user.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn gotrue_user_maps_metadata() {
        let user: GoTrueUser = serde_json::from_value(serde_json::json!({
            "id": "8d0c-uuid",
            "email": "ada@example.com",
            "user_metadata": {"full_name": "Ada Lovelace"},
            "aud": "authenticated"
        }))
        .unwrap();
        let user = AuthUser::from(user);
        assert_eq!(user.id.as_str(), "8d0c-uuid");
        assert_eq!(user.full_name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let auth = SupabaseAuth::new(
            "https://abc.supabase.co/",
            &SecretString::from("anon-key"),
        )
        .unwrap();
        assert_eq!(auth.user_url, "https://abc.supabase.co/auth/v1/user");
    }
}
