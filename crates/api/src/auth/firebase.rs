//! Firebase ID token verification through Identity Toolkit.
//!
//! `accounts:lookup` resolves an ID token to its account without needing
//! the Google signing keys locally. It answers 400 `INVALID_ID_TOKEN` for
//! expired or forged tokens.

use async_trait::async_trait;
use emporium_core::AuthUser;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use super::{AuthError, Authenticator};

const LOOKUP_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:lookup";

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<Account>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

impl From<Account> for AuthUser {
    fn from(account: Account) -> Self {
        Self {
            id: account.local_id.into(),
            email: account.email,
            full_name: account.display_name,
        }
    }
}

/// Verifies Firebase ID tokens.
pub struct FirebaseAuth {
    client: reqwest::Client,
    web_api_key: SecretString,
}

impl FirebaseAuth {
    /// # Errors
    ///
    /// Returns `AuthError::Http` if the HTTP client cannot be built.
    pub fn new(web_api_key: &SecretString) -> Result<Self, AuthError> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            web_api_key: web_api_key.clone(),
        })
    }
}

#[async_trait]
impl Authenticator for FirebaseAuth {
    fn name(&self) -> &'static str {
        "firebase"
    }

    #[instrument(skip(self, token))]
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let url = format!(
            "{LOOKUP_URL}?key={}",
            urlencoding::encode(self.web_api_key.expose_secret())
        );
        let response = self
            .client
            .post(url)
            .json(&json!({ "idToken": token }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: LookupResponse = response.json().await?;
        body.users
            .into_iter()
            .next()
            .map(AuthUser::from)
            .ok_or(AuthError::InvalidToken)
    }
}
