//! API configuration loaded from environment variables.
//!
//! Nothing here is required: a process started with an empty environment
//! serves the static mock catalog, accepts no bearer tokens and fakes
//! payment intents. Each credential that is present switches one concern
//! over to the real service.
//!
//! # Environment Variables
//!
//! ## Server
//! - `API_HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 5001)
//! - `APP_ENV` - Environment name reported by `/health` (default: development)
//! - `FRONTEND_URL` - Extra origin added to the CORS allow-list
//!
//! ## Data backend
//! - `DATA_BACKEND` - Force `mock`, `supabase` or `firestore`
//! - `SUPABASE_DATABASE_URL` / `DATABASE_URL` - Postgres connection string
//! - `FIREBASE_SERVICE_ACCOUNT_KEY` - Service account JSON (inline)
//! - `GOOGLE_APPLICATION_CREDENTIALS` - Path to a service account JSON file
//! - `FIREBASE_PROJECT_ID` - Project id (required with the emulator)
//! - `FIRESTORE_EMULATOR_HOST` - `host:port` of a local Firestore emulator
//!
//! ## Auth
//! - `SUPABASE_URL` - Supabase project URL
//! - `SUPABASE_ANON_KEY` / `SUPABASE_SERVICE_ROLE_KEY` - `apikey` for Supabase auth
//! - `FIREBASE_WEB_API_KEY` - Identity Toolkit key for Firebase ID tokens
//! - `MOCK_AUTH_TOKENS` - `token:user_id` pairs, comma separated
//!
//! ## Payments
//! - `STRIPE_SECRET_KEY` - Stripe secret key (placeholders fall back to mock)
//! - `STRIPE_CURRENCY` - Default currency (default: usd)
//! - `STRIPE_API_BASE` - API origin (default: <https://api.stripe.com>)
//!
//! ## Error tracking
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`,
//!   `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use emporium_core::CurrencyCode;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Origins always allowed by CORS (local dev servers).
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:3001",
    "http://localhost:5173",
    "http://localhost:5174",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Environment name (`development`, `production`, ...)
    pub environment: String,
    /// Deployed storefront origin, added to the CORS allow-list
    pub frontend_url: Option<String>,
    /// Where products, carts, orders and profiles live
    pub backend: BackendConfig,
    /// How bearer tokens are verified
    pub auth: AuthConfig,
    /// Stripe settings; `None` means payment intents are mocked
    pub stripe: Option<StripeConfig>,
    /// Currency used when a payment request does not name one
    pub default_currency: CurrencyCode,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 - 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 - 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Selected data backend.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// In-memory store seeded with the sample catalog.
    Mock,
    /// Supabase Postgres accessed directly over the wire protocol.
    Supabase(SupabaseConfig),
    /// Firestore through its REST API.
    Firestore(FirestoreConfig),
}

impl BackendConfig {
    /// Short name used in logs and `/health`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Supabase(_) => "supabase",
            Self::Firestore(_) => "firestore",
        }
    }
}

/// Supabase Postgres connection settings.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("database_url", &"[REDACTED]")
            .finish()
    }
}

/// Firestore REST settings.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// Google Cloud project id
    pub project_id: String,
    /// How requests are authorized
    pub credentials: FirestoreCredentials,
}

impl FirestoreConfig {
    /// Base URL of the documents collection root.
    #[must_use]
    pub fn documents_url(&self) -> String {
        let origin = match &self.credentials {
            FirestoreCredentials::Emulator { host } => format!("http://{host}"),
            FirestoreCredentials::ServiceAccount(_) => {
                "https://firestore.googleapis.com".to_string()
            }
        };
        format!(
            "{origin}/v1/projects/{}/databases/(default)/documents",
            self.project_id
        )
    }
}

/// Firestore authorization mode.
#[derive(Debug, Clone)]
pub enum FirestoreCredentials {
    /// Mint OAuth2 tokens from a service account key.
    ServiceAccount(ServiceAccountKey),
    /// Talk to a local emulator without authorization.
    Emulator { host: String },
}

/// The fields of a Google service account key file that are used.
///
/// Implements `Debug` manually to redact the private key.
#[derive(Clone)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub private_key: SecretString,
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Deserialize)]
struct RawServiceAccountKey {
    project_id: String,
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Parse a service account JSON document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` naming `source` if the JSON is
    /// malformed or lacks a required field.
    pub fn from_json(json: &str, source: &str) -> Result<Self, ConfigError> {
        let raw: RawServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| ConfigError::InvalidEnvVar(source.to_string(), e.to_string()))?;
        Ok(Self {
            project_id: raw.project_id,
            client_email: raw.client_email,
            private_key: SecretString::from(raw.private_key),
            token_uri: raw
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        })
    }
}

/// Bearer token verification provider.
#[derive(Clone)]
pub enum AuthConfig {
    /// Supabase GoTrue (`/auth/v1/user`).
    Supabase { url: String, api_key: SecretString },
    /// Firebase ID tokens via Identity Toolkit.
    Firebase { web_api_key: SecretString },
    /// Fixed `token -> user id` table.
    Static { tokens: HashMap<String, String> },
}

impl AuthConfig {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Supabase { .. } => "supabase",
            Self::Firebase { .. } => "firebase",
            Self::Static { .. } => "static",
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Supabase { url, .. } => f
                .debug_struct("Supabase")
                .field("url", url)
                .field("api_key", &"[REDACTED]")
                .finish(),
            Self::Firebase { .. } => f
                .debug_struct("Firebase")
                .field("web_api_key", &"[REDACTED]")
                .finish(),
            Self::Static { tokens } => f
                .debug_struct("Static")
                .field("tokens", &format_args!("[{} REDACTED]", tokens.len()))
                .finish(),
        }
    }
}

/// Stripe API settings.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a present variable is malformed. Absent
    /// credentials never fail; they select the mock implementations.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`ApiConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let host = env
            .get_or_default("API_HOST", "0.0.0.0")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_HOST".to_string(), e.to_string()))?;
        let port = env
            .get_or_default("PORT", "5001")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;
        let default_currency = env
            .get_or_default("STRIPE_CURRENCY", "usd")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("STRIPE_CURRENCY".to_string(), e))?;

        Ok(Self {
            host,
            port,
            environment: env.get_or_default("APP_ENV", "development"),
            frontend_url: env.get("FRONTEND_URL"),
            backend: backend_from_env(&env)?,
            auth: auth_from_env(&env)?,
            stripe: stripe_from_env(&env),
            default_currency,
            sentry_dsn: env.get("SENTRY_DSN"),
            sentry_environment: env.get("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_rate(&env, "SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: parse_rate(&env, "SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }

    /// Fully mocked configuration, used by tests and local demos.
    #[must_use]
    pub fn mock() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            environment: "test".to_string(),
            frontend_url: None,
            backend: BackendConfig::Mock,
            auth: AuthConfig::Static {
                tokens: HashMap::new(),
            },
            stripe: None,
            default_currency: CurrencyCode::Usd,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Origins allowed to make credentialed cross-origin requests.
    #[must_use]
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = DEFAULT_ALLOWED_ORIGINS
            .iter()
            .map(|o| (*o).to_string())
            .collect();
        if let Some(frontend) = &self.frontend_url {
            let frontend = frontend.trim_end_matches('/').to_string();
            if !origins.contains(&frontend) {
                origins.push(frontend);
            }
        }
        origins
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup that treats empty values as absent.
struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn get_or_default(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn get_secret(&self, key: &str) -> Option<SecretString> {
        self.get(key).map(SecretString::from)
    }
}

fn parse_rate<F>(env: &Env<'_, F>, key: &str, default: f32) -> Result<f32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    env.get(key).map_or(Ok(default), |v| {
        v.parse::<f32>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

fn backend_from_env<F>(env: &Env<'_, F>) -> Result<BackendConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let requested = env.get("DATA_BACKEND").map(|v| v.to_lowercase());
    match requested.as_deref() {
        Some("mock") => Ok(BackendConfig::Mock),
        Some("supabase") => Ok(supabase_from_env(env).unwrap_or_else(|| {
            tracing::warn!("DATA_BACKEND=supabase but no database URL is set, using mock data");
            BackendConfig::Mock
        })),
        Some("firestore") => Ok(firestore_from_env(env)?.unwrap_or_else(|| {
            tracing::warn!("DATA_BACKEND=firestore but no Firebase credentials are set, using mock data");
            BackendConfig::Mock
        })),
        Some(other) => Err(ConfigError::InvalidEnvVar(
            "DATA_BACKEND".to_string(),
            format!("expected mock, supabase or firestore, got {other}"),
        )),
        None => {
            if let Some(supabase) = supabase_from_env(env) {
                return Ok(supabase);
            }
            if let Some(firestore) = firestore_from_env(env)? {
                return Ok(firestore);
            }
            tracing::warn!("No database credentials configured, serving mock data");
            Ok(BackendConfig::Mock)
        }
    }
}

fn supabase_from_env<F>(env: &Env<'_, F>) -> Option<BackendConfig>
where
    F: Fn(&str) -> Option<String>,
{
    // Fallback to generic DATABASE_URL (set by most Postgres hosts)
    let database_url = env
        .get_secret("SUPABASE_DATABASE_URL")
        .or_else(|| env.get_secret("DATABASE_URL"))?;
    Some(BackendConfig::Supabase(SupabaseConfig { database_url }))
}

fn firestore_from_env<F>(env: &Env<'_, F>) -> Result<Option<BackendConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = env.get("FIRESTORE_EMULATOR_HOST") {
        let project_id = env
            .get("FIREBASE_PROJECT_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("FIREBASE_PROJECT_ID".to_string()))?;
        return Ok(Some(BackendConfig::Firestore(FirestoreConfig {
            project_id,
            credentials: FirestoreCredentials::Emulator { host },
        })));
    }

    let key = if let Some(json) = env.get("FIREBASE_SERVICE_ACCOUNT_KEY") {
        ServiceAccountKey::from_json(&json, "FIREBASE_SERVICE_ACCOUNT_KEY")?
    } else if let Some(path) = env.get("GOOGLE_APPLICATION_CREDENTIALS") {
        let json = std::fs::read_to_string(&path).map_err(|e| {
            ConfigError::InvalidEnvVar(
                "GOOGLE_APPLICATION_CREDENTIALS".to_string(),
                format!("{path}: {e}"),
            )
        })?;
        ServiceAccountKey::from_json(&json, "GOOGLE_APPLICATION_CREDENTIALS")?
    } else {
        return Ok(None);
    };

    let project_id = env
        .get("FIREBASE_PROJECT_ID")
        .unwrap_or_else(|| key.project_id.clone());
    Ok(Some(BackendConfig::Firestore(FirestoreConfig {
        project_id,
        credentials: FirestoreCredentials::ServiceAccount(key),
    })))
}

fn auth_from_env<F>(env: &Env<'_, F>) -> Result<AuthConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env.get("SUPABASE_URL") {
        if let Some(api_key) = env
            .get_secret("SUPABASE_ANON_KEY")
            .or_else(|| env.get_secret("SUPABASE_SERVICE_ROLE_KEY"))
        {
            return Ok(AuthConfig::Supabase {
                url: url.trim_end_matches('/').to_string(),
                api_key,
            });
        }
        tracing::warn!("SUPABASE_URL is set without an API key, Supabase auth disabled");
    }

    if let Some(web_api_key) = env.get_secret("FIREBASE_WEB_API_KEY") {
        return Ok(AuthConfig::Firebase { web_api_key });
    }

    let tokens = match env.get("MOCK_AUTH_TOKENS") {
        Some(raw) => parse_token_table(&raw)?,
        None => HashMap::new(),
    };
    if tokens.is_empty() {
        tracing::warn!("No auth provider configured, protected routes will reject every token");
    }
    Ok(AuthConfig::Static { tokens })
}

/// Parse `token:user_id` pairs separated by commas.
fn parse_token_table(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            pair.split_once(':')
                .filter(|(token, user)| !token.is_empty() && !user.is_empty())
                .map(|(token, user)| (token.to_string(), user.to_string()))
                .ok_or_else(|| {
                    ConfigError::InvalidEnvVar(
                        "MOCK_AUTH_TOKENS".to_string(),
                        format!("expected token:user_id, got {pair}"),
                    )
                })
        })
        .collect()
}

fn stripe_from_env<F>(env: &Env<'_, F>) -> Option<StripeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let key = env.get("STRIPE_SECRET_KEY")?;
    if let Err(e) = validate_secret_strength(&key, "STRIPE_SECRET_KEY") {
        tracing::warn!(error = %e, "Stripe key rejected, payment intents will be mocked");
        return None;
    }
    Some(StripeConfig {
        secret_key: SecretString::from(key),
        api_base: env.get_or_default("STRIPE_API_BASE", "https://api.stripe.com"),
    })
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}
