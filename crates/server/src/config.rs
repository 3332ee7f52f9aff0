//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BASE_URL` - Public URL of this server (used to build OAuth redirect URIs)
//!
//! ## Optional
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 3000)
//! - `DASHBOARD_URL` - Where OAuth flows land after success/failure (default: `BASE_URL`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//!
//! ## Optional (per provider - enables that provider's OAuth flow)
//! - `SHOPIFY_CLIENT_ID` / `SHOPIFY_CLIENT_SECRET` - Shopify app credentials
//! - `ETSY_CLIENT_ID` - Etsy app keystring (doubles as the `x-api-key`)
//! - `UPS_CLIENT_ID` / `UPS_CLIENT_SECRET` - UPS app credentials

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
];

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

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of this server
    pub base_url: String,
    /// Dashboard URL OAuth flows redirect to
    pub dashboard_url: String,
    /// Shopify app credentials (optional - enables the Shopify OAuth flow)
    pub shopify: Option<ShopifyAppConfig>,
    /// Etsy app credentials (optional - enables the Etsy adapter and flow)
    pub etsy: Option<EtsyAppConfig>,
    /// UPS app credentials (optional - enables the UPS OAuth flow)
    pub ups: Option<UpsAppConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
}

/// Shopify app (partner) credentials.
///
/// Implements `Debug` manually to redact the client secret, which also
/// signs OAuth callbacks and compliance webhooks.
#[derive(Clone)]
pub struct ShopifyAppConfig {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for ShopifyAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyAppConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl ShopifyAppConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let client_id = get_optional_env("SHOPIFY_CLIENT_ID");
        let client_secret = get_optional_env("SHOPIFY_CLIENT_SECRET");

        match (client_id, client_secret) {
            (Some(id), Some(secret)) => {
                validate_secret_strength(&secret, "SHOPIFY_CLIENT_SECRET")?;
                Ok(Some(Self {
                    client_id: id,
                    client_secret: SecretString::from(secret),
                }))
            }
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "SHOPIFY_*".to_string(),
                "Both SHOPIFY_CLIENT_ID and SHOPIFY_CLIENT_SECRET must be set together"
                    .to_string(),
            )),
        }
    }
}

/// Etsy app keystring. Etsy's PKCE flow needs no client secret.
#[derive(Debug, Clone)]
pub struct EtsyAppConfig {
    pub client_id: String,
}

impl EtsyAppConfig {
    fn from_env() -> Option<Self> {
        get_optional_env("ETSY_CLIENT_ID").map(|client_id| Self { client_id })
    }
}

/// UPS app credentials.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct UpsAppConfig {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for UpsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpsAppConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl UpsAppConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let client_id = get_optional_env("UPS_CLIENT_ID");
        let client_secret = get_optional_env("UPS_CLIENT_SECRET");

        match (client_id, client_secret) {
            (Some(id), Some(secret)) => {
                validate_secret_strength(&secret, "UPS_CLIENT_SECRET")?;
                Ok(Some(Self {
                    client_id: id,
                    client_secret: SecretString::from(secret),
                }))
            }
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "UPS_*".to_string(),
                "Both UPS_CLIENT_ID and UPS_CLIENT_SECRET must be set together".to_string(),
            )),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("BASE_URL")?;
        let dashboard_url = get_optional_env("DASHBOARD_URL").unwrap_or_else(|| base_url.clone());

        Ok(Self {
            host,
            port,
            base_url,
            dashboard_url,
            shopify: ShopifyAppConfig::from_env()?,
            etsy: EtsyAppConfig::from_env(),
            ups: UpsAppConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Socket address to bind.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Redirect URI for a provider's OAuth callback.
    #[must_use]
    pub fn callback_url(&self, provider: &str) -> String {
        format!("{}/auth/{provider}/callback", self.base_url)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
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
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}
