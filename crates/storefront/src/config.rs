//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `COMMERCE_BACKEND_URL` - Base URL of the commerce backend
//! - `COMMERCE_PUBLISHABLE_KEY` - Publishable API key for the store API
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `COMMERCE_REGION_ID` - Pricing region (the commerce client refuses to start without it)
//! - `COMMERCE_CURRENCY_CODE` - Display currency (default: USD)
//! - `SEARCH_HOST`, `SEARCH_API_KEY`, `SEARCH_INDEX` - Search service (index default: products)
//! - `MEDIA_SECRET`, `MEDIA_PROXY_BASE_URL`, `MEDIA_OPS_PATH` - Media proxy signing
//!   (ops path default: fit-in/800x800)
//! - `CATALOG_CACHE_TTL_MS` - Shared catalog page cache TTL (default: 60000, 0 disables)
//! - `PRODUCT_CACHE_TTL_MS` - Hydrated product cache TTL (default: 60000)
//! - `PRODUCT_CACHE_MAX` - Hydrated product cache capacity (default: 500)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//!
//! Search and media are optional features: when any of their variables is
//! missing they resolve to `None` and the feature is disabled.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_CACHE_TTL_MS: &str = "60000";
const DEFAULT_PRODUCT_CACHE_MAX: &str = "500";

/// Shortest media secret accepted.
const MIN_SECRET_LEN: usize = 16;

/// Fewest distinct characters a media secret must use.
const MIN_DISTINCT_CHARS: usize = 8;

/// Fragments of sample values copied from `.env.example` files.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "changeme",
    "placeholder",
    "example",
    "secret-here",
    "your-",
    "xxx",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Commerce backend configuration
    pub commerce: CommerceConfig,
    /// Search service configuration, `None` when search is disabled
    pub search: Option<SearchConfig>,
    /// Media proxy configuration, `None` when image signing is disabled
    pub media: Option<MediaConfig>,
    /// TTL of the process-wide catalog page cache
    pub catalog_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Commerce backend store API configuration.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// Backend base URL (e.g., `https://api.example.com`)
    pub backend_url: String,
    /// Publishable API key (safe to expose in browser)
    pub publishable_key: String,
    /// Region used to calculate prices
    pub region_id: Option<String>,
    /// ISO currency code for display
    pub currency_code: String,
    /// TTL of hydrated products
    pub product_cache_ttl: Duration,
    /// Maximum number of hydrated products kept
    pub product_cache_max: u64,
}

/// Hosted search service configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct SearchConfig {
    /// Search service base URL
    pub host: String,
    /// Search API key
    pub api_key: SecretString,
    /// Products index name
    pub index: String,
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("host", &self.host)
            .field("api_key", &"[REDACTED]")
            .field("index", &self.index)
            .finish()
    }
}

/// Media proxy signing configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct MediaConfig {
    /// HMAC signing secret shared with the proxy
    pub secret: SecretString,
    /// Proxy base URL
    pub base_url: String,
    /// Transform operations prefixed to every file path
    pub ops_path: String,
}

impl std::fmt::Debug for MediaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaConfig")
            .field("secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("ops_path", &self.ops_path)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the media secret looks like a sample value or is too weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;

        Ok(Self {
            host,
            port,
            base_url,
            commerce: CommerceConfig::from_env()?,
            search: SearchConfig::from_env(),
            media: MediaConfig::from_env()?,
            catalog_cache_ttl: get_ttl("CATALOG_CACHE_TTL_MS")?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CommerceConfig {
    /// Load only the commerce backend settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a number
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let product_cache_max = get_env_or_default("PRODUCT_CACHE_MAX", DEFAULT_PRODUCT_CACHE_MAX)
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("PRODUCT_CACHE_MAX".to_string(), e.to_string())
            })?;

        Ok(Self {
            backend_url: get_required_env("COMMERCE_BACKEND_URL")?
                .trim_end_matches('/')
                .to_string(),
            publishable_key: get_required_env("COMMERCE_PUBLISHABLE_KEY")?,
            region_id: get_optional_env("COMMERCE_REGION_ID"),
            currency_code: get_env_or_default("COMMERCE_CURRENCY_CODE", "USD"),
            product_cache_ttl: get_ttl("PRODUCT_CACHE_TTL_MS")?,
            product_cache_max: product_cache_max.max(1),
        })
    }
}

impl SearchConfig {
    /// Load the search settings, `None` unless both host and key are set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let host = get_optional_env("SEARCH_HOST")?;
        let api_key = get_optional_env("SEARCH_API_KEY")?;
        Some(Self {
            host: host.trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key),
            index: get_env_or_default("SEARCH_INDEX", "products"),
        })
    }
}

impl MediaConfig {
    /// Load the media proxy settings, `None` unless secret and base URL are set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InsecureSecret` if a configured secret looks
    /// like a placeholder.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let (Some(secret), Some(base_url)) = (
            get_optional_env("MEDIA_SECRET"),
            get_optional_env("MEDIA_PROXY_BASE_URL"),
        ) else {
            return Ok(None);
        };
        validate_secret_strength(&secret, "MEDIA_SECRET")?;

        Ok(Some(Self {
            secret: SecretString::from(secret),
            base_url: base_url.trim_end_matches('/').to_string(),
            ops_path: get_env_or_default("MEDIA_OPS_PATH", "fit-in/800x800")
                .trim_matches('/')
                .to_string(),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    get_optional_env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Read a TTL in milliseconds. Negative values disable the cache.
fn get_ttl(key: &str) -> Result<Duration, ConfigError> {
    let millis = get_env_or_default(key, DEFAULT_CACHE_TTL_MS)
        .parse::<i64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Ok(ttl_from_millis(millis))
}

/// Convert a signed millisecond count into a TTL, clamping negatives to zero.
fn ttl_from_millis(millis: i64) -> Duration {
    u64::try_from(millis).map_or(Duration::ZERO, Duration::from_millis)
}

/// Reject media secrets that are sample values or too weak to sign with.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let insecure = |reason: String| -> Result<(), ConfigError> {
        Err(ConfigError::InsecureSecret(var_name.to_string(), reason))
    };

    let lower = secret.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(**p)) {
        return insecure(format!("looks like a sample value (contains '{pattern}')"));
    }

    if secret.chars().count() < MIN_SECRET_LEN {
        return insecure(format!("shorter than {MIN_SECRET_LEN} characters"));
    }

    let distinct = secret.chars().collect::<std::collections::BTreeSet<_>>().len();
    if distinct < MIN_DISTINCT_CHARS {
        return insecure(format!(
            "only {distinct} distinct characters, need {MIN_DISTINCT_CHARS}"
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_secret_rejected() {
        let result = validate_secret_strength("your-media-key-goes-here", "MEDIA_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = validate_secret_strength("k3y!", "MEDIA_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_repetitive_secret_rejected() {
        let result = validate_secret_strength("abababababababababab", "MEDIA_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_random_secret_accepted() {
        let result = validate_secret_strength("q7Vn2xLp9ZsR4tKw", "MEDIA_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_ttl_from_millis() {
        assert_eq!(ttl_from_millis(1500), Duration::from_millis(1500));
        assert_eq!(ttl_from_millis(0), Duration::ZERO);
        assert_eq!(ttl_from_millis(-10), Duration::ZERO);
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            commerce: CommerceConfig {
                backend_url: "http://localhost:9000".to_string(),
                publishable_key: "pk_test".to_string(),
                region_id: Some("reg_1".to_string()),
                currency_code: "USD".to_string(),
                product_cache_ttl: Duration::from_secs(60),
                product_cache_max: 500,
            },
            search: None,
            media: None,
            catalog_cache_ttl: Duration::from_secs(60),
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let search = SearchConfig {
            host: "https://search.example.test".to_string(),
            api_key: SecretString::from("search_key_value"),
            index: "products".to_string(),
        };
        let media = MediaConfig {
            secret: SecretString::from("media_secret_value"),
            base_url: "https://img.example.test".to_string(),
            ops_path: "fit-in/800x800".to_string(),
        };

        let debug_output = format!("{search:?} {media:?}");

        assert!(debug_output.contains("search.example.test"));
        assert!(debug_output.contains("fit-in/800x800"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("search_key_value"));
        assert!(!debug_output.contains("media_secret_value"));
    }
}
