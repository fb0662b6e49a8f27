//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CATALOG_API_URL` - Base URL of the remote catalog service
//!
//! ## Optional
//! - `CATALOG_API_TOKEN` - Bearer token for the catalog service
//! - `CATALOG_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `CATALOG_CACHE_TTL_SECS` - Product list cache lifetime (default: 300)
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `STOCKROOM_LOG_JSON` - Emit JSON logs when set to `1` or `true`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_REQUEST_TIMEOUT_SECS: &str = "10";
const DEFAULT_CACHE_TTL_SECS: &str = "300";
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Prefixes of template values left in `.env` files (case-insensitive).
///
/// Only the start of the token is checked; random tokens may contain any
/// substring.
const PLACEHOLDER_PREFIXES: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "change-me",
    "replace-me",
    "replace_me",
    "placeholder",
    "example",
    "todo",
    "fixme",
    "insert-",
    "enter-",
    "put-your",
    "add-your",
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

/// Remote catalog service configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct CatalogApiConfig {
    /// Base URL, e.g. `https://catalog.internal/api/`
    pub base_url: Url,
    /// Optional bearer token
    pub token: Option<SecretString>,
    /// Timeout applied to every request
    pub request_timeout: Duration,
}

impl std::fmt::Debug for CatalogApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl CatalogApiConfig {
    /// Load the catalog settings on their own (used by the CLI).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL is missing or malformed, a timeout is
    /// not a number, or the token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_url("CATALOG_API_URL", &get_required_env("CATALOG_API_URL")?)?;
        let token = get_optional_env("CATALOG_API_TOKEN")
            .map(|token| {
                validate_secret_strength(&token, "CATALOG_API_TOKEN")?;
                Ok(SecretString::from(token))
            })
            .transpose()?;
        let request_timeout = parse_secs(
            "CATALOG_REQUEST_TIMEOUT_SECS",
            &get_env_or_default("CATALOG_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
        )?;

        Ok(Self {
            base_url,
            token,
            request_timeout,
        })
    }

    /// Whether requests carry a bearer token.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|token| !token.expose_secret().is_empty())
    }
}

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Remote catalog service
    pub catalog: CatalogApiConfig,
    /// How long a fetched product list stays cached
    pub cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Emit JSON logs instead of text
    pub log_json: bool,
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the catalog token fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("ADMIN_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ADMIN_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_PORT".to_string(), e.to_string()))?;
        let catalog = CatalogApiConfig::from_env()?;
        let cache_ttl = parse_secs(
            "CATALOG_CACHE_TTL_SECS",
            &get_env_or_default("CATALOG_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS),
        )?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let log_json = get_optional_env("STOCKROOM_LOG_JSON").is_some_and(|v| is_truthy(&v));

        Ok(Self {
            host,
            port,
            catalog,
            cache_ttl,
            sentry_dsn,
            sentry_environment,
            log_json,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        )),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
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

/// Validate that a token is not a template value and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.trim().to_lowercase();

    if lower.starts_with('<') && lower.ends_with('>') {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            "appears to be a placeholder (wrapped in '<>')".to_string(),
        ));
    }
    if let Some(prefix) = PLACEHOLDER_PREFIXES.iter().find(|p| lower.starts_with(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (starts with '{prefix}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn catalog() -> CatalogApiConfig {
        CatalogApiConfig {
            base_url: Url::parse("https://catalog.test/api/").unwrap(),
            token: Some(SecretString::from("tk_9fQ2x7LmZ4pR8vW1")),
            request_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-api-token", "CATALOG_API_TOKEN").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_bracketed_placeholder() {
        assert!(validate_secret_strength("<catalog-token>", "CATALOG_API_TOKEN").is_err());
    }

    #[test]
    fn test_validate_secret_strength_allows_placeholder_words_inside_token() {
        for token in [
            "tk_9fQXxx2LmZ4pR8vW1",
            "Gh7insertQ2mZ9pL4vW8",
            "sk_Replace8Kd2Wq9Zt5",
            "pk_3TodoYv8Lm2Qx7Rn",
        ] {
            assert!(
                validate_secret_strength(token, "CATALOG_API_TOKEN").is_ok(),
                "{token} rejected"
            );
        }
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaa", "CATALOG_API_TOKEN").is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "CATALOG_API_TOKEN").is_ok());
    }

    #[test]
    fn test_parse_secs() {
        assert_eq!(parse_secs("T", " 30 ").unwrap(), Duration::from_secs(30));
        assert!(matches!(
            parse_secs("T", "0").unwrap_err(),
            ConfigError::InvalidEnvVar(_, ref msg) if msg == "must be greater than zero"
        ));
        assert!(parse_secs("T", "ten").is_err());
    }

    #[test]
    fn test_parse_url_requires_http() {
        assert!(parse_url("CATALOG_API_URL", "http://localhost:4000").is_ok());
        assert!(parse_url("CATALOG_API_URL", "ftp://catalog.test").is_err());
        assert!(parse_url("CATALOG_API_URL", "not a url").is_err());
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy("1"));
        assert!(is_truthy(" TRUE "));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("off"));
    }

    #[test]
    fn test_socket_addr() {
        let config = AdminConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            catalog: catalog(),
            cache_ttl: Duration::from_secs(300),
            sentry_dsn: None,
            sentry_environment: None,
            log_json: false,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3001);
    }

    #[test]
    fn test_catalog_config_debug_redacts_token() {
        let config = catalog();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("tk_9fQ2x7LmZ4pR8vW1"));
        assert!(debug.contains("catalog.test"));
        assert!(config.has_token());
    }
}
