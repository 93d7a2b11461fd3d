//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `WHATSAPP_NUMBER` - Number that receives checkout messages (international format)
//! - `ADMIN_ALLOWED_EMAILS` - Comma-separated emails allowed into the admin surface
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_DISCOUNTS_FILE` - YAML file replacing the built-in discount codes
//! - `STOREFRONT_RELEASE_STOCK_ON_REMOVE` - Return reserved stock when a cart line is
//!   removed or a cart is cleared (default: true)
//! - `STOREFRONT_SEED_CATALOG` - Seed the catalog on startup when it is empty (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_TRACES_SAMPLE_RATE` - Fraction of requests traced (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

use am_popcorn_core::{DiscountRules, Email};

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Failed to read discount rules from {0}: {1}")]
    DiscountRules(PathBuf, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Destination number for checkout messages
    pub whatsapp_number: String,
    /// Emails allowed to use the admin surface
    pub admin_allowed_emails: AdminAllowList,
    /// Optional YAML file with discount rules
    pub discounts_file: Option<PathBuf>,
    /// Give reserved stock back when cart lines are removed
    pub release_stock_on_remove: bool,
    /// Seed the catalog on startup when it is empty
    pub seed_catalog: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of transactions sent to Sentry
    pub sentry_traces_sample_rate: f32,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
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

        let whatsapp_number = validate_whatsapp_number(&get_required_env("WHATSAPP_NUMBER")?)?;
        let admin_allowed_emails = AdminAllowList::parse(&get_required_env("ADMIN_ALLOWED_EMAILS")?)
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_ALLOWED_EMAILS".to_string(), e))?;

        let discounts_file = get_optional_env("STOREFRONT_DISCOUNTS_FILE").map(PathBuf::from);
        let release_stock_on_remove = get_bool_env("STOREFRONT_RELEASE_STOCK_ON_REMOVE", true)?;
        let seed_catalog = get_bool_env("STOREFRONT_SEED_CATALOG", true)?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_traces_sample_rate = get_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")
            .parse::<f32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SENTRY_TRACES_SAMPLE_RATE".to_string(), e.to_string())
            })?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            whatsapp_number,
            admin_allowed_emails,
            discounts_file,
            release_stock_on_remove,
            seed_catalog,
            sentry_dsn,
            sentry_environment,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Discount rules from `discounts_file`, or the built-in codes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DiscountRules` if the file cannot be read or parsed.
    pub fn load_discount_rules(&self) -> Result<DiscountRules, ConfigError> {
        let Some(path) = &self.discounts_file else {
            return Ok(DiscountRules::default());
        };
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::DiscountRules(path.clone(), e.to_string()))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::DiscountRules(path.clone(), e.to_string()))
    }
}

/// Emails allowed into the admin surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowList(Vec<Email>);

impl AdminAllowList {
    /// Build from already-parsed emails.
    #[must_use]
    pub const fn new(emails: Vec<Email>) -> Self {
        Self(emails)
    }

    /// Parse a comma-separated list. Blank entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid entry.
    pub fn parse(raw: &str) -> Result<Self, String> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| Email::parse(entry).map_err(|e| format!("{entry}: {e}")))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Whether `email` may use the admin surface.
    #[must_use]
    pub fn contains(&self, email: &Email) -> bool {
        self.0.contains(email)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Database URL alone, for tools that do not need the full configuration.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither `STOREFRONT_DATABASE_URL`
/// nor `DATABASE_URL` is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    let _ = dotenvy::dotenv();
    get_database_url("STOREFRONT_DATABASE_URL")
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., STOREFRONT_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a boolean environment variable (`true`/`false`, `1`/`0`, `yes`/`no`).
fn get_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = get_optional_env(key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

/// Validate a WhatsApp number and strip formatting, leaving digits only.
fn validate_whatsapp_number(raw: &str) -> Result<String, ConfigError> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, '+' | ' ' | '-' | '(' | ')'))
        .collect();
    if digits.len() < 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::InvalidEnvVar(
            "WHATSAPP_NUMBER".to_string(),
            "must be an international phone number, e.g. +5491155550000".to_string(),
        ));
    }
    Ok(digits)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            whatsapp_number: "5491155550000".to_string(),
            admin_allowed_emails: AdminAllowList::default(),
            discounts_file: None,
            release_stock_on_remove: true,
            seed_catalog: true,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_traces_sample_rate: 0.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert_eq!(config.load_discount_rules().unwrap(), DiscountRules::default());
    }

    #[test]
    fn test_allow_list_parse() {
        let list = AdminAllowList::parse(" Encargada@Kiosco.org, ,profe@escuela.edu ").unwrap();
        assert!(list.contains(&Email::parse("encargada@kiosco.org").unwrap()));
        assert!(list.contains(&Email::parse("PROFE@escuela.edu").unwrap()));
        assert!(!list.contains(&Email::parse("otro@kiosco.org").unwrap()));

        assert!(AdminAllowList::parse("ok@kiosco.org,broken").is_err());
        assert!(AdminAllowList::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_validate_whatsapp_number() {
        assert_eq!(
            validate_whatsapp_number("+54 9 (11) 5555-0000").unwrap(),
            "5491155550000"
        );
        assert!(validate_whatsapp_number("12345").is_err());
        assert!(validate_whatsapp_number("+54 9 11 CALL-ME").is_err());
    }
}
