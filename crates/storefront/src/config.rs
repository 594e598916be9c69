//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SALEOR_API_URL` - Saleor GraphQL endpoint (e.g., <https://shop.example.net/graphql/>)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `SALEOR_CHANNEL` - Sales channel slug checkouts belong to
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `SALEOR_PAYMENT_GATEWAY` - Payment app ID (default: mirumee.payments.dummy)
//! - `SALEOR_LANGUAGE_CODE` - Language code for customer attach (default: `EN_US`)
//! - `SALEOR_APP_TOKEN` - App token for anonymous requests (high entropy)
//! - `CHECKOUT_SIGNAL_DELAY_MS` - Delay before the registration signal (default: 100)
//! - `CHECKOUT_TOKEN_PROPAGATION_MS` - Delay between sign-in and attach (default: 300)
//! - `CHECKOUT_CREDENTIAL_POLL_ATTEMPTS` - Credential wait, in intervals (default: 10)
//! - `CHECKOUT_CREDENTIAL_POLL_INTERVAL_MS` - Credential wait interval (default: 100)
//! - `CHECKOUT_ATTEMPT_TIMEOUT_SECS` - Upper bound on one pay action (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use guestpay_core::{ChannelSlug, CheckoutId, GatewayId};
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::checkout::{AttemptSettings, CheckoutTimings, PaymentSettings};

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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: Url,
    /// Saleor API configuration
    pub saleor: SaleorConfig,
    /// Checkout attempt timing
    pub checkout: CheckoutConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Saleor API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct SaleorConfig {
    /// GraphQL endpoint
    pub api_url: Url,
    /// Sales channel slug
    pub channel: ChannelSlug,
    /// Payment app that initializes transactions
    pub gateway: GatewayId,
    /// Language code sent with customer attach
    pub language_code: String,
    /// App token used until a customer signs in
    pub app_token: Option<SecretString>,
}

impl std::fmt::Debug for SaleorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaleorConfig")
            .field("api_url", &self.api_url.as_str())
            .field("channel", &self.channel)
            .field("gateway", &self.gateway)
            .field("language_code", &self.language_code)
            .field(
                "app_token",
                &self.app_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Checkout attempt timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Delays and budgets between registration and payment
    pub timings: CheckoutTimings,
    /// Upper bound on one pay action
    pub attempt_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            timings: CheckoutTimings::default(),
            attempt_timeout: Duration::from_secs(30),
        }
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
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env_or_default("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_url("STOREFRONT_BASE_URL")?;

        let saleor = SaleorConfig::from_env()?;
        let checkout = CheckoutConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            host,
            port,
            base_url,
            saleor,
            checkout,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Checkout page of `checkout_id`, where account confirmation links
    /// return to.
    #[must_use]
    pub fn checkout_url(&self, checkout_id: &CheckoutId) -> Url {
        let mut url = self.base_url.clone();
        url.set_path("/checkout");
        url.query_pairs_mut()
            .clear()
            .append_pair("checkout", checkout_id.as_str());
        url
    }

    /// Settings for one attempt on `checkout_id`.
    #[must_use]
    pub fn attempt_settings(&self, checkout_id: &CheckoutId) -> AttemptSettings {
        AttemptSettings {
            payment: PaymentSettings {
                gateway: self.saleor.gateway.clone(),
                language_code: self.saleor.language_code.clone(),
                timings: self.checkout.timings,
            },
            redirect_url: self.checkout_url(checkout_id),
            deadline: self.checkout.attempt_timeout,
        }
    }
}

impl SaleorConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let app_token = match get_optional_env("SALEOR_APP_TOKEN") {
            Some(_) => Some(get_validated_secret("SALEOR_APP_TOKEN")?),
            None => None,
        };

        Ok(Self {
            api_url: get_required_url("SALEOR_API_URL")?,
            channel: ChannelSlug::new(get_required_env("SALEOR_CHANNEL")?),
            gateway: GatewayId::new(get_env_or_default(
                "SALEOR_PAYMENT_GATEWAY",
                "mirumee.payments.dummy",
            )),
            language_code: get_env_or_default("SALEOR_LANGUAGE_CODE", "EN_US"),
            app_token,
        })
    }
}

impl CheckoutConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timings = CheckoutTimings {
            signal_delay: Duration::from_millis(parse_env_or_default(
                "CHECKOUT_SIGNAL_DELAY_MS",
                "100",
            )?),
            token_propagation_delay: Duration::from_millis(parse_env_or_default(
                "CHECKOUT_TOKEN_PROPAGATION_MS",
                "300",
            )?),
            credential_poll_attempts: parse_env_or_default(
                "CHECKOUT_CREDENTIAL_POLL_ATTEMPTS",
                "10",
            )?,
            credential_poll_interval: Duration::from_millis(parse_env_or_default(
                "CHECKOUT_CREDENTIAL_POLL_INTERVAL_MS",
                "100",
            )?),
        };
        let attempt_timeout =
            Duration::from_secs(parse_env_or_default("CHECKOUT_ATTEMPT_TIMEOUT_SECS", "30")?);

        check_attempt_timeout(&timings, attempt_timeout)?;

        Ok(Self {
            timings,
            attempt_timeout,
        })
    }
}

/// The attempt deadline must outlast the credential wait, which must itself
/// be representable.
fn check_attempt_timeout(
    timings: &CheckoutTimings,
    attempt_timeout: Duration,
) -> Result<(), ConfigError> {
    let Some(credential_wait) = timings.checked_credential_wait() else {
        return Err(ConfigError::InvalidEnvVar(
            "CHECKOUT_CREDENTIAL_POLL_ATTEMPTS".to_string(),
            format!(
                "{} attempts of {}ms overflow the credential wait",
                timings.credential_poll_attempts,
                timings.credential_poll_interval.as_millis()
            ),
        ));
    };
    if attempt_timeout <= credential_wait {
        return Err(ConfigError::InvalidEnvVar(
            "CHECKOUT_ATTEMPT_TIMEOUT_SECS".to_string(),
            format!(
                "must exceed the credential wait of {}ms",
                credential_wait.as_millis()
            ),
        ));
    }
    Ok(())
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as an absolute http(s) URL.
fn get_required_url(key: &str) -> Result<Url, ConfigError> {
    parse_http_url(key, &get_required_env(key)?)
}

fn parse_http_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default`.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
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

    // Real app tokens are random
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

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> StorefrontConfig {
        StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: Url::parse("http://localhost:3000").unwrap(),
            saleor: SaleorConfig {
                api_url: Url::parse("https://shop.example.net/graphql/").unwrap(),
                channel: ChannelSlug::new("default-channel"),
                gateway: GatewayId::new("mirumee.payments.dummy"),
                language_code: "EN_US".to_string(),
                app_token: Some(SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6")),
            },
            checkout: CheckoutConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-app-token-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_http_url_rejects_other_schemes() {
        assert!(parse_http_url("SALEOR_API_URL", "https://shop.example.net/graphql/").is_ok());
        assert!(matches!(
            parse_http_url("SALEOR_API_URL", "ftp://shop.example.net/"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(parse_http_url("SALEOR_API_URL", "not a url").is_err());
    }

    #[test]
    fn test_attempt_timeout_must_exceed_credential_wait() {
        let timings = CheckoutTimings::default();

        assert!(check_attempt_timeout(&timings, Duration::from_secs(30)).is_ok());
        assert!(matches!(
            check_attempt_timeout(&timings, Duration::from_secs(1)),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "CHECKOUT_ATTEMPT_TIMEOUT_SECS"
        ));
    }

    #[test]
    fn test_overflowing_credential_wait_is_a_config_error() {
        let timings = CheckoutTimings {
            credential_poll_attempts: u32::MAX,
            credential_poll_interval: Duration::from_millis(u64::MAX),
            ..CheckoutTimings::default()
        };

        assert!(matches!(
            check_attempt_timeout(&timings, Duration::from_secs(30)),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "CHECKOUT_CREDENTIAL_POLL_ATTEMPTS"
        ));
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_attempt_settings_follow_config() {
        let settings = config().attempt_settings(&CheckoutId::new("Q2hlY2tvdXQ6MQ=="));
        assert_eq!(
            settings.redirect_url.as_str(),
            "http://localhost:3000/checkout?checkout=Q2hlY2tvdXQ6MQ%3D%3D"
        );
        assert_eq!(settings.deadline, Duration::from_secs(30));
        assert_eq!(settings.payment.gateway.as_str(), "mirumee.payments.dummy");
        assert_eq!(settings.payment.timings.credential_wait(), Duration::from_secs(1));
    }

    #[test]
    fn test_saleor_config_debug_redacts_token() {
        let debug_output = format!("{:?}", config().saleor);

        assert!(debug_output.contains("shop.example.net"));
        assert!(debug_output.contains("default-channel"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("aB3$xY9"));
    }
}
