//! Run one checkout attempt against the configured Saleor API.
//!
//! # Usage
//!
//! ```bash
//! # Pay as a guest
//! guestpay pay -c Q2hlY2tvdXQ6MQ== -e shopper@example.net
//!
//! # Create an account while paying (password read from GUESTPAY_PASSWORD)
//! GUESTPAY_PASSWORD=... guestpay pay -c Q2hlY2tvdXQ6MQ== -e new@example.net --create-account
//!
//! # Pay as a signed-in customer
//! guestpay pay -c Q2hlY2tvdXQ6MQ== --token "$CUSTOMER_TOKEN"
//! ```
//!
//! # Environment Variables
//!
//! Reads the storefront configuration (`SALEOR_API_URL`, `SALEOR_CHANNEL`,
//! `STOREFRONT_BASE_URL`, ...) the same way the server does.

use clap::Args;
use guestpay_core::{CheckoutId, CheckoutSession};
use guestpay_storefront::checkout::{
    AttemptError, AttemptOutcome, AttemptRequest, CheckoutApiProvider, run_attempt,
};
use guestpay_storefront::config::{ConfigError, StorefrontConfig};
use guestpay_storefront::saleor::SaleorClient;
use secrecy::SecretString;
use thiserror::Error;

/// Errors that can occur while paying from the command line.
#[derive(Debug, Error)]
pub enum PayError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The attempt did not produce a report.
    #[error("Checkout attempt failed: {0}")]
    Attempt(#[from] AttemptError),

    /// The report could not be serialized.
    #[error("Could not write report: {0}")]
    Output(#[from] serde_json::Error),
}

/// Arguments of `guestpay pay`.
#[derive(Debug, Args)]
pub struct PayArgs {
    /// Saleor checkout ID
    #[arg(short, long)]
    pub checkout_id: String,

    /// Shopper email (falls back to the checkout email when empty)
    #[arg(short, long, default_value = "")]
    pub email: String,

    /// Password for the new account
    #[arg(long, env = "GUESTPAY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Create an account with the email and password
    #[arg(long)]
    pub create_account: bool,

    /// Customer token of a signed-in shopper
    #[arg(long, env = "GUESTPAY_CUSTOMER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Run the attempt and print the report as JSON.
///
/// # Errors
///
/// Returns [`PayError`] if configuration is missing, the attempt fails, or
/// the report cannot be written.
pub async fn run(args: PayArgs) -> Result<AttemptOutcome, PayError> {
    let config = StorefrontConfig::from_env()?;
    let client = SaleorClient::new(&config.saleor);

    let checkout_id = CheckoutId::new(args.checkout_id);
    let customer_token = args.token.map(SecretString::from);
    let mut checkout =
        CheckoutSession::guest(checkout_id.clone(), config.saleor.channel.clone(), None);
    if customer_token.is_some() {
        checkout = checkout.authenticated();
    }

    tracing::info!(
        checkout_id = %checkout_id,
        authenticated = checkout.authenticated,
        create_account = args.create_account,
        "Running checkout attempt..."
    );

    let settings = config.attempt_settings(&checkout_id);
    let outcome = run_attempt(
        client.session(customer_token),
        AttemptRequest {
            checkout,
            email: args.email,
            password: SecretString::from(args.password.unwrap_or_default()),
            create_account: args.create_account,
        },
        &settings,
    )
    .await?;

    let report = serde_json::to_string_pretty(&outcome)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{report}");
    }

    Ok(outcome)
}
