//! Remote operation contracts consumed by checkout coordination.
//!
//! The transport is behind [`CheckoutApi`]; [`crate::saleor::SaleorSession`]
//! implements it over Saleor GraphQL.

use std::sync::Arc;

use async_trait::async_trait;
use guestpay_core::{ChannelSlug, CheckoutId, Credentials, Email, GatewayId, OrderId, TransactionId};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use super::alerts::AlertMessage;
use crate::saleor::ApiError;

/// Input of the account registration mutation.
#[derive(Debug, Clone)]
pub struct RegisterAccountInput {
    pub email: Email,
    pub password: SecretString,
    pub channel: ChannelSlug,
    /// Where the account confirmation email links back to.
    pub redirect_url: Url,
}

/// Error codes returned by account mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountErrorCode {
    Unique,
    Invalid,
    Required,
    PasswordTooShort,
    PasswordTooSimilar,
    PasswordTooCommon,
    PasswordEntirelyNumeric,
    ChannelInactive,
    InvalidCredentials,
    AccountNotConfirmed,
    Inactive,
    #[serde(other)]
    Other,
}

/// A field-level error from an account mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountError {
    pub field: Option<String>,
    pub code: AccountErrorCode,
    pub message: Option<String>,
}

impl AccountError {
    /// The account already exists.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.code == AccountErrorCode::Unique
    }
}

/// A field-level error from a checkout or transaction mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutUserError {
    pub field: Option<String>,
    pub code: String,
    pub message: Option<String>,
}

impl CheckoutUserError {
    /// Message suitable for the shopper, falling back to the code.
    #[must_use]
    pub fn to_alert(&self) -> AlertMessage {
        AlertMessage::new(self.message.clone().unwrap_or_else(|| self.code.clone()))
    }
}

/// Session token returned by sign-in.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token: SecretString,
    pub refresh_token: Option<SecretString>,
}

/// Event the test gateway should simulate for a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEvent {
    pub include_psp_reference: bool,
    #[serde(rename = "type")]
    pub event_type: &'static str,
}

impl TransactionEvent {
    /// A successful charge carrying a PSP reference.
    #[must_use]
    pub const fn charge_success() -> Self {
        Self {
            include_psp_reference: true,
            event_type: "CHARGE_SUCCESS",
        }
    }
}

/// Gateway selection and data for transaction initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentGatewayInput {
    pub id: GatewayId,
    pub data: PaymentGatewayData,
}

/// Gateway-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentGatewayData {
    pub event: TransactionEvent,
}

impl PaymentGatewayInput {
    /// Payload asking `gateway` to simulate a successful charge.
    #[must_use]
    pub const fn charge_success(gateway: GatewayId) -> Self {
        Self {
            id: gateway,
            data: PaymentGatewayData {
                event: TransactionEvent::charge_success(),
            },
        }
    }
}

/// Result of transaction initialization.
#[derive(Debug, Clone, Default)]
pub struct TransactionResult {
    pub transaction_id: Option<TransactionId>,
    pub errors: Vec<CheckoutUserError>,
}

/// Result of checkout completion.
#[derive(Debug, Clone, Default)]
pub struct CheckoutCompletion {
    pub order_id: Option<OrderId>,
    /// Errors that must be shown to the shopper.
    pub api_errors: Vec<AlertMessage>,
}

/// Remote operations used by one checkout attempt.
///
/// Implementations are session-scoped: a successful [`CheckoutApi::sign_in`]
/// authenticates the calls that follow on the same value.
#[async_trait]
pub trait CheckoutApi: Send + Sync {
    /// Register a new account. An empty error list means success.
    async fn register_account(
        &self,
        input: &RegisterAccountInput,
    ) -> Result<Vec<AccountError>, ApiError>;

    /// Create a session token for the given credentials.
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthToken, ApiError>;

    /// Attach the signed-in customer to the checkout.
    async fn attach_customer(
        &self,
        checkout_id: &CheckoutId,
        language_code: &str,
    ) -> Result<Vec<CheckoutUserError>, ApiError>;

    /// Start a payment transaction for the checkout.
    async fn initialize_transaction(
        &self,
        checkout_id: &CheckoutId,
        gateway: &PaymentGatewayInput,
    ) -> Result<TransactionResult, ApiError>;

    /// Turn the checkout into an order.
    async fn complete_checkout(&self, checkout_id: &CheckoutId)
    -> Result<CheckoutCompletion, ApiError>;

    /// Store the shopper's email on the checkout.
    async fn update_checkout_email(
        &self,
        checkout_id: &CheckoutId,
        email: &Email,
    ) -> Result<Vec<CheckoutUserError>, ApiError>;
}

/// Hands out a fresh [`CheckoutApi`] session per attempt.
pub trait CheckoutApiProvider: Send + Sync {
    /// Open a session, optionally authenticated with an existing customer
    /// token.
    fn session(&self, customer_token: Option<SecretString>) -> Arc<dyn CheckoutApi>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_success_payload_shape() {
        let input = PaymentGatewayInput::charge_success(GatewayId::new("mirumee.payments.dummy"));
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "mirumee.payments.dummy",
                "data": {
                    "event": {
                        "includePspReference": true,
                        "type": "CHARGE_SUCCESS"
                    }
                }
            })
        );
    }

    #[test]
    fn test_unknown_account_error_code() {
        let error: AccountError = serde_json::from_value(serde_json::json!({
            "field": "email",
            "code": "SOMETHING_NEW",
            "message": null
        }))
        .unwrap();
        assert_eq!(error.code, AccountErrorCode::Other);
        assert!(!error.is_conflict());
    }

    #[test]
    fn test_unique_is_conflict() {
        let error: AccountError = serde_json::from_value(serde_json::json!({
            "field": "email",
            "code": "UNIQUE",
            "message": "User with this Email already exists."
        }))
        .unwrap();
        assert!(error.is_conflict());
    }
}
