//! Response payloads of the checkout mutations.

use serde::Deserialize;

use crate::checkout::{AccountError, CheckoutUserError};

/// Node reference carrying only its global ID.
#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRegisterData {
    pub account_register: Option<AccountRegisterPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRegisterPayload {
    #[serde(default)]
    pub requires_confirmation: Option<bool>,
    #[serde(default)]
    pub errors: Vec<AccountError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCreateData {
    pub token_create: Option<TokenCreatePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCreatePayload {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub errors: Vec<AccountError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCustomerAttachData {
    pub checkout_customer_attach: Option<CheckoutErrorsPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutEmailUpdateData {
    pub checkout_email_update: Option<CheckoutErrorsPayload>,
}

/// Payload of checkout mutations whose only interesting part is the error
/// list.
#[derive(Debug, Deserialize)]
pub struct CheckoutErrorsPayload {
    #[serde(default)]
    pub errors: Vec<CheckoutUserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInitializeData {
    pub transaction_initialize: Option<TransactionInitializePayload>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionInitializePayload {
    pub transaction: Option<Node>,
    #[serde(default)]
    pub errors: Vec<CheckoutUserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCompleteData {
    pub checkout_complete: Option<CheckoutCompletePayload>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutCompletePayload {
    pub order: Option<Node>,
    #[serde(default)]
    pub errors: Vec<CheckoutUserError>,
}
