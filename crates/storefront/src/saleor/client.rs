//! Saleor GraphQL client and per-attempt sessions.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use guestpay_core::{CheckoutId, Credentials, Email, OrderId, TransactionId};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, error, instrument};
use url::Url;

use super::queries;
use super::types::{
    AccountRegisterData, CheckoutCompleteData, CheckoutCustomerAttachData,
    CheckoutEmailUpdateData, TokenCreateData, TransactionInitializeData,
};
use super::{ApiError, GraphQLError};
use crate::checkout::{
    AccountError, AuthToken, CheckoutApi, CheckoutApiProvider, CheckoutCompletion,
    CheckoutUserError, PaymentGatewayInput, RegisterAccountInput, TransactionResult,
};
use crate::config::SaleorConfig;

// ─────────────────────────────────────────────────────────────────────────────
// GraphQL Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

impl<T> GraphQLResponse<T> {
    fn into_result(self) -> Result<T, ApiError> {
        if let Some(errors) = self.errors
            && !errors.is_empty()
        {
            return Err(ApiError::GraphQL(errors));
        }

        self.data.ok_or(ApiError::MissingPayload("data"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the Saleor GraphQL API.
///
/// Cheap to clone. Hands out [`SaleorSession`]s that carry the
/// authentication of a single checkout attempt.
#[derive(Clone)]
pub struct SaleorClient {
    inner: Arc<SaleorClientInner>,
}

struct SaleorClientInner {
    client: reqwest::Client,
    api_url: Url,
    app_token: Option<SecretString>,
}

impl SaleorClient {
    /// Create a new Saleor API client.
    #[must_use]
    pub fn new(config: &SaleorConfig) -> Self {
        Self {
            inner: Arc::new(SaleorClientInner {
                client: reqwest::Client::new(),
                api_url: config.api_url.clone(),
                app_token: config.app_token.clone(),
            }),
        }
    }

    /// Open a session, optionally already authenticated as a customer.
    #[must_use]
    pub fn open_session(&self, customer_token: Option<SecretString>) -> SaleorSession {
        SaleorSession {
            client: self.clone(),
            customer_token: RwLock::new(customer_token),
        }
    }
}

impl CheckoutApiProvider for SaleorClient {
    fn session(&self, customer_token: Option<SecretString>) -> Arc<dyn CheckoutApi> {
        Arc::new(self.open_session(customer_token))
    }
}

/// Saleor API calls of one checkout attempt.
///
/// Requests carry the customer token once one is known, the app token
/// otherwise.
pub struct SaleorSession {
    client: SaleorClient,
    customer_token: RwLock<Option<SecretString>>,
}

impl SaleorSession {
    /// Returns `true` once a customer token is in use.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.customer_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn bearer(&self) -> Option<SecretString> {
        self.customer_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .or_else(|| self.client.inner.app_token.clone())
    }

    fn store_token(&self, token: SecretString) {
        *self
            .customer_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Execute a GraphQL document.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ApiError> {
        let request = GraphQLRequest { query, variables };

        let mut builder = self
            .client
            .inner
            .client
            .post(self.client.inner.api_url.clone())
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(token) = self.bearer() {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder.send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!(
                operation,
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Saleor API returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: response_text.chars().take(200).collect(),
            });
        }

        let response: GraphQLResponse<T> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                error!(
                    operation,
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse Saleor GraphQL response"
                );
                return Err(ApiError::Parse(e));
            }
        };

        if let Some(errors) = &response.errors
            && !errors.is_empty()
        {
            debug!(operation, errors = ?errors, "GraphQL errors in response");
        }
        response.into_result()
    }
}

#[async_trait]
impl CheckoutApi for SaleorSession {
    #[instrument(skip_all, fields(email = %input.email, channel = %input.channel))]
    async fn register_account(
        &self,
        input: &RegisterAccountInput,
    ) -> Result<Vec<AccountError>, ApiError> {
        let variables = serde_json::json!({
            "input": {
                "email": input.email.as_str(),
                "password": input.password.expose_secret(),
                "channel": input.channel.as_str(),
                "redirectUrl": input.redirect_url.as_str(),
            }
        });

        let data: AccountRegisterData = self
            .execute("accountRegister", queries::ACCOUNT_REGISTER, variables)
            .await?;
        let payload = data
            .account_register
            .ok_or(ApiError::MissingPayload("accountRegister"))?;
        debug!(
            requires_confirmation = ?payload.requires_confirmation,
            errors = payload.errors.len(),
            "accountRegister answered"
        );
        Ok(payload.errors)
    }

    #[instrument(skip_all, fields(email = %credentials.email()))]
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthToken, ApiError> {
        let variables = serde_json::json!({
            "email": credentials.email().as_str(),
            "password": credentials.password().expose_secret(),
        });

        let data: TokenCreateData = self
            .execute("tokenCreate", queries::TOKEN_CREATE, variables)
            .await?;
        let payload = data
            .token_create
            .ok_or(ApiError::MissingPayload("tokenCreate"))?;

        if !payload.errors.is_empty() {
            let reasons: Vec<_> = payload
                .errors
                .iter()
                .map(|e| e.message.clone().unwrap_or_else(|| format!("{:?}", e.code)))
                .collect();
            return Err(ApiError::Rejected(reasons.join("; ")));
        }

        let token = SecretString::from(payload.token.ok_or(ApiError::MissingPayload("token"))?);
        self.store_token(token.clone());
        debug!("customer token stored for session");

        Ok(AuthToken {
            token,
            refresh_token: payload.refresh_token.map(SecretString::from),
        })
    }

    #[instrument(skip(self))]
    async fn attach_customer(
        &self,
        checkout_id: &CheckoutId,
        language_code: &str,
    ) -> Result<Vec<CheckoutUserError>, ApiError> {
        let variables = serde_json::json!({
            "checkoutId": checkout_id.as_str(),
            "languageCode": language_code,
        });

        let data: CheckoutCustomerAttachData = self
            .execute(
                "checkoutCustomerAttach",
                queries::CHECKOUT_CUSTOMER_ATTACH,
                variables,
            )
            .await?;
        Ok(data
            .checkout_customer_attach
            .ok_or(ApiError::MissingPayload("checkoutCustomerAttach"))?
            .errors)
    }

    #[instrument(skip(self, gateway), fields(gateway = %gateway.id))]
    async fn initialize_transaction(
        &self,
        checkout_id: &CheckoutId,
        gateway: &PaymentGatewayInput,
    ) -> Result<TransactionResult, ApiError> {
        let variables = serde_json::json!({
            "checkoutId": checkout_id.as_str(),
            "paymentGateway": gateway,
        });

        let data: TransactionInitializeData = self
            .execute(
                "transactionInitialize",
                queries::TRANSACTION_INITIALIZE,
                variables,
            )
            .await?;
        let payload = data
            .transaction_initialize
            .ok_or(ApiError::MissingPayload("transactionInitialize"))?;

        Ok(TransactionResult {
            transaction_id: payload.transaction.map(|node| TransactionId::new(node.id)),
            errors: payload.errors,
        })
    }

    #[instrument(skip(self))]
    async fn complete_checkout(
        &self,
        checkout_id: &CheckoutId,
    ) -> Result<CheckoutCompletion, ApiError> {
        let variables = serde_json::json!({ "checkoutId": checkout_id.as_str() });

        let data: CheckoutCompleteData = self
            .execute("checkoutComplete", queries::CHECKOUT_COMPLETE, variables)
            .await?;
        let payload = data
            .checkout_complete
            .ok_or(ApiError::MissingPayload("checkoutComplete"))?;

        Ok(CheckoutCompletion {
            order_id: payload.order.map(|node| OrderId::new(node.id)),
            api_errors: payload.errors.iter().map(CheckoutUserError::to_alert).collect(),
        })
    }

    #[instrument(skip(self))]
    async fn update_checkout_email(
        &self,
        checkout_id: &CheckoutId,
        email: &Email,
    ) -> Result<Vec<CheckoutUserError>, ApiError> {
        let variables = serde_json::json!({
            "checkoutId": checkout_id.as_str(),
            "email": email.as_str(),
        });

        let data: CheckoutEmailUpdateData = self
            .execute(
                "checkoutEmailUpdate",
                queries::CHECKOUT_EMAIL_UPDATE,
                variables,
            )
            .await?;
        Ok(data
            .checkout_email_update
            .ok_or(ApiError::MissingPayload("checkoutEmailUpdate"))?
            .errors)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(app_token: Option<&str>) -> SaleorClient {
        SaleorClient::new(&SaleorConfig {
            api_url: Url::parse("https://shop.example.net/graphql/").unwrap(),
            channel: "default-channel".into(),
            gateway: "mirumee.payments.dummy".into(),
            language_code: "EN_US".to_string(),
            app_token: app_token.map(SecretString::from),
        })
    }

    #[test]
    fn test_graphql_errors_take_precedence() {
        let response: GraphQLResponse<serde_json::Value> = serde_json::from_value(
            serde_json::json!({
                "data": {"checkoutComplete": null},
                "errors": [{"message": "Couldn't resolve id"}]
            }),
        )
        .unwrap();
        assert!(matches!(response.into_result(), Err(ApiError::GraphQL(e)) if e.len() == 1));
    }

    #[test]
    fn test_missing_data_is_an_error() {
        let response: GraphQLResponse<serde_json::Value> =
            serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(matches!(
            response.into_result(),
            Err(ApiError::MissingPayload("data"))
        ));
    }

    #[test]
    fn test_session_prefers_customer_token() {
        let client = client(Some("app-token"));

        let anonymous = client.open_session(None);
        assert!(!anonymous.is_authenticated());
        assert_eq!(anonymous.bearer().unwrap().expose_secret(), "app-token");

        anonymous.store_token(SecretString::from("customer-token"));
        assert!(anonymous.is_authenticated());
        assert_eq!(anonymous.bearer().unwrap().expose_secret(), "customer-token");
    }

    #[test]
    fn test_sessions_do_not_share_tokens() {
        let client = client(None);
        let first = client.open_session(None);
        let second = client.open_session(None);

        first.store_token(SecretString::from("customer-token"));
        assert!(first.is_authenticated());
        assert!(second.bearer().is_none());
    }
}
