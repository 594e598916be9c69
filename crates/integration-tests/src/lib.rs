//! Integration test support for Guest Pay.
//!
//! Provides a scripted in-memory [`CheckoutApi`] that records every call, so
//! whole checkout attempts can run on tokio's paused clock without a Saleor
//! instance.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p guestpay-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `guest_checkout` - Registration, account linking and payment scenarios
//! - `pay_route` - HTTP surface of the pay action

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use guestpay_core::{
    ChannelSlug, CheckoutId, CheckoutSession, Credentials, Email, GatewayId, OrderId,
    TransactionId,
};
use guestpay_storefront::checkout::{
    AccountError, AccountErrorCode, AlertMessage, AttemptSettings, AuthToken, CheckoutApi,
    CheckoutApiProvider, CheckoutCompletion, CheckoutUserError, PaymentGatewayInput,
    RegisterAccountInput, TransactionResult,
};
use guestpay_storefront::config::{CheckoutConfig, SaleorConfig, StorefrontConfig};
use guestpay_storefront::saleor::ApiError;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

/// Checkout ID used by the scenarios.
pub const CHECKOUT_ID: &str = "Q2hlY2tvdXQ6MQ==";

/// Order ID the mock returns on completion.
pub const ORDER_ID: &str = "T3JkZXI6MQ==";

/// A remote call as the mock saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RegisterAccount { email: String, password: String },
    SignIn { email: String, password: String },
    AttachCustomer { checkout_id: String, language_code: String },
    InitializeTransaction { checkout_id: String, gateway: String },
    CompleteCheckout { checkout_id: String },
    UpdateCheckoutEmail { checkout_id: String, email: String },
}

impl Call {
    /// Short name of the call, for order assertions.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RegisterAccount { .. } => "register",
            Self::SignIn { .. } => "sign_in",
            Self::AttachCustomer { .. } => "attach",
            Self::InitializeTransaction { .. } => "transaction",
            Self::CompleteCheckout { .. } => "complete",
            Self::UpdateCheckoutEmail { .. } => "email",
        }
    }
}

/// How the mock answers account registration.
#[derive(Debug, Clone)]
pub enum RegisterBehavior {
    /// Answer with these errors (empty means success).
    Errors(Vec<AccountError>),
    /// Fail the request itself.
    TransportError,
    /// Never answer.
    Hang,
}

#[derive(Debug, Clone)]
struct Script {
    register: RegisterBehavior,
    sign_in_fails: bool,
    attach_errors: Vec<CheckoutUserError>,
    transaction_errors: Vec<CheckoutUserError>,
    transaction_transport_error: bool,
    completion_errors: Vec<AlertMessage>,
    email_update_errors: Vec<CheckoutUserError>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            register: RegisterBehavior::Errors(vec![]),
            sign_in_fails: false,
            attach_errors: vec![],
            transaction_errors: vec![],
            transaction_transport_error: false,
            completion_errors: vec![],
            email_update_errors: vec![],
        }
    }
}

/// Scripted in-memory Saleor stand-in.
///
/// Every call succeeds unless the script says otherwise.
#[derive(Debug, Default)]
pub struct MockCheckoutApi {
    script: Script,
    calls: Mutex<Vec<Call>>,
}

impl MockCheckoutApi {
    /// Mock where every call succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer registration with `errors`.
    #[must_use]
    pub fn with_register_errors(mut self, errors: Vec<AccountError>) -> Self {
        self.script.register = RegisterBehavior::Errors(errors);
        self
    }

    /// Answer registration with a `UNIQUE` email conflict.
    #[must_use]
    pub fn with_existing_account(self) -> Self {
        self.with_register_errors(vec![account_error(AccountErrorCode::Unique, "email")])
    }

    /// Set how registration behaves.
    #[must_use]
    pub fn with_register(mut self, behavior: RegisterBehavior) -> Self {
        self.script.register = behavior;
        self
    }

    /// Reject every sign-in.
    #[must_use]
    pub fn with_sign_in_failure(mut self) -> Self {
        self.script.sign_in_fails = true;
        self
    }

    /// Answer customer attach with `errors`.
    #[must_use]
    pub fn with_attach_errors(mut self, errors: Vec<CheckoutUserError>) -> Self {
        self.script.attach_errors = errors;
        self
    }

    /// Answer transaction initialization with `errors`.
    #[must_use]
    pub fn with_transaction_errors(mut self, errors: Vec<CheckoutUserError>) -> Self {
        self.script.transaction_errors = errors;
        self
    }

    /// Fail the transaction initialization request itself.
    #[must_use]
    pub fn with_transaction_transport_error(mut self) -> Self {
        self.script.transaction_transport_error = true;
        self
    }

    /// Answer checkout completion with these shopper-facing errors.
    #[must_use]
    pub fn with_completion_errors(mut self, errors: Vec<AlertMessage>) -> Self {
        self.script.completion_errors = errors;
        self
    }

    /// Answer checkout email updates with `errors`.
    #[must_use]
    pub fn with_email_update_errors(mut self, errors: Vec<CheckoutUserError>) -> Self {
        self.script.email_update_errors = errors;
        self
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of every call so far, in order.
    #[must_use]
    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls().iter().map(Call::name).collect()
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

fn unavailable() -> ApiError {
    ApiError::Status {
        status: 503,
        body: "service unavailable".to_string(),
    }
}

#[async_trait]
impl CheckoutApi for MockCheckoutApi {
    async fn register_account(
        &self,
        input: &RegisterAccountInput,
    ) -> Result<Vec<AccountError>, ApiError> {
        self.record(Call::RegisterAccount {
            email: input.email.to_string(),
            password: input.password.expose_secret().to_string(),
        });
        match &self.script.register {
            RegisterBehavior::Errors(errors) => Ok(errors.clone()),
            RegisterBehavior::TransportError => Err(unavailable()),
            RegisterBehavior::Hang => std::future::pending().await,
        }
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthToken, ApiError> {
        self.record(Call::SignIn {
            email: credentials.email().to_string(),
            password: credentials.password().expose_secret().to_string(),
        });
        if self.script.sign_in_fails {
            return Err(ApiError::Rejected("Please, enter valid credentials".to_string()));
        }
        Ok(AuthToken {
            token: SecretString::from("customer-token"),
            refresh_token: Some(SecretString::from("refresh-token")),
        })
    }

    async fn attach_customer(
        &self,
        checkout_id: &CheckoutId,
        language_code: &str,
    ) -> Result<Vec<CheckoutUserError>, ApiError> {
        self.record(Call::AttachCustomer {
            checkout_id: checkout_id.to_string(),
            language_code: language_code.to_string(),
        });
        Ok(self.script.attach_errors.clone())
    }

    async fn initialize_transaction(
        &self,
        checkout_id: &CheckoutId,
        gateway: &PaymentGatewayInput,
    ) -> Result<TransactionResult, ApiError> {
        self.record(Call::InitializeTransaction {
            checkout_id: checkout_id.to_string(),
            gateway: gateway.id.to_string(),
        });
        if self.script.transaction_transport_error {
            return Err(unavailable());
        }
        Ok(TransactionResult {
            transaction_id: Some(TransactionId::new("VHJhbnNhY3Rpb25JdGVtOjE=")),
            errors: self.script.transaction_errors.clone(),
        })
    }

    async fn complete_checkout(
        &self,
        checkout_id: &CheckoutId,
    ) -> Result<CheckoutCompletion, ApiError> {
        self.record(Call::CompleteCheckout {
            checkout_id: checkout_id.to_string(),
        });
        if !self.script.completion_errors.is_empty() {
            return Ok(CheckoutCompletion {
                order_id: None,
                api_errors: self.script.completion_errors.clone(),
            });
        }
        Ok(CheckoutCompletion {
            order_id: Some(OrderId::new(ORDER_ID)),
            api_errors: vec![],
        })
    }

    async fn update_checkout_email(
        &self,
        checkout_id: &CheckoutId,
        email: &Email,
    ) -> Result<Vec<CheckoutUserError>, ApiError> {
        self.record(Call::UpdateCheckoutEmail {
            checkout_id: checkout_id.to_string(),
            email: email.to_string(),
        });
        Ok(self.script.email_update_errors.clone())
    }
}

/// Provider handing out one shared [`MockCheckoutApi`] and remembering
/// which sessions carried a customer token.
pub struct MockProvider {
    api: Arc<MockCheckoutApi>,
    tokens: Mutex<Vec<Option<String>>>,
}

impl MockProvider {
    #[must_use]
    pub fn new(api: Arc<MockCheckoutApi>) -> Self {
        Self {
            api,
            tokens: Mutex::new(Vec::new()),
        }
    }

    /// Customer tokens of the sessions opened so far.
    #[must_use]
    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CheckoutApiProvider for MockProvider {
    fn session(&self, customer_token: Option<SecretString>) -> Arc<dyn CheckoutApi> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(customer_token.map(|t| t.expose_secret().to_string()));
        Arc::clone(&self.api) as Arc<dyn CheckoutApi>
    }
}

/// Account error with `code` on `field`.
#[must_use]
pub fn account_error(code: AccountErrorCode, field: &str) -> AccountError {
    AccountError {
        field: Some(field.to_string()),
        code,
        message: None,
    }
}

/// Checkout error with `code` and a shopper-facing `message`.
#[must_use]
pub fn checkout_error(code: &str, message: &str) -> CheckoutUserError {
    CheckoutUserError {
        field: None,
        code: code.to_string(),
        message: Some(message.to_string()),
    }
}

/// The scenario checkout, signed in or anonymous.
#[must_use]
pub fn checkout(authenticated: bool) -> CheckoutSession {
    let session = CheckoutSession::guest(
        CheckoutId::new(CHECKOUT_ID),
        ChannelSlug::new("default-channel"),
        None,
    );
    if authenticated {
        session.authenticated()
    } else {
        session
    }
}

/// Credentials parsed from test literals.
///
/// # Panics
///
/// Panics if `email` is not a valid address.
#[must_use]
pub fn credentials(email: &str, password: &str) -> Credentials {
    #[allow(clippy::unwrap_used)]
    let email = Email::parse(email).unwrap();
    Credentials::new(email, SecretString::from(password))
}

/// Storefront configuration pointing at nothing; pair it with a mock
/// provider.
///
/// # Panics
///
/// Never in practice; the URLs are literals.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    #[allow(clippy::unwrap_used)]
    let base_url = Url::parse("http://localhost:3000").unwrap();
    #[allow(clippy::unwrap_used)]
    let api_url = Url::parse("http://localhost:8000/graphql/").unwrap();

    StorefrontConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3000,
        base_url,
        saleor: SaleorConfig {
            api_url,
            channel: ChannelSlug::new("default-channel"),
            gateway: GatewayId::new("mirumee.payments.dummy"),
            language_code: "EN_US".to_string(),
            app_token: None,
        },
        checkout: CheckoutConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Attempt settings with the default timings and `deadline`.
#[must_use]
pub fn settings(deadline: Duration) -> AttemptSettings {
    let mut settings = test_config().attempt_settings(&CheckoutId::new(CHECKOUT_ID));
    settings.deadline = deadline;
    settings
}
