//! Pay action driver.
//!
//! Runs the [`PaymentState`] machine for one attempt: optionally waits for
//! the registration side, links the new account to the checkout, then
//! initializes the transaction and completes the checkout.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use guestpay_core::{
    AttemptId, CheckoutId, CheckoutSession, Credentials, GatewayId, OperationStatus, OrderId,
    PayMode, PaymentState, UpdateKey,
};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use super::alerts::{AlertMessage, AlertSink};
use super::api::{CheckoutApi, CheckoutUserError, PaymentGatewayInput};
use super::bus::StatusSubscription;
use super::context::AttemptContext;
use super::{CheckoutError, CheckoutTimings};
use crate::error::add_breadcrumb;

/// Payment settings shared by every attempt.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    /// Gateway asked to simulate the charge.
    pub gateway: GatewayId,
    /// Language code sent with the customer attach.
    pub language_code: String,
    pub timings: CheckoutTimings,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            gateway: GatewayId::new("mirumee.payments.dummy"),
            language_code: "EN_US".to_owned(),
            timings: CheckoutTimings::default(),
        }
    }
}

/// How the new account ended up linked to the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountLink {
    /// No account was requested, or the shopper was already signed in.
    NotRequested,
    /// Signed in and attached to the checkout.
    Linked,
    /// Sign-in with the new credentials failed.
    SignInFailed,
    /// Signed in, but the checkout rejected the customer attach.
    AttachFailed,
    /// No credentials arrived in time; the order is placed as a guest.
    Degraded,
}

/// Result of the transaction and completion step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// The checkout became an order.
    Completed { order_id: OrderId },
    /// The backend refused the payment or the completion; the shopper was
    /// shown these messages.
    Rejected { alerts: Vec<AlertMessage> },
    /// A request failed before the backend could answer.
    Failed { reason: String },
}

impl PaymentOutcome {
    /// Returns `true` if an order was placed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Summary of a finished payment attempt.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReport {
    pub attempt: AttemptId,
    pub checkout_id: CheckoutId,
    pub state: PaymentState,
    pub account_link: AccountLink,
    pub outcome: PaymentOutcome,
    pub finished_at: DateTime<Utc>,
}

/// Drives the pay action of one checkout attempt.
pub struct PaymentOrchestrator {
    api: Arc<dyn CheckoutApi>,
    context: AttemptContext,
    checkout: CheckoutSession,
    settings: PaymentSettings,
    alerts: Arc<dyn AlertSink>,
    state: PaymentState,
    account_link: AccountLink,
    registration: Option<StatusSubscription>,
}

impl PaymentOrchestrator {
    #[must_use]
    pub fn new(
        api: Arc<dyn CheckoutApi>,
        context: AttemptContext,
        checkout: CheckoutSession,
        settings: PaymentSettings,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            api,
            context,
            checkout,
            settings,
            alerts,
            state: PaymentState::Idle,
            account_link: AccountLink::NotRequested,
            registration: None,
        }
    }

    /// Current state of the attempt.
    #[must_use]
    pub const fn state(&self) -> PaymentState {
        self.state
    }

    /// How the shopper should be treated, from the session and the
    /// registration opt-in.
    #[must_use]
    pub fn mode(&self) -> PayMode {
        if self.checkout.authenticated {
            PayMode::Authenticated
        } else if self.context.intent().create_account {
            PayMode::CreateAccount
        } else {
            PayMode::Guest
        }
    }

    /// Handle the pay action.
    ///
    /// Shoppers who opted into an account move to `awaiting_registration`
    /// and `Ok(None)` is returned; feed the `userRegister` statuses to
    /// [`Self::on_registration_status`] or use [`Self::run`]. Everyone else
    /// pays right away and gets the report.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Transition`] if pay was already pressed.
    #[instrument(skip(self), fields(attempt = %self.context.id(), checkout_id = %self.checkout.id))]
    pub async fn pay(&mut self) -> Result<Option<PaymentReport>, CheckoutError> {
        let mode = self.mode();
        let next = self.state.pay(mode)?;
        info!(?mode, "pay requested");
        add_breadcrumb("checkout", "Pay requested", Some(&[("mode", mode_label(mode))]));

        if next == PaymentState::AwaitingRegistration {
            // Subscribe before raising the intent so the signal cannot be missed.
            self.registration = Some(self.context.bus().subscribe(UpdateKey::UserRegister));
            self.state = next;
            self.context.update_intent(|intent| {
                intent.should_register = true;
                intent.create_account = true;
            });
            self.context.request_validation();

            let current = self.context.bus().status(UpdateKey::UserRegister);
            if current == OperationStatus::Success {
                return self.on_registration_status(current).await;
            }
            return Ok(None);
        }

        self.context.request_validation();
        self.state = next;
        self.process_payment().await.map(Some)
    }

    /// Handle a `userRegister` status write.
    ///
    /// Only the first `success` seen while awaiting registration proceeds;
    /// other statuses and repeated signals return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Transition`] if the state machine rejects a
    /// step after the signal was accepted.
    pub async fn on_registration_status(
        &mut self,
        status: OperationStatus,
    ) -> Result<Option<PaymentReport>, CheckoutError> {
        if status != OperationStatus::Success {
            debug!(%status, "waiting for registration success");
            return Ok(None);
        }

        match self.state.registration_succeeded() {
            Ok(next) => self.state = next,
            Err(e) => {
                debug!(error = %e, "ignoring registration signal");
                return Ok(None);
            }
        }
        self.registration = None;

        self.account_link = self.link_account().await;
        self.state = self.state.account_link_settled()?;
        self.process_payment().await.map(Some)
    }

    /// Press pay and follow the registration signal until the attempt is
    /// done.
    ///
    /// Never returns if registration neither succeeds nor fails terminally;
    /// callers impose a deadline.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::RegistrationSignalLost`] if the bus goes
    /// away while waiting, or a transition error if pay was already pressed.
    pub async fn run(&mut self) -> Result<PaymentReport, CheckoutError> {
        if let Some(report) = self.pay().await? {
            return Ok(report);
        }

        loop {
            let status = self
                .registration
                .as_mut()
                .ok_or(CheckoutError::RegistrationSignalLost)?
                .next()
                .await
                .ok_or(CheckoutError::RegistrationSignalLost)?;

            if let Some(report) = self.on_registration_status(status).await? {
                return Ok(report);
            }
        }
    }

    /// Sign in with the registered credentials and attach the customer.
    ///
    /// Failures here never stop the payment.
    #[instrument(skip(self), fields(attempt = %self.context.id(), checkout_id = %self.checkout.id))]
    async fn link_account(&self) -> AccountLink {
        let budget = self.settings.timings.credential_wait();
        let Some(credentials) = self
            .context
            .relay()
            .take_within(budget)
            .await
            .filter(Credentials::is_complete)
        else {
            warn!(
                budget_ms = budget.as_millis(),
                "no credentials from registration, paying without linking the account"
            );
            return AccountLink::Degraded;
        };

        let bus = self.context.bus();
        bus.restart(UpdateKey::SignIn);
        if let Err(e) = self.api.sign_in(&credentials).await {
            warn!(error = %e, email = %credentials.email(), "sign-in with new account failed");
            self.publish(UpdateKey::SignIn, OperationStatus::Error);
            return AccountLink::SignInFailed;
        }
        self.publish(UpdateKey::SignIn, OperationStatus::Success);
        drop(credentials);

        tokio::time::sleep(self.settings.timings.token_propagation_delay).await;

        bus.restart(UpdateKey::CheckoutCustomerAttach);
        match self
            .api
            .attach_customer(&self.checkout.id, &self.settings.language_code)
            .await
        {
            Ok(errors) if errors.is_empty() => {
                info!("customer attached to checkout");
                self.publish(UpdateKey::CheckoutCustomerAttach, OperationStatus::Success);
                AccountLink::Linked
            }
            Ok(errors) => {
                warn!(?errors, "customer attach rejected");
                self.publish(UpdateKey::CheckoutCustomerAttach, OperationStatus::Error);
                AccountLink::AttachFailed
            }
            Err(e) => {
                warn!(error = %e, "customer attach failed");
                self.publish(UpdateKey::CheckoutCustomerAttach, OperationStatus::Error);
                AccountLink::AttachFailed
            }
        }
    }

    #[instrument(skip(self), fields(attempt = %self.context.id(), checkout_id = %self.checkout.id))]
    async fn process_payment(&mut self) -> Result<PaymentReport, CheckoutError> {
        let gateway = PaymentGatewayInput::charge_success(self.settings.gateway.clone());
        add_breadcrumb(
            "checkout",
            "Transaction initialize",
            Some(&[("gateway", self.settings.gateway.as_str())]),
        );

        let outcome = match self
            .api
            .initialize_transaction(&self.checkout.id, &gateway)
            .await
        {
            Err(e) => {
                error!(error = %e, "transaction initialize failed");
                PaymentOutcome::Failed {
                    reason: e.to_string(),
                }
            }
            Ok(result) => {
                let transaction_alerts: Vec<_> =
                    result.errors.iter().map(CheckoutUserError::to_alert).collect();
                if transaction_alerts.is_empty() {
                    debug!(transaction_id = ?result.transaction_id, "transaction initialized");
                } else {
                    warn!(errors = transaction_alerts.len(), "transaction initialize returned errors");
                    self.alerts.show_errors(&transaction_alerts);
                }

                // Completion runs once the transaction call answered, errors or not.
                match self.complete_checkout().await {
                    PaymentOutcome::Rejected { alerts } => PaymentOutcome::Rejected {
                        alerts: transaction_alerts.into_iter().chain(alerts).collect(),
                    },
                    outcome => outcome,
                }
            }
        };

        self.state = self.state.payment_finished()?;
        self.context.relay().clear();

        match &outcome {
            PaymentOutcome::Completed { order_id } => info!(%order_id, "checkout completed"),
            PaymentOutcome::Rejected { alerts } => {
                warn!(alerts = alerts.len(), "payment rejected");
            }
            PaymentOutcome::Failed { reason } => warn!(%reason, "payment failed"),
        }

        Ok(PaymentReport {
            attempt: self.context.id(),
            checkout_id: self.checkout.id.clone(),
            state: self.state,
            account_link: self.account_link,
            outcome,
            finished_at: Utc::now(),
        })
    }

    async fn complete_checkout(&self) -> PaymentOutcome {
        match self.api.complete_checkout(&self.checkout.id).await {
            Err(e) => {
                error!(error = %e, "checkout complete failed");
                PaymentOutcome::Failed {
                    reason: e.to_string(),
                }
            }
            Ok(completion) if !completion.api_errors.is_empty() => {
                self.alerts.show_errors(&completion.api_errors);
                PaymentOutcome::Rejected {
                    alerts: completion.api_errors,
                }
            }
            Ok(completion) => match completion.order_id {
                Some(order_id) => PaymentOutcome::Completed { order_id },
                None => PaymentOutcome::Failed {
                    reason: "checkout completed without an order".to_owned(),
                },
            },
        }
    }

    fn publish(&self, key: UpdateKey, status: OperationStatus) {
        if let Err(e) = self.context.bus().set_status(key, status) {
            warn!(error = %e, "ignoring out-of-order status update");
        }
    }
}

const fn mode_label(mode: PayMode) -> &'static str {
    match mode {
        PayMode::Authenticated => "authenticated",
        PayMode::Guest => "guest",
        PayMode::CreateAccount => "create_account",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::checkout::alerts::CollectedAlerts;
    use crate::checkout::api::{
        AccountError, AuthToken, CheckoutCompletion, CheckoutUserError, RegisterAccountInput,
        TransactionResult,
    };
    use crate::saleor::ApiError;
    use async_trait::async_trait;
    use guestpay_core::{ChannelSlug, Email};
    use std::sync::Mutex;

    /// Minimal backend: every call succeeds and is recorded.
    #[derive(Default)]
    struct AcceptAll {
        calls: Mutex<Vec<&'static str>>,
    }

    impl AcceptAll {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl CheckoutApi for AcceptAll {
        async fn register_account(
            &self,
            _input: &RegisterAccountInput,
        ) -> Result<Vec<AccountError>, ApiError> {
            self.record("register");
            Ok(vec![])
        }

        async fn sign_in(&self, _credentials: &Credentials) -> Result<AuthToken, ApiError> {
            self.record("sign_in");
            Ok(AuthToken {
                token: "token".into(),
                refresh_token: None,
            })
        }

        async fn attach_customer(
            &self,
            _checkout_id: &CheckoutId,
            _language_code: &str,
        ) -> Result<Vec<CheckoutUserError>, ApiError> {
            self.record("attach");
            Ok(vec![])
        }

        async fn initialize_transaction(
            &self,
            _checkout_id: &CheckoutId,
            _gateway: &PaymentGatewayInput,
        ) -> Result<TransactionResult, ApiError> {
            self.record("transaction");
            Ok(TransactionResult::default())
        }

        async fn complete_checkout(
            &self,
            _checkout_id: &CheckoutId,
        ) -> Result<CheckoutCompletion, ApiError> {
            self.record("complete");
            Ok(CheckoutCompletion {
                order_id: Some(OrderId::new("order-1")),
                api_errors: vec![],
            })
        }

        async fn update_checkout_email(
            &self,
            _checkout_id: &CheckoutId,
            _email: &Email,
        ) -> Result<Vec<CheckoutUserError>, ApiError> {
            self.record("email");
            Ok(vec![])
        }
    }

    fn orchestrator(
        api: &Arc<AcceptAll>,
        context: &AttemptContext,
        authenticated: bool,
    ) -> PaymentOrchestrator {
        let mut checkout =
            CheckoutSession::guest(CheckoutId::new("checkout-1"), ChannelSlug::new("default"), None);
        checkout.authenticated = authenticated;
        PaymentOrchestrator::new(
            Arc::clone(api) as Arc<dyn CheckoutApi>,
            context.clone(),
            checkout,
            PaymentSettings::default(),
            Arc::new(CollectedAlerts::default()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticated_pays_immediately() {
        let api = Arc::new(AcceptAll::default());
        let context = AttemptContext::new();
        let mut payment = orchestrator(&api, &context, true);

        let report = payment.pay().await.unwrap().unwrap();

        assert_eq!(report.state, PaymentState::Done);
        assert_eq!(report.account_link, AccountLink::NotRequested);
        assert!(report.outcome.is_completed());
        assert_eq!(api.calls(), vec!["transaction", "complete"]);
        assert!(!context.intent().should_register);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opt_in_raises_intent_and_waits() {
        let api = Arc::new(AcceptAll::default());
        let context = AttemptContext::new();
        context.update_intent(|intent| intent.create_account = true);
        let mut payment = orchestrator(&api, &context, false);
        let validation = context.subscribe_validation();

        assert!(payment.pay().await.unwrap().is_none());

        assert_eq!(payment.state(), PaymentState::AwaitingRegistration);
        assert!(context.intent().should_register);
        assert!(validation.has_changed().unwrap());
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_pay_is_rejected() {
        let api = Arc::new(AcceptAll::default());
        let context = AttemptContext::new();
        let mut payment = orchestrator(&api, &context, true);
        payment.pay().await.unwrap();

        assert!(matches!(
            payment.pay().await,
            Err(CheckoutError::Transition(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signals_outside_awaiting_are_ignored() {
        let api = Arc::new(AcceptAll::default());
        let context = AttemptContext::new();
        let mut payment = orchestrator(&api, &context, false);

        let report = payment
            .on_registration_status(OperationStatus::Success)
            .await
            .unwrap();
        assert!(report.is_none());
        assert_eq!(payment.state(), PaymentState::Idle);
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_with_relayed_credentials() {
        let api = Arc::new(AcceptAll::default());
        let context = AttemptContext::new();
        context.update_intent(|intent| intent.create_account = true);
        let mut payment = orchestrator(&api, &context, false);
        payment.pay().await.unwrap();

        context.relay().set(Credentials::new(
            Email::parse("new@x.com").unwrap(),
            "longenough".into(),
        ));
        let report = payment
            .on_registration_status(OperationStatus::Success)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.account_link, AccountLink::Linked);
        assert_eq!(api.calls(), vec!["sign_in", "attach", "transaction", "complete"]);
        assert!(context.relay().is_empty());
        assert_eq!(
            context.bus().status(UpdateKey::CheckoutCustomerAttach),
            OperationStatus::Success
        );

        let again = payment
            .on_registration_status(OperationStatus::Success)
            .await
            .unwrap();
        assert!(again.is_none());
        assert_eq!(api.calls().len(), 4);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = PaymentOutcome::Completed {
            order_id: OrderId::new("order-1"),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"status": "completed", "order_id": "order-1"})
        );
    }
}
