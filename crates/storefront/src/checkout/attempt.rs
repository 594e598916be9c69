//! One checkout attempt, start to finish.
//!
//! Wires a fresh [`AttemptContext`] to a [`RegistrationCoordinator`] task and
//! a [`PaymentOrchestrator`], then waits for the payment report, a terminal
//! registration failure or the deadline, whichever comes first.

use std::sync::Arc;
use std::time::Duration;

use guestpay_core::{CheckoutSession, PaymentState};
use secrecy::SecretString;
use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, info, info_span, warn};
use url::Url;

use super::CheckoutError;
use super::alerts::{AlertMessage, CollectedAlerts};
use super::api::{AccountError, CheckoutApi};
use super::context::AttemptContext;
use super::payment::{PaymentOrchestrator, PaymentReport, PaymentSettings};
use super::registration::{FormErrors, RegistrationCoordinator, RegistrationOutcome};

/// What the shopper submitted with the pay action.
#[derive(Debug, Clone)]
pub struct AttemptRequest {
    pub checkout: CheckoutSession,
    pub email: String,
    pub password: SecretString,
    pub create_account: bool,
}

/// Settings applied to every attempt.
#[derive(Debug, Clone)]
pub struct AttemptSettings {
    pub payment: PaymentSettings,
    /// Account confirmation link target.
    pub redirect_url: Url,
    /// Upper bound on the whole attempt.
    pub deadline: Duration,
}

/// A settled attempt.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptOutcome {
    #[serde(flatten)]
    pub report: PaymentReport,
    /// Messages that were shown to the shopper.
    pub alerts: Vec<AlertMessage>,
}

/// Why an attempt did not reach a payment report.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("guest user form is invalid: {0}")]
    Validation(FormErrors),

    #[error("account registration rejected ({} errors)", .0.len())]
    RegistrationRejected(Vec<AccountError>),

    #[error("account registration failed: {0}")]
    RegistrationFailed(String),

    #[error("checkout attempt did not settle within {deadline:?} (state: {state})")]
    TimedOut {
        state: PaymentState,
        deadline: Duration,
    },

    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

/// The error a registration outcome ends the attempt with, if any.
fn blocking_error(outcome: RegistrationOutcome) -> Option<AttemptError> {
    match outcome {
        RegistrationOutcome::Registered | RegistrationOutcome::AlreadyExists => None,
        RegistrationOutcome::Invalid(errors) => Some(AttemptError::Validation(errors)),
        RegistrationOutcome::Rejected(errors) => Some(AttemptError::RegistrationRejected(errors)),
        RegistrationOutcome::Failed(reason) => Some(AttemptError::RegistrationFailed(reason)),
        RegistrationOutcome::Abandoned => Some(AttemptError::RegistrationFailed(
            "registration abandoned".to_owned(),
        )),
    }
}

/// Run one checkout attempt.
///
/// Anonymous shoppers have their form validated and, if the email differs
/// from the checkout's, pushed to the checkout before paying.
///
/// # Errors
///
/// Returns [`AttemptError`] if the form is invalid, registration ends
/// without unblocking payment, or the attempt outlives the deadline.
pub async fn run_attempt(
    api: Arc<dyn CheckoutApi>,
    request: AttemptRequest,
    settings: &AttemptSettings,
) -> Result<AttemptOutcome, AttemptError> {
    let context = AttemptContext::new();
    let span = info_span!(
        "checkout_attempt",
        attempt = %context.id(),
        checkout_id = %request.checkout.id,
    );
    run_in_context(api, request, settings, context)
        .instrument(span)
        .await
}

async fn run_in_context(
    api: Arc<dyn CheckoutApi>,
    request: AttemptRequest,
    settings: &AttemptSettings,
    context: AttemptContext,
) -> Result<AttemptOutcome, AttemptError> {
    let checkout = request.checkout;
    let alerts = Arc::new(CollectedAlerts::default());

    let mut coordinator = RegistrationCoordinator::new(
        Arc::clone(&api),
        context.clone(),
        checkout.clone(),
        settings.redirect_url.clone(),
        settings.payment.timings,
        Some(request.email.as_str()),
    );
    coordinator.set_password(request.password);
    coordinator.set_create_account(request.create_account);

    let mut registration = None;
    if !checkout.authenticated {
        coordinator.validate().map_err(AttemptError::Validation)?;

        let email_changed = checkout
            .email
            .as_ref()
            .is_none_or(|current| current.as_str() != coordinator.form().email);
        if email_changed {
            let email = coordinator.form().email.clone();
            coordinator.change_email(&email).await;
        }

        if request.create_account {
            registration = Some(tokio::spawn(coordinator.run().in_current_span()));
        }
    }
    let registration_abort = registration.as_ref().map(tokio::task::JoinHandle::abort_handle);

    let mut orchestrator = PaymentOrchestrator::new(
        api,
        context.clone(),
        checkout,
        settings.payment.clone(),
        alerts.clone(),
    );

    let settled = tokio::time::timeout(settings.deadline, async {
        let registration_blocked = async move {
            let Some(handle) = registration else {
                return std::future::pending().await;
            };
            match handle.await {
                Ok(outcome) => match blocking_error(outcome) {
                    Some(error) => error,
                    None => std::future::pending().await,
                },
                Err(e) => AttemptError::RegistrationFailed(e.to_string()),
            }
        };

        tokio::select! {
            report = orchestrator.run() => report.map_err(AttemptError::from),
            error = registration_blocked => Err(error),
        }
    })
    .await;

    if let Some(abort) = registration_abort {
        abort.abort();
    }
    context.relay().clear();

    match settled {
        Ok(Ok(report)) => {
            info!(
                state = %report.state,
                account_link = ?report.account_link,
                "checkout attempt settled"
            );
            Ok(AttemptOutcome {
                report,
                alerts: alerts.take(),
            })
        }
        Ok(Err(e)) => {
            warn!(error = %e, state = %orchestrator.state(), "checkout attempt failed");
            Err(e)
        }
        Err(_) => {
            warn!(
                state = %orchestrator.state(),
                deadline_ms = settings.deadline.as_millis(),
                "checkout attempt timed out"
            );
            Err(AttemptError::TimedOut {
                state: orchestrator.state(),
                deadline: settings.deadline,
            })
        }
    }
}
