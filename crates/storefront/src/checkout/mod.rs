//! Guest checkout coordination.
//!
//! A single "pay" action may need to register an account, sign in with the
//! new credentials, attach the customer to the checkout and then pay. The
//! registration form and the payment button are independent components that
//! never call each other; they meet only through the [`AttemptContext`]:
//!
//! ```text
//!  PaymentOrchestrator                         RegistrationCoordinator
//!  ───────────────────                         ───────────────────────
//!  pay() ── intent.should_register = true ───► tick(): validate + submit
//!                                              registerAccount(...)
//!                                              relay.set(credentials)
//!        ◄── bus[userRegister] = success ───── (after signal delay)
//!  relay.take_within(budget)
//!  signIn → attachCustomer → transactionInitialize → checkoutComplete
//! ```
//!
//! # Modules
//!
//! - [`bus`] - Per-key operation status register with subscriptions
//! - [`relay`] - Single-slot credential handoff
//! - [`context`] - Per-attempt bundle of bus, relay and registration intent
//! - [`registration`] - Guest user form and registration lifecycle
//! - [`payment`] - Pay action state machine driver
//! - [`attempt`] - Runs both sides of one attempt to a settled result
//! - [`api`] - Remote operation contracts
//! - [`alerts`] - Shopper-facing error surface
//!
//! # Constraints
//!
//! One [`AttemptContext`] serves exactly one checkout attempt. Create a fresh
//! context for every press of "pay"; contexts are never shared between
//! shoppers.

pub mod alerts;
pub mod api;
pub mod attempt;
pub mod bus;
pub mod context;
pub mod payment;
pub mod registration;
pub mod relay;

use std::time::Duration;

use guestpay_core::PaymentTransitionError;
use thiserror::Error;

pub use alerts::{AlertMessage, AlertSink, CollectedAlerts, LogAlerts};
pub use api::{
    AccountError, AccountErrorCode, AuthToken, CheckoutApi, CheckoutApiProvider,
    CheckoutCompletion, CheckoutUserError, PaymentGatewayInput, RegisterAccountInput,
    TransactionEvent, TransactionResult,
};
pub use attempt::{AttemptError, AttemptOutcome, AttemptRequest, AttemptSettings, run_attempt};
pub use bus::{StatusSubscription, UpdateStateBus};
pub use context::{AttemptContext, RegistrationIntent};
pub use payment::{AccountLink, PaymentOrchestrator, PaymentOutcome, PaymentReport, PaymentSettings};
pub use registration::{FormErrors, GuestUserForm, RegistrationCoordinator, RegistrationOutcome};
pub use relay::CredentialRelay;

/// Fixed delays and budgets used to sequence the two sides of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutTimings {
    /// Pause between a terminal registration outcome and the
    /// `userRegister = success` signal.
    pub signal_delay: Duration,
    /// Pause between sign-in and customer attach so the new token is in use.
    pub token_propagation_delay: Duration,
    /// Number of relay checks the payment side is willing to wait for.
    pub credential_poll_attempts: u32,
    /// Interval between relay checks.
    pub credential_poll_interval: Duration,
}

impl CheckoutTimings {
    /// Total time the payment side waits for credentials after the
    /// registration signal, or `None` when the product overflows.
    #[must_use]
    pub fn checked_credential_wait(&self) -> Option<Duration> {
        self.credential_poll_interval
            .checked_mul(self.credential_poll_attempts)
    }

    /// Like [`Self::checked_credential_wait`], saturating at `Duration::MAX`.
    #[must_use]
    pub fn credential_wait(&self) -> Duration {
        self.checked_credential_wait().unwrap_or(Duration::MAX)
    }
}

impl Default for CheckoutTimings {
    fn default() -> Self {
        Self {
            signal_delay: Duration::from_millis(100),
            token_propagation_delay: Duration::from_millis(300),
            credential_poll_attempts: 10,
            credential_poll_interval: Duration::from_millis(100),
        }
    }
}

/// Errors raised by the coordination layer itself.
///
/// Remote failures never surface here; they are logged, reported through
/// alerts or reflected in bus statuses.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The pay action or a signal arrived in a state that does not accept it.
    #[error("invalid payment transition: {0}")]
    Transition(#[from] PaymentTransitionError),

    /// The registration status subscription ended before a success signal.
    #[error("registration status subscription closed")]
    RegistrationSignalLost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_credential_wait_is_one_second() {
        assert_eq!(
            CheckoutTimings::default().credential_wait(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_credential_wait_saturates_on_overflow() {
        let timings = CheckoutTimings {
            credential_poll_attempts: u32::MAX,
            credential_poll_interval: Duration::from_millis(u64::MAX),
            ..CheckoutTimings::default()
        };

        assert_eq!(timings.checked_credential_wait(), None);
        assert_eq!(timings.credential_wait(), Duration::MAX);
    }
}
