//! Payment attempt state machine.
//!
//! ```text
//!            pay(CreateAccount)                registration succeeded
//!   Idle ─────────────────────► AwaitingRegistration ──────────────► Ready
//!    │                                                                 │
//!    │ pay(Authenticated | Guest)                       account linked │
//!    └──────────────────────────────► InProgress ◄─────────────────────┘
//!                                         │
//!                                         │ payment finished
//!                                         ▼
//!                                        Done
//! ```
//!
//! Transitions are pure; the orchestrator performs the side effects that go
//! with each state.

use serde::{Deserialize, Serialize};

/// State of one payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    Idle,
    AwaitingRegistration,
    Ready,
    InProgress,
    Done,
}

/// How the pay action should treat the current shopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayMode {
    /// The shopper is already signed in.
    Authenticated,
    /// Anonymous shopper who did not opt into an account.
    Guest,
    /// Anonymous shopper who opted into an account at checkout.
    CreateAccount,
}

/// Inputs that drive the payment state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEvent {
    Pay(PayMode),
    RegistrationSucceeded,
    AccountLinkSettled,
    PaymentFinished,
}

/// An event that is not accepted in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event {event:?} is not valid in state {from:?}")]
pub struct PaymentTransitionError {
    pub from: PaymentState,
    pub event: PaymentEvent,
}

impl PaymentState {
    /// Apply an event, returning the next state.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentTransitionError`] if the event is not accepted in the
    /// current state. The state is left untouched by the caller in that case.
    pub const fn apply(self, event: PaymentEvent) -> Result<Self, PaymentTransitionError> {
        let next = match (self, event) {
            (Self::Idle, PaymentEvent::Pay(PayMode::CreateAccount)) => Self::AwaitingRegistration,
            (Self::Idle, PaymentEvent::Pay(PayMode::Authenticated | PayMode::Guest))
            | (Self::Ready, PaymentEvent::AccountLinkSettled) => Self::InProgress,
            (Self::AwaitingRegistration, PaymentEvent::RegistrationSucceeded) => Self::Ready,
            (Self::InProgress, PaymentEvent::PaymentFinished) => Self::Done,
            (from, event) => return Err(PaymentTransitionError { from, event }),
        };
        Ok(next)
    }

    /// Handle the pay action.
    ///
    /// # Errors
    ///
    /// Fails unless the attempt is still idle.
    pub const fn pay(self, mode: PayMode) -> Result<Self, PaymentTransitionError> {
        self.apply(PaymentEvent::Pay(mode))
    }

    /// Handle a `userRegister == success` signal.
    ///
    /// # Errors
    ///
    /// Fails outside `AwaitingRegistration`, which is how repeated success
    /// signals are ignored.
    pub const fn registration_succeeded(self) -> Result<Self, PaymentTransitionError> {
        self.apply(PaymentEvent::RegistrationSucceeded)
    }

    /// The sign-in/attach step finished (linked, failed or degraded).
    ///
    /// # Errors
    ///
    /// Fails outside `Ready`.
    pub const fn account_link_settled(self) -> Result<Self, PaymentTransitionError> {
        self.apply(PaymentEvent::AccountLinkSettled)
    }

    /// Transaction initialization and completion finished, with any outcome.
    ///
    /// # Errors
    ///
    /// Fails outside `InProgress`.
    pub const fn payment_finished(self) -> Result<Self, PaymentTransitionError> {
        self.apply(PaymentEvent::PaymentFinished)
    }

    /// Returns `true` once the attempt is over.
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingRegistration => write!(f, "awaiting_registration"),
            Self::Ready => write!(f, "ready"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_path() {
        let state = PaymentState::Idle.pay(PayMode::CreateAccount).unwrap();
        assert_eq!(state, PaymentState::AwaitingRegistration);
        let state = state.registration_succeeded().unwrap();
        assert_eq!(state, PaymentState::Ready);
        let state = state.account_link_settled().unwrap();
        assert_eq!(state, PaymentState::InProgress);
        let state = state.payment_finished().unwrap();
        assert!(state.is_done());
    }

    #[test]
    fn test_authenticated_skips_registration() {
        assert_eq!(
            PaymentState::Idle.pay(PayMode::Authenticated).unwrap(),
            PaymentState::InProgress
        );
        assert_eq!(
            PaymentState::Idle.pay(PayMode::Guest).unwrap(),
            PaymentState::InProgress
        );
    }

    #[test]
    fn test_repeated_registration_signal_rejected() {
        for state in [
            PaymentState::Idle,
            PaymentState::Ready,
            PaymentState::InProgress,
            PaymentState::Done,
        ] {
            let err = state.registration_succeeded().unwrap_err();
            assert_eq!(err.from, state);
            assert_eq!(err.event, PaymentEvent::RegistrationSucceeded);
        }
    }

    #[test]
    fn test_second_pay_rejected() {
        let state = PaymentState::Idle.pay(PayMode::Guest).unwrap();
        assert!(state.pay(PayMode::Guest).is_err());
        assert!(PaymentState::Done.pay(PayMode::Authenticated).is_err());
    }

    #[test]
    fn test_display_matches_serde() {
        let json = serde_json::to_string(&PaymentState::AwaitingRegistration).unwrap();
        assert_eq!(json, format!("\"{}\"", PaymentState::AwaitingRegistration));
    }
}
