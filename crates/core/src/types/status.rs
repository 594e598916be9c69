//! Update-state keys and the lifecycle status of named operations.
//!
//! Every asynchronous checkout operation is tracked under an [`UpdateKey`]
//! with an [`OperationStatus`]. Within one attempt a key only moves forward:
//!
//! ```text
//! idle ──► loading ──► success
//!   │                 ▲
//!   └────────┬────────┤
//!            ▼        │
//!          error ◄────┘ (from loading)
//! ```
//!
//! Re-applying the current status is allowed (idempotent). Leaving a terminal
//! status requires an explicit restart of the operation.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a named asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl OperationStatus {
    /// Returns `true` for `Success` and `Error`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Loading => 1,
            Self::Success | Self::Error => 2,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    ///
    /// Same-status updates are accepted. A terminal status never moves to a
    /// different status.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self as u8 == next as u8 {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Named checkout operations whose lifecycle is broadcast on the update bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateKey {
    CheckoutShippingUpdate,
    CheckoutCustomerAttach,
    CheckoutBillingUpdate,
    CheckoutAddPromoCode,
    CheckoutDeliveryMethodUpdate,
    CheckoutLinesUpdate,
    CheckoutEmailUpdate,
    CheckoutLinesDelete,
    CheckoutFetch,
    PaymentGatewaysInitialize,
    UserRegister,
    ResetPassword,
    SignIn,
}

impl UpdateKey {
    /// Every key, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::CheckoutShippingUpdate,
        Self::CheckoutCustomerAttach,
        Self::CheckoutBillingUpdate,
        Self::CheckoutAddPromoCode,
        Self::CheckoutDeliveryMethodUpdate,
        Self::CheckoutLinesUpdate,
        Self::CheckoutEmailUpdate,
        Self::CheckoutLinesDelete,
        Self::CheckoutFetch,
        Self::PaymentGatewaysInitialize,
        Self::UserRegister,
        Self::ResetPassword,
        Self::SignIn,
    ];

    /// The wire name of the key (`userRegister`, `checkoutEmailUpdate`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckoutShippingUpdate => "checkoutShippingUpdate",
            Self::CheckoutCustomerAttach => "checkoutCustomerAttach",
            Self::CheckoutBillingUpdate => "checkoutBillingUpdate",
            Self::CheckoutAddPromoCode => "checkoutAddPromoCode",
            Self::CheckoutDeliveryMethodUpdate => "checkoutDeliveryMethodUpdate",
            Self::CheckoutLinesUpdate => "checkoutLinesUpdate",
            Self::CheckoutEmailUpdate => "checkoutEmailUpdate",
            Self::CheckoutLinesDelete => "checkoutLinesDelete",
            Self::CheckoutFetch => "checkoutFetch",
            Self::PaymentGatewaysInitialize => "paymentGatewaysInitialize",
            Self::UserRegister => "userRegister",
            Self::ResetPassword => "resetPassword",
            Self::SignIn => "signIn",
        }
    }
}

impl std::fmt::Display for UpdateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UpdateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown update key: {s}"))
    }
}

/// A status update that would break the monotonic lifecycle of a key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal status transition for {key}: {from} -> {to}")]
pub struct StatusTransitionError {
    pub key: UpdateKey,
    pub from: OperationStatus,
    pub to: OperationStatus,
}
