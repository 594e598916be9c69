//! Core types for Guest Pay.
//!
//! This module provides type-safe wrappers for checkout domain concepts.

pub mod checkout;
pub mod credential;
pub mod email;
pub mod id;
pub mod payment;
pub mod status;

pub use checkout::CheckoutSession;
pub use credential::Credentials;
pub use email::{Email, EmailError};
pub use id::*;
pub use payment::{PaymentEvent, PaymentState, PaymentTransitionError, PayMode};
pub use status::*;
