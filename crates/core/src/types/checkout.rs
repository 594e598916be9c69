//! The checkout being paid for.

use serde::{Deserialize, Serialize};

use crate::{ChannelSlug, CheckoutId, Email};

/// Read-only view of the in-progress checkout.
///
/// Created by the caller from the storefront session. The coordination layer
/// never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Saleor checkout ID.
    pub id: CheckoutId,
    /// Email already stored on the checkout, if any.
    pub email: Option<Email>,
    /// Sales channel the checkout belongs to.
    pub channel: ChannelSlug,
    /// Whether the shopper is signed in.
    pub authenticated: bool,
}

impl CheckoutSession {
    /// Session for an anonymous shopper.
    #[must_use]
    pub const fn guest(id: CheckoutId, channel: ChannelSlug, email: Option<Email>) -> Self {
        Self {
            id,
            email,
            channel,
            authenticated: false,
        }
    }

    /// Same session, marked as signed in.
    #[must_use]
    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }
}
