//! String identifiers for type-safe entity references.
//!
//! Saleor identifies entities with opaque global IDs (base64 strings), and
//! channels and gateways with slugs. The `define_id!` macro creates newtype
//! wrappers so a checkout ID is never passed where an order ID is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `new()`, `as_str()`, `Display`, `AsRef<str>` and `From<&str>`/`From<String>`
///
/// # Example
///
/// ```rust
/// # use guestpay_core::define_id;
/// define_id!(CartId);
/// define_id!(VoucherId);
///
/// let cart = CartId::new("Q2FydDox");
/// assert_eq!(cart.as_str(), "Q2FydDox");
///
/// // These are different types, so this won't compile:
/// // let _: VoucherId = cart;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

define_id!(CheckoutId);
define_id!(OrderId);
define_id!(TransactionId);
define_id!(ChannelSlug);
define_id!(GatewayId);

/// Identifier of one checkout attempt (one press of "pay").
///
/// Used to correlate log records and Sentry breadcrumbs across the
/// registration and payment tasks of the same attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(Uuid);

impl AttemptId {
    /// Generate a fresh random attempt ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl ::core::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = CheckoutId::new("Q2hlY2tvdXQ6MQ==");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"Q2hlY2tvdXQ6MQ==\"");
        let back: CheckoutId = serde_json::from_str("\"Q2hlY2tvdXQ6MQ==\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_attempt_ids_are_unique() {
        assert_ne!(AttemptId::generate(), AttemptId::generate());
    }
}
