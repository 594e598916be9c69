//! Guest Pay Core - Shared checkout domain types.
//!
//! This crate provides the types shared by every Guest Pay component:
//! - `storefront` - Checkout coordination, Saleor client and HTTP surface
//! - `cli` - Command-line runner for a single checkout attempt
//!
//! # Architecture
//!
//! The core crate contains only types and pure state transitions - no I/O,
//! no HTTP clients, no timers. This keeps it lightweight and easy to test.
//!
//! # Modules
//!
//! - [`types`] - Emails, string IDs, operation statuses, the payment state
//!   machine, credentials and the checkout session

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
