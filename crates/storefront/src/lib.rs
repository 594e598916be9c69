//! Guest Pay storefront library.
//!
//! Checkout coordination, the Saleor client and the HTTP surface, exposed as
//! a library so the CLI and the integration tests can drive them.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod config;
pub mod error;
pub mod routes;
pub mod saleor;
pub mod state;
