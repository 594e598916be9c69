//! CLI command implementations.

pub mod pay;
