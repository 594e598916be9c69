//! Saleor GraphQL API client.
//!
//! # Architecture
//!
//! - Hand-written GraphQL documents in [`queries`], posted with `reqwest`
//! - Saleor is the source of truth; nothing is cached or stored locally
//! - One [`SaleorSession`] per checkout attempt, so a sign-in only
//!   authenticates the calls of that attempt
//!
//! # Example
//!
//! ```rust,ignore
//! use guestpay_storefront::saleor::SaleorClient;
//!
//! let client = SaleorClient::new(&config.saleor);
//! let session = client.open_session(None);
//! let errors = session.update_checkout_email(&checkout_id, &email).await?;
//! ```

mod client;
pub mod queries;
pub mod types;

pub use client::{SaleorClient, SaleorSession};

use thiserror::Error;

/// Errors that can occur when talking to the Saleor API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("Saleor API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A mutation answered without the payload it promises.
    #[error("Missing {0} payload in response")]
    MissingPayload(&'static str),

    /// The mutation rejected its input.
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// A GraphQL error returned by the Saleor API.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GraphQLError {
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Source locations in the query.
    #[serde(default)]
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();

            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }

            if !e.path.is_empty() {
                let path_str = e
                    .path
                    .iter()
                    .map(|p| match p {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                parts.push(format!("path: {path_str}"));
            }

            if let Some(loc) = e.locations.first() {
                parts.push(format!("at line {}:{}", loc.line, loc.column));
            }

            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ApiError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Saleor API returned 502: bad gateway");
    }

    #[test]
    fn test_graphql_error_formatting() {
        let errors = vec![
            GraphQLError {
                message: "Couldn't resolve to a node".to_string(),
                locations: vec![],
                path: vec![],
            },
            GraphQLError {
                message: "Invalid token".to_string(),
                locations: vec![],
                path: vec![],
            },
        ];
        let err = ApiError::GraphQL(errors);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Couldn't resolve to a node; Invalid token"
        );
    }

    #[test]
    fn test_graphql_error_path_and_location() {
        let errors = vec![GraphQLError {
            message: String::new(),
            locations: vec![GraphQLErrorLocation { line: 3, column: 7 }],
            path: vec![
                serde_json::Value::String("checkoutComplete".to_string()),
                serde_json::Value::Number(0.into()),
            ],
        }];
        let err = ApiError::GraphQL(errors);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: path: checkoutComplete.0 at line 3:7"
        );
    }

    #[test]
    fn test_graphql_error_no_details() {
        let errors = vec![GraphQLError {
            message: String::new(),
            locations: vec![],
            path: vec![],
        }];
        let err = ApiError::GraphQL(errors);
        assert_eq!(err.to_string(), "GraphQL errors: [error 1]: (no details)");
    }

    #[test]
    fn test_graphql_error_deserializes_sparse() {
        let error: GraphQLError =
            serde_json::from_value(serde_json::json!({"message": "boom"})).unwrap();
        assert_eq!(error.message, "boom");
        assert!(error.locations.is_empty());
    }
}
