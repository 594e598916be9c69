//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::checkout::{AccountError, AttemptError, FormErrors};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// The guest user form failed validation.
    #[error("Validation failed: {0}")]
    Validation(FormErrors),

    /// Saleor refused to register the account.
    #[error("Registration rejected")]
    RegistrationRejected(Vec<AccountError>),

    /// Saleor API operation failed.
    #[error("Saleor error: {0}")]
    Upstream(String),

    /// The attempt did not settle in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Pay was pressed in a state that does not accept it.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<AttemptError> for AppError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::Validation(errors) => Self::Validation(errors),
            AttemptError::RegistrationRejected(errors) => Self::RegistrationRejected(errors),
            AttemptError::RegistrationFailed(reason) => Self::Upstream(reason),
            err @ AttemptError::TimedOut { .. } => Self::Timeout(err.to_string()),
            AttemptError::Checkout(err) => Self::Conflict(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a FormErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_errors: Option<&'a [AccountError]>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Upstream(_) | Self::Timeout(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RegistrationRejected(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Upstream(_) => "External service error".to_string(),
            Self::Timeout(_) => "Checkout is taking too long, please try again".to_string(),
            Self::Validation(_) => "Please correct the highlighted fields".to_string(),
            Self::RegistrationRejected(_) => "Could not create your account".to_string(),
            _ => self.to_string(),
        };

        let body = ErrorBody {
            error: &message,
            fields: match &self {
                Self::Validation(errors) => Some(errors),
                _ => None,
            },
            account_errors: match &self {
                Self::RegistrationRejected(errors) => Some(errors.as_slice()),
                _ => None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for checkout steps.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Pay requested", Some(&[("mode", "guest")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use guestpay_core::PaymentState;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::Validation(FormErrors::default())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::RegistrationRejected(vec![])),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Upstream("boom".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Timeout("slow".to_string())),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_timeout_maps_from_attempt_error() {
        let err = AppError::from(AttemptError::TimedOut {
            state: PaymentState::AwaitingRegistration,
            deadline: Duration::from_secs(30),
        });
        assert!(matches!(err, AppError::Timeout(_)));
    }
}
