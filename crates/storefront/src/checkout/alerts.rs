//! Shopper-facing error surface.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A message shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub message: String,
}

impl AlertMessage {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Receives errors that must be shown to the shopper.
pub trait AlertSink: Send + Sync {
    fn show_errors(&self, errors: &[AlertMessage]);
}

/// Alert sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlerts;

impl AlertSink for LogAlerts {
    fn show_errors(&self, errors: &[AlertMessage]) {
        for error in errors {
            warn!(message = %error.message, "checkout alert");
        }
    }
}

/// Alert sink that keeps messages for the caller to return.
#[derive(Debug, Default)]
pub struct CollectedAlerts {
    messages: Mutex<Vec<AlertMessage>>,
}

impl CollectedAlerts {
    /// Remove and return the collected messages.
    pub fn take(&self) -> Vec<AlertMessage> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl AlertSink for CollectedAlerts {
    fn show_errors(&self, errors: &[AlertMessage]) {
        LogAlerts.show_errors(errors);
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collected_alerts_take_drains() {
        let alerts = CollectedAlerts::default();
        alerts.show_errors(&[AlertMessage::new("Insufficient stock")]);
        alerts.show_errors(&[AlertMessage::new("Payment declined")]);

        let taken = alerts.take();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].message, "Insufficient stock");
        assert!(alerts.take().is_empty());
    }
}
