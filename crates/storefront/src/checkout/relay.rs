//! Single-slot credential handoff.
//!
//! The registration side writes the credentials it just registered; the
//! payment side takes them once to sign in. Waiting is a `watch` handoff that
//! resolves the moment the slot is written, bounded by a budget.

use std::time::Duration;

use guestpay_core::Credentials;
use tokio::sync::watch;
use tracing::debug;

/// Holds at most one [`Credentials`] value for the current attempt.
pub struct CredentialRelay {
    slot: watch::Sender<Option<Credentials>>,
}

impl CredentialRelay {
    /// Create an empty relay.
    #[must_use]
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot }
    }

    /// Store credentials, replacing any stale value.
    pub fn set(&self, credentials: Credentials) {
        debug!(email = %credentials.email(), "credentials stored in relay");
        self.slot.send_replace(Some(credentials));
    }

    /// Copy of the stored credentials, if any.
    #[must_use]
    pub fn get(&self) -> Option<Credentials> {
        self.slot.borrow().clone()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot.borrow().is_none()
    }

    /// Remove and return the stored credentials.
    pub fn take(&self) -> Option<Credentials> {
        self.slot.send_replace(None)
    }

    /// Drop any stored credentials.
    pub fn clear(&self) {
        if self.take().is_some() {
            debug!("credential relay cleared");
        }
    }

    /// Take the credentials as soon as they are stored, giving up after
    /// `budget`.
    pub async fn take_within(&self, budget: Duration) -> Option<Credentials> {
        let mut receiver = self.slot.subscribe();
        let stored = tokio::time::timeout(budget, async {
            receiver.wait_for(Option::is_some).await.map(|_| ())
        })
        .await;

        match stored {
            Ok(Ok(())) => self.take(),
            Ok(Err(_)) | Err(_) => None,
        }
    }
}

impl Default for CredentialRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use guestpay_core::Email;
    use secrecy::{ExposeSecret, SecretString};

    use super::*;

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials::new(Email::parse(email).unwrap(), SecretString::from(password))
    }

    #[test]
    fn test_set_overwrites_single_slot() {
        let relay = CredentialRelay::new();
        relay.set(credentials("old@x.com", "oldpassword"));
        relay.set(credentials("new@x.com", "longenough"));

        let stored = relay.get().unwrap();
        assert_eq!(stored.email().as_str(), "new@x.com");
        assert_eq!(stored.password().expose_secret(), "longenough");
    }

    #[test]
    fn test_take_empties_slot() {
        let relay = CredentialRelay::new();
        relay.set(credentials("new@x.com", "longenough"));
        assert!(relay.take().is_some());
        assert!(relay.is_empty());
        assert!(relay.take().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_within_returns_already_stored() {
        let relay = CredentialRelay::new();
        relay.set(credentials("new@x.com", "longenough"));
        let taken = relay.take_within(Duration::from_secs(1)).await.unwrap();
        assert_eq!(taken.email().as_str(), "new@x.com");
        assert!(relay.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_within_wakes_on_late_write() {
        let relay = Arc::new(CredentialRelay::new());
        let writer = Arc::clone(&relay);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(450)).await;
            writer.set(credentials("late@x.com", "longenough"));
        });

        let start = tokio::time::Instant::now();
        let taken = relay.take_within(Duration::from_secs(1)).await.unwrap();
        assert_eq!(taken.email().as_str(), "late@x.com");
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(450));
        assert!(waited < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_within_gives_up_after_budget() {
        let relay = CredentialRelay::new();
        let start = tokio::time::Instant::now();
        assert!(relay.take_within(Duration::from_secs(1)).await.is_none());
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
