//! Per-attempt coordination context.

use std::sync::Arc;

use guestpay_core::AttemptId;
use serde::Serialize;
use tokio::sync::watch;

use super::bus::UpdateStateBus;
use super::relay::CredentialRelay;

/// Whether, and under which conditions, the registration form should submit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationIntent {
    /// Raised by the pay action, consumed by the registration form.
    pub should_register: bool,
    /// The shopper opted into creating an account.
    pub create_account: bool,
    /// Registration reached a terminal outcome for this attempt.
    pub disabled: bool,
}

/// Shared state connecting the registration and payment sides of one
/// checkout attempt.
///
/// Cheap to clone; all clones refer to the same attempt. Dropping the last
/// clone drops any credentials still held in the relay.
#[derive(Clone)]
pub struct AttemptContext {
    inner: Arc<AttemptContextInner>,
}

struct AttemptContextInner {
    id: AttemptId,
    bus: UpdateStateBus,
    relay: CredentialRelay,
    intent: watch::Sender<RegistrationIntent>,
    validation: watch::Sender<u64>,
}

impl AttemptContext {
    /// Start a new attempt with an idle bus, an empty relay and no intent.
    #[must_use]
    pub fn new() -> Self {
        let (intent, _) = watch::channel(RegistrationIntent::default());
        let (validation, _) = watch::channel(0);
        Self {
            inner: Arc::new(AttemptContextInner {
                id: AttemptId::generate(),
                bus: UpdateStateBus::new(),
                relay: CredentialRelay::new(),
                intent,
                validation,
            }),
        }
    }

    /// Identifier used to correlate logs of this attempt.
    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.inner.id
    }

    /// The attempt's update-state bus.
    #[must_use]
    pub fn bus(&self) -> &UpdateStateBus {
        &self.inner.bus
    }

    /// The attempt's credential relay.
    #[must_use]
    pub fn relay(&self) -> &CredentialRelay {
        &self.inner.relay
    }

    /// Current registration intent.
    #[must_use]
    pub fn intent(&self) -> RegistrationIntent {
        *self.inner.intent.borrow()
    }

    /// Modify the registration intent, notifying the form only if a flag
    /// actually changed.
    pub fn update_intent(&self, update: impl FnOnce(&mut RegistrationIntent)) {
        self.inner.intent.send_if_modified(|intent| {
            let before = *intent;
            update(intent);
            *intent != before
        });
    }

    /// Receiver notified whenever the intent changes.
    #[must_use]
    pub fn subscribe_intent(&self) -> watch::Receiver<RegistrationIntent> {
        self.inner.intent.subscribe()
    }

    /// Ask every form of the checkout to validate itself.
    pub fn request_validation(&self) {
        self.inner
            .validation
            .send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// Receiver notified on every validation request.
    #[must_use]
    pub fn subscribe_validation(&self) -> watch::Receiver<u64> {
        self.inner.validation.subscribe()
    }
}

impl Default for AttemptContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_intent_only_notifies_on_change() {
        let context = AttemptContext::new();
        let receiver = context.subscribe_intent();

        context.update_intent(|intent| intent.should_register = false);
        assert!(!receiver.has_changed().unwrap_or(true));

        context.update_intent(|intent| intent.should_register = true);
        assert!(receiver.has_changed().unwrap_or(false));
        assert!(context.intent().should_register);
    }

    #[test]
    fn test_validation_requests_bump_generation() {
        let context = AttemptContext::new();
        let mut receiver = context.subscribe_validation();
        context.request_validation();
        assert!(receiver.has_changed().unwrap_or(false));
        assert_eq!(*receiver.borrow_and_update(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let context = AttemptContext::new();
        let other = context.clone();
        other.update_intent(|intent| intent.create_account = true);
        assert!(context.intent().create_account);
        assert_eq!(context.id(), other.id());
    }
}
