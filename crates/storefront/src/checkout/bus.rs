//! Update-state bus.
//!
//! Keeps the current [`OperationStatus`] of every [`UpdateKey`] and broadcasts
//! each status write to the subscribers of that key. Writes are delivered in
//! order per key, including repeats of the same status, so subscribers must
//! tolerate duplicates. No ordering is guaranteed across keys.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use guestpay_core::{OperationStatus, StatusTransitionError, UpdateKey};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Per-key buffer of undelivered status writes.
const SUBSCRIPTION_CAPACITY: usize = 32;

struct Slot {
    status: OperationStatus,
    sender: broadcast::Sender<OperationStatus>,
}

impl Slot {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(SUBSCRIPTION_CAPACITY);
        Self {
            status: OperationStatus::Idle,
            sender,
        }
    }

    fn publish(&mut self, status: OperationStatus) {
        self.status = status;
        // No subscribers is fine; the status is still readable.
        let _ = self.sender.send(status);
    }
}

/// Status register for the named operations of one checkout attempt.
pub struct UpdateStateBus {
    slots: Mutex<HashMap<UpdateKey, Slot>>,
}

impl UpdateStateBus {
    /// Create a bus with every key idle.
    #[must_use]
    pub fn new() -> Self {
        let slots = UpdateKey::ALL
            .into_iter()
            .map(|key| (key, Slot::new()))
            .collect();
        Self {
            slots: Mutex::new(slots),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<UpdateKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current status of `key`.
    #[must_use]
    pub fn status(&self, key: UpdateKey) -> OperationStatus {
        self.slots()
            .get(&key)
            .map_or(OperationStatus::Idle, |slot| slot.status)
    }

    /// Record a new status for `key` and notify its subscribers.
    ///
    /// Writing the current status again is accepted and re-delivered.
    ///
    /// # Errors
    ///
    /// Returns [`StatusTransitionError`] if the write would move the key
    /// backwards or out of a terminal status. Use [`Self::restart`] to begin
    /// a new run of the operation instead.
    pub fn set_status(
        &self,
        key: UpdateKey,
        status: OperationStatus,
    ) -> Result<(), StatusTransitionError> {
        let mut slots = self.slots();
        let slot = slots.entry(key).or_insert_with(Slot::new);

        if !slot.status.can_transition_to(status) {
            return Err(StatusTransitionError {
                key,
                from: slot.status,
                to: status,
            });
        }

        debug!(%key, from = %slot.status, to = %status, "update state changed");
        slot.publish(status);
        Ok(())
    }

    /// Begin a new run of `key`, moving it to `loading` from any status.
    pub fn restart(&self, key: UpdateKey) {
        let mut slots = self.slots();
        let slot = slots.entry(key).or_insert_with(Slot::new);
        debug!(%key, from = %slot.status, "update state restarted");
        slot.publish(OperationStatus::Loading);
    }

    /// Return every key to idle, notifying subscribers of keys that moved.
    pub fn reset(&self) {
        for slot in self.slots().values_mut() {
            if slot.status != OperationStatus::Idle {
                slot.publish(OperationStatus::Idle);
            }
        }
    }

    /// Subscribe to every subsequent status write for `key`.
    #[must_use]
    pub fn subscribe(&self, key: UpdateKey) -> StatusSubscription {
        let mut slots = self.slots();
        let slot = slots.entry(key).or_insert_with(Slot::new);
        StatusSubscription {
            key,
            receiver: slot.sender.subscribe(),
        }
    }
}

impl Default for UpdateStateBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream of status writes for one key.
pub struct StatusSubscription {
    key: UpdateKey,
    receiver: broadcast::Receiver<OperationStatus>,
}

impl StatusSubscription {
    /// The key this subscription follows.
    #[must_use]
    pub const fn key(&self) -> UpdateKey {
        self.key
    }

    /// Wait for the next status write.
    ///
    /// Returns `None` once the bus has been dropped. If the subscriber fell
    /// behind, skipped writes are logged and the oldest retained write is
    /// returned.
    pub async fn next(&mut self) -> Option<OperationStatus> {
        loop {
            match self.receiver.recv().await {
                Ok(status) => return Some(status),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(key = %self.key, skipped, "status subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bus_is_idle() {
        let bus = UpdateStateBus::new();
        for key in UpdateKey::ALL {
            assert_eq!(bus.status(key), OperationStatus::Idle);
        }
    }

    #[test]
    fn test_rejects_regression_from_terminal() {
        let bus = UpdateStateBus::new();
        bus.set_status(UpdateKey::UserRegister, OperationStatus::Success)
            .unwrap();
        let err = bus
            .set_status(UpdateKey::UserRegister, OperationStatus::Loading)
            .unwrap_err();
        assert_eq!(err.from, OperationStatus::Success);
        assert_eq!(err.to, OperationStatus::Loading);
        assert_eq!(bus.status(UpdateKey::UserRegister), OperationStatus::Success);
    }

    #[test]
    fn test_restart_leaves_terminal_state() {
        let bus = UpdateStateBus::new();
        bus.set_status(UpdateKey::CheckoutEmailUpdate, OperationStatus::Error)
            .unwrap();
        bus.restart(UpdateKey::CheckoutEmailUpdate);
        assert_eq!(
            bus.status(UpdateKey::CheckoutEmailUpdate),
            OperationStatus::Loading
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_repeats_in_order() {
        let bus = UpdateStateBus::new();
        let mut sub = bus.subscribe(UpdateKey::UserRegister);

        bus.set_status(UpdateKey::UserRegister, OperationStatus::Loading)
            .unwrap();
        bus.set_status(UpdateKey::UserRegister, OperationStatus::Success)
            .unwrap();
        bus.set_status(UpdateKey::UserRegister, OperationStatus::Success)
            .unwrap();

        assert_eq!(sub.next().await, Some(OperationStatus::Loading));
        assert_eq!(sub.next().await, Some(OperationStatus::Success));
        assert_eq!(sub.next().await, Some(OperationStatus::Success));
    }

    #[tokio::test]
    async fn test_subscription_only_sees_its_key() {
        let bus = UpdateStateBus::new();
        let mut sub = bus.subscribe(UpdateKey::UserRegister);

        bus.restart(UpdateKey::CheckoutEmailUpdate);
        bus.set_status(UpdateKey::UserRegister, OperationStatus::Success)
            .unwrap();

        assert_eq!(sub.key(), UpdateKey::UserRegister);
        assert_eq!(sub.next().await, Some(OperationStatus::Success));
    }

    #[tokio::test]
    async fn test_reset_notifies_moved_keys() {
        let bus = UpdateStateBus::new();
        bus.set_status(UpdateKey::UserRegister, OperationStatus::Success)
            .unwrap();
        let mut sub = bus.subscribe(UpdateKey::UserRegister);

        bus.reset();

        assert_eq!(sub.next().await, Some(OperationStatus::Idle));
        for key in UpdateKey::ALL {
            assert_eq!(bus.status(key), OperationStatus::Idle);
        }
    }

    #[tokio::test]
    async fn test_subscription_ends_when_bus_dropped() {
        let bus = UpdateStateBus::new();
        let mut sub = bus.subscribe(UpdateKey::SignIn);
        drop(bus);
        assert_eq!(sub.next().await, None);
    }
}
