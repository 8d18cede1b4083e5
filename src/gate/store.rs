//! Per-connection verification state.
//!
//! Flow Overview:
//! 1) The registration hook records an outcome with [`PendingStore::set`] and keeps
//!    the returned [`SlotHandle`] when a verification is dispatched.
//! 2) The verification worker resolves the slot through that handle once the provider answers.
//! 3) The readiness hook reads the slot with [`PendingStore::get`].
//! 4) Disconnect removes and detaches the slot with [`PendingStore::clear`].
//!
//! A detached slot refuses every later write, and a reused `ConnectionId` gets a
//! fresh slot, so a late verification result cannot leak into another connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::host::ConnectionId;
use super::outcome::VerificationOutcome;

const DETACHED: u8 = u8::MAX;

#[derive(Debug)]
struct Slot {
    state: AtomicU8,
}

impl Slot {
    fn new(outcome: VerificationOutcome) -> Self {
        Self {
            state: AtomicU8::new(outcome.as_u8()),
        }
    }

    fn load(&self) -> Option<VerificationOutcome> {
        VerificationOutcome::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// Write access to one connection's slot, held by the verification worker.
#[derive(Debug, Clone)]
pub struct SlotHandle {
    slot: Arc<Slot>,
}

impl SlotHandle {
    /// Move the slot from `Pending` to `outcome`.
    ///
    /// Returns `false` when the slot was detached by a disconnect or is no longer
    /// pending; the result must then be discarded.
    pub fn resolve(&self, outcome: VerificationOutcome) -> bool {
        self.slot
            .state
            .compare_exchange(
                VerificationOutcome::Pending.as_u8(),
                outcome.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.slot.state.load(Ordering::Acquire) == DETACHED
    }
}

#[derive(Debug, Default)]
pub struct PendingStore {
    slots: RwLock<HashMap<ConnectionId, Arc<Slot>>>,
}

impl PendingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `outcome` for `id`, overwriting any previous value in place.
    pub fn set(&self, id: ConnectionId, outcome: VerificationOutcome) -> SlotHandle {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let slot = slots
            .entry(id)
            .and_modify(|slot| slot.state.store(outcome.as_u8(), Ordering::Release))
            .or_insert_with(|| Arc::new(Slot::new(outcome)));
        SlotHandle {
            slot: Arc::clone(slot),
        }
    }

    /// Current outcome for `id`; unknown connections read as `NotRequired`.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> VerificationOutcome {
        self.lookup(id).unwrap_or_default()
    }

    /// Whether `id` has already been through the registration hook.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lookup(id).is_some()
    }

    /// Forget `id` and detach its slot. Returns the outcome that was recorded, if any.
    pub fn clear(&self, id: ConnectionId) -> Option<VerificationOutcome> {
        let slot = self
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)?;
        VerificationOutcome::from_u8(slot.state.swap(DETACHED, Ordering::AcqRel))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, id: ConnectionId) -> Option<VerificationOutcome> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .and_then(|slot| slot.load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: ConnectionId = ConnectionId::new(1);

    #[test]
    fn unset_connection_reads_not_required() {
        let store = PendingStore::new();
        assert_eq!(store.get(ALICE), VerificationOutcome::NotRequired);
        assert!(!store.contains(ALICE));
    }

    #[test]
    fn set_overwrites_single_entry() {
        let store = PendingStore::new();
        store.set(ALICE, VerificationOutcome::Pending);
        store.set(ALICE, VerificationOutcome::Failed);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(ALICE), VerificationOutcome::Failed);
    }

    #[test]
    fn resolve_moves_pending_slot() {
        let store = PendingStore::new();
        let handle = store.set(ALICE, VerificationOutcome::Pending);

        assert!(handle.resolve(VerificationOutcome::NotRequired));
        assert_eq!(store.get(ALICE), VerificationOutcome::NotRequired);

        // Only a pending slot can be resolved.
        assert!(!handle.resolve(VerificationOutcome::Failed));
        assert_eq!(store.get(ALICE), VerificationOutcome::NotRequired);
    }

    #[test]
    fn clear_detaches_slot() {
        let store = PendingStore::new();
        let handle = store.set(ALICE, VerificationOutcome::Pending);

        assert_eq!(store.clear(ALICE), Some(VerificationOutcome::Pending));
        assert!(handle.is_detached());
        assert!(!handle.resolve(VerificationOutcome::Failed));
        assert!(store.is_empty());
        assert_eq!(store.clear(ALICE), None);
    }

    #[test]
    fn late_result_does_not_touch_reused_identifier() {
        let store = PendingStore::new();
        let stale = store.set(ALICE, VerificationOutcome::Pending);
        store.clear(ALICE);

        // Same identifier handed to an unrelated connection.
        let fresh = store.set(ALICE, VerificationOutcome::Pending);

        assert!(!stale.resolve(VerificationOutcome::Failed));
        assert_eq!(store.get(ALICE), VerificationOutcome::Pending);
        assert!(fresh.resolve(VerificationOutcome::NotRequired));
        assert_eq!(store.get(ALICE), VerificationOutcome::NotRequired);
    }
}
