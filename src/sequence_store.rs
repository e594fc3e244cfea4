//! Per-configuration sequence state, one lock per configuration id.
//!
//! The slot map is guarded by a plain mutex that is only held long enough to
//! look up or insert a slot; it is never held across an await. Each slot has
//! its own async mutex, so a slow candidate query for one configuration does
//! not stall polls for another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use display_model::ConfigId;
use tokio::sync::Mutex as AsyncMutex;

use crate::sequencer::SequenceState;

pub type Slot = Arc<AsyncMutex<Option<SequenceState>>>;

#[derive(Default)]
pub struct SequenceStore {
    slots: Mutex<HashMap<ConfigId, Slot>>,
}

impl SequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot for `id`, creating an empty one on first access.
    pub fn slot(&self, id: ConfigId) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(id).or_default())
    }

    fn existing(&self, id: ConfigId) -> Option<Slot> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(&id).cloned()
    }

    /// Discards the state for `id`. Waits for any in-flight advance on the same id.
    pub async fn reset(&self, id: ConfigId) -> bool {
        match self.existing(id) {
            Some(slot) => slot.lock().await.take().is_some(),
            None => false,
        }
    }

    /// Discards the state and drops the slot itself.
    pub async fn remove(&self, id: ConfigId) {
        let removed = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.remove(&id)
        };
        if let Some(slot) = removed {
            slot.lock().await.take();
        }
    }

    pub async fn snapshot(&self, id: ConfigId) -> Option<SequenceState> {
        let slot = self.existing(id)?;
        let guard = slot.lock().await;
        guard.clone()
    }

    pub async fn has_state(&self, id: ConfigId) -> bool {
        match self.existing(id) {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use display_model::PhotoSource;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Duration;

    fn state() -> SequenceState {
        SequenceState::build(&[1, 2, 3], PhotoSource::All, false, None, StdRng::seed_from_u64(1))
    }

    #[tokio::test]
    async fn slot_is_created_once_per_id() {
        let store = SequenceStore::new();
        let a = store.slot(1);
        let b = store.slot(1);
        assert!(Arc::ptr_eq(&a, &b));
        store.slot(2);
        assert_eq!(store.slot_count(), 2);
        assert!(!store.has_state(1).await);
    }

    #[tokio::test]
    async fn reset_and_remove_clear_state() {
        let store = SequenceStore::new();
        *store.slot(7).lock().await = Some(state());
        assert!(store.has_state(7).await);
        assert!(store.reset(7).await);
        assert!(!store.has_state(7).await);
        assert!(!store.reset(7).await);

        *store.slot(7).lock().await = Some(state());
        store.remove(7).await;
        assert_eq!(store.slot_count(), 0);
        assert!(store.snapshot(7).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn held_slot_does_not_block_other_ids() {
        let store = Arc::new(SequenceStore::new());
        let slot = store.slot(1);
        let _held = slot.lock().await;

        let other = tokio::time::timeout(Duration::from_secs(1), async {
            *store.slot(2).lock().await = Some(state());
            store.has_state(2).await
        })
        .await
        .expect("unrelated id must not wait on a held slot");
        assert!(other);

        let blocked = tokio::time::timeout(Duration::from_millis(100), store.reset(1)).await;
        assert!(blocked.is_err(), "reset must wait for the holder of the same id");
    }
}
