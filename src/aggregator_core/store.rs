//! Batch store: pending items per batch key plus each key's armed timer
//!
//! The store itself is plain data and is always accessed under the engine's
//! mutex. Every append hands out a fresh generation number; a timer carries the
//! generation it was armed for and may only drain the entry while that
//! generation is still current. A timer that fires after being superseded
//! (abort raced with expiry) therefore finds a newer generation or no entry at
//! all and does nothing.

use super::item::Item;
use std::collections::HashMap;
use tokio::task::AbortHandle;

/// Accumulating batch for one key
#[derive(Debug)]
pub struct PendingBatch {
    items: Vec<Item>,
    generation: u64,
    timer: Option<AbortHandle>,
}

impl PendingBatch {
    pub fn items(&self) -> &[Item] {
        &self.items
    }
}

#[derive(Debug, Default)]
pub struct BatchStore {
    batches: HashMap<String, PendingBatch>,
    /// Monotonic across keys so a drained-and-recreated key never reuses a generation
    next_generation: u64,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item to `key`, creating the entry if absent
    ///
    /// Returns the generation the caller must arm the next timer with.
    pub fn append(&mut self, key: &str, item: Item) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;

        let batch = self
            .batches
            .entry(key.to_string())
            .or_insert_with(|| PendingBatch {
                items: Vec::new(),
                generation,
                timer: None,
            });
        batch.items.push(item);
        batch.generation = generation;

        generation
    }

    /// Store the timer for `key`, returning the one it replaces
    ///
    /// Returns None without storing anything if the key is absent.
    pub fn set_timer(&mut self, key: &str, timer: AbortHandle) -> Option<AbortHandle> {
        match self.batches.get_mut(key) {
            Some(batch) => batch.timer.replace(timer),
            None => {
                timer.abort();
                None
            }
        }
    }

    /// Remove `key` if its current generation is `generation`
    ///
    /// Called from the firing timer itself, so the stored handle is dropped
    /// rather than aborted.
    pub fn take_if_current(&mut self, key: &str, generation: u64) -> Option<Vec<Item>> {
        match self.batches.get(key) {
            Some(batch) if batch.generation == generation => {
                self.batches.remove(key).map(|batch| batch.items)
            }
            _ => None,
        }
    }

    /// Remove `key` unconditionally, cancelling its timer
    pub fn take(&mut self, key: &str) -> Option<Vec<Item>> {
        self.batches.remove(key).map(|batch| {
            if let Some(timer) = batch.timer {
                timer.abort();
            }
            batch.items
        })
    }

    /// Remove every key, cancelling all timers
    pub fn take_all(&mut self) -> Vec<(String, Vec<Item>)> {
        self.batches
            .drain()
            .map(|(key, batch)| {
                if let Some(timer) = batch.timer {
                    timer.abort();
                }
                (key, batch.items)
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&PendingBatch> {
        self.batches.get(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.batches.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator_core::item::{Actor, Origin};
    use std::time::Duration;

    fn make_item(sequence_id: &str) -> Item {
        Item {
            batch_key: Some("g".to_string()),
            sequence_id: sequence_id.to_string(),
            candidates: Vec::new(),
            caption: None,
            origin: Origin::default(),
            actor: Actor::default(),
            reply_chat_id: None,
        }
    }

    fn sequence_ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.sequence_id.as_str()).collect()
    }

    #[test]
    fn test_append_keeps_arrival_order() {
        let mut store = BatchStore::new();
        store.append("g1", make_item("1"));
        store.append("g1", make_item("2"));
        store.append("g1", make_item("3"));

        assert_eq!(store.len(), 1);
        assert_eq!(sequence_ids(store.get("g1").unwrap().items()), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_stale_generation_is_noop() {
        let mut store = BatchStore::new();
        let first = store.append("g1", make_item("1"));
        let second = store.append("g1", make_item("2"));
        assert!(second > first);

        // Superseded timer fires late
        assert!(store.take_if_current("g1", first).is_none());
        assert_eq!(store.get("g1").unwrap().items().len(), 2);

        let drained = store.take_if_current("g1", second).unwrap();
        assert_eq!(sequence_ids(&drained), vec!["1", "2"]);

        // Second fire for the same generation
        assert!(store.take_if_current("g1", second).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_recreated_key_gets_fresh_generation() {
        let mut store = BatchStore::new();
        let old = store.append("g1", make_item("1"));
        store.take_if_current("g1", old).unwrap();

        let fresh = store.append("g1", make_item("2"));
        assert_ne!(old, fresh);
        assert!(store.take_if_current("g1", old).is_none());
        assert_eq!(store.get("g1").unwrap().items().len(), 1);
    }

    #[test]
    fn test_keys_are_independent() {
        let mut store = BatchStore::new();
        let a = store.append("a", make_item("a1"));
        store.append("b", make_item("b1"));
        store.append("b", make_item("b2"));

        let drained = store.take_if_current("a", a).unwrap();
        assert_eq!(sequence_ids(&drained), vec!["a1"]);
        assert_eq!(store.get("b").unwrap().items().len(), 2);
    }

    #[tokio::test]
    async fn test_take_aborts_timer() {
        let mut store = BatchStore::new();
        store.append("g1", make_item("1"));

        let timer = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        assert!(store.set_timer("g1", timer.abort_handle()).is_none());

        let items = store.take("g1").unwrap();
        assert_eq!(items.len(), 1);
        assert!(timer.await.unwrap_err().is_cancelled());
        assert!(store.take("g1").is_none());
    }

    #[tokio::test]
    async fn test_set_timer_returns_previous_and_rejects_absent_key() {
        let mut store = BatchStore::new();
        store.append("g1", make_item("1"));

        let first = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let second = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        store.set_timer("g1", first.abort_handle());
        let replaced = store.set_timer("g1", second.abort_handle());
        assert!(replaced.is_some());

        let orphan = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        assert!(store.set_timer("missing", orphan.abort_handle()).is_none());
        assert!(orphan.await.unwrap_err().is_cancelled());

        let drained = store.take_all();
        assert_eq!(drained.len(), 1);
        assert!(second.await.unwrap_err().is_cancelled());
        first.abort();
    }
}
