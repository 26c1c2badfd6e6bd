//! Aggregation Engine - quiet-period batching of album items
//!
//! ## Flow
//!
//! ```text
//! Item (no batch key) ──────────────────────────────┐
//!                                                   ↓
//! Item (batch key k) → BatchStore[k] += item      deliver()
//!                      rearm timer(k, generation)   ↑
//!                              ↓ quiet period       │
//!                      take_if_current(k) ──────────┘
//! ```
//!
//! ## Locking
//!
//! One `std::sync::Mutex` guards the whole store. It is held only for map
//! operations and timer bookkeeping, never across an `.await`. Resolution and
//! delivery run after the items have left the store, so slow I/O never holds
//! up other keys.
//!
//! A late arrival either lands before the drain takes the entry (and is part
//! of the drained list, with the timer rearmed) or after it (and starts a new
//! entry under the same key). Nothing is ever appended to a list that has
//! already been taken.
//!
//! ## In-flight deliveries
//!
//! Drained batches and singletons are delivered on tasks owned by the engine.
//! A timer hands its drained items over while still holding the store lock, so
//! `shutdown` sees every batch either in the store or in the in-flight set.

use super::backend::{BatchSink, FailureNotifier, FileResolver};
use super::item::{Item, ReadyBatch, ResolvedImage};
use super::store::BatchStore;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::{self, AbortHandle, JoinSet};

/// Delivery tasks that have left the store but not finished
#[derive(Default)]
struct InFlight {
    tasks: JoinSet<()>,
    labels: HashMap<task::Id, String>,
}

impl InFlight {
    fn spawn<F>(&mut self, label: String, delivery: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.reap();
        let handle = self.tasks.spawn(delivery);
        self.labels.insert(handle.id(), label);
    }

    /// Forget tasks that already completed
    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next_with_id() {
            let id = match result {
                Ok((id, ())) => id,
                Err(e) => e.id(),
            };
            self.labels.remove(&id);
        }
    }
}

/// Groups items by batch key and emits one batch per key after a quiet period
///
/// Cloning is cheap and every clone drives the same store.
#[derive(Clone)]
pub struct AggregationEngine {
    store: Arc<Mutex<BatchStore>>,
    resolver: Arc<dyn FileResolver>,
    sink: Arc<dyn BatchSink>,
    notifier: Option<Arc<dyn FailureNotifier>>,
    in_flight: Arc<Mutex<InFlight>>,
    quiet_period: Duration,
}

impl AggregationEngine {
    pub fn new(
        quiet_period: Duration,
        resolver: Arc<dyn FileResolver>,
        sink: Arc<dyn BatchSink>,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(BatchStore::new())),
            resolver,
            sink,
            notifier: None,
            in_flight: Arc::new(Mutex::new(InFlight::default())),
            quiet_period,
        }
    }

    /// Send a generic failure notice to the originating chat when a batch is lost
    pub fn with_notifier(mut self, notifier: Arc<dyn FailureNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Accept one inbound item
    ///
    /// Never blocks on I/O and never fails: singletons are delivered from a
    /// spawned task, keyed items are appended and their timer rearmed.
    /// Must be called from within a tokio runtime.
    pub fn on_arrival(&self, item: Item) {
        match item.batch_key.clone() {
            None => {
                log::info!("📷 Single item {} from {} - emitting now", item.sequence_id, item.actor.id);
                let label = format!("<single {}>", item.sequence_id);
                self.spawn_delivery(label, None, vec![item]);
            }
            Some(key) => self.accumulate(key, item),
        }
    }

    fn accumulate(&self, key: String, item: Item) {
        let sequence_id = item.sequence_id.clone();

        let pending = {
            let mut store = self.lock_store();
            let generation = store.append(&key, item);
            let timer = self.arm_timer(key.clone(), generation);
            if let Some(previous) = store.set_timer(&key, timer) {
                previous.abort();
            }
            store.get(&key).map(|batch| batch.items().len()).unwrap_or(0)
        };

        log::info!(
            "🖼️  Item {} joined batch {} ({} pending, quiet period {}ms)",
            sequence_id,
            key,
            pending,
            self.quiet_period.as_millis()
        );
    }

    fn arm_timer(&self, key: String, generation: u64) -> AbortHandle {
        let engine = self.clone();
        let quiet_period = self.quiet_period;

        tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            engine.on_timer_fire(&key, generation);
        })
        .abort_handle()
    }

    fn on_timer_fire(&self, key: &str, generation: u64) {
        let mut store = self.lock_store();

        match store.take_if_current(key, generation) {
            Some(items) => {
                log::info!("⏰ Batch {} quiet for {}ms, draining {} items", key, self.quiet_period.as_millis(), items.len());
                self.spawn_delivery(key.to_string(), Some(key.to_string()), items);
            }
            None => {
                log::debug!("Timer for batch {} (generation {}) superseded or already drained", key, generation);
            }
        }
    }

    fn spawn_delivery(&self, label: String, batch_key: Option<String>, items: Vec<Item>) {
        let engine = self.clone();
        self.lock_in_flight().spawn(label, async move {
            engine.deliver(batch_key, items).await;
        });
    }

    /// Drain `key` immediately instead of waiting for its timer
    ///
    /// Returns false if there was nothing pending for the key.
    pub async fn flush(&self, key: &str) -> bool {
        let items = self.lock_store().take(key);

        match items {
            Some(items) => {
                log::info!("🔄 Flushing batch {} early ({} items)", key, items.len());
                self.deliver(Some(key.to_string()), items).await;
                true
            }
            None => false,
        }
    }

    /// Cancel every armed timer, empty the store and settle in-flight deliveries
    ///
    /// With `flush_pending` every pending batch is delivered and every
    /// in-flight delivery awaited before returning; otherwise each one is
    /// aborted and logged as dropped. Returns the number of batches that were
    /// pending or in flight.
    pub async fn shutdown(&self, flush_pending: bool) -> usize {
        let pending = self.lock_store().take_all();
        let InFlight { mut tasks, mut labels } = {
            let mut in_flight = self.lock_in_flight();
            in_flight.reap();
            std::mem::take(&mut *in_flight)
        };
        let count = pending.len() + tasks.len();

        log::info!(
            "🛑 Aggregation engine shutting down ({} pending, {} in flight)",
            pending.len(),
            tasks.len()
        );

        if !flush_pending {
            for (key, items) in &pending {
                log::warn!("⚠️  Dropping batch {} with {} items on shutdown", key, items.len());
            }
            for label in labels.values() {
                log::warn!("⚠️  Aborting in-flight delivery of batch {} on shutdown", label);
            }
            tasks.shutdown().await;
            return count;
        }

        for (key, items) in pending {
            self.deliver(Some(key), items).await;
        }

        while let Some(result) = tasks.join_next_with_id().await {
            match result {
                Ok((id, ())) => {
                    labels.remove(&id);
                }
                Err(e) => {
                    let label = labels.remove(&e.id()).unwrap_or_default();
                    log::error!("❌ Delivery of batch {} did not complete: {}", label, e);
                }
            }
        }

        count
    }

    /// Keys that currently have an accumulating batch
    pub fn pending_keys(&self) -> Vec<String> {
        self.lock_store().keys()
    }

    /// Number of items accumulated for `key`
    pub fn pending_len(&self, key: &str) -> usize {
        self.lock_store()
            .get(key)
            .map(|batch| batch.items().len())
            .unwrap_or(0)
    }

    async fn deliver(&self, batch_key: Option<String>, items: Vec<Item>) {
        let reply_chat_id = items.first().and_then(|item| item.reply_chat_id);
        let label = batch_key.clone().unwrap_or_else(|| "<single>".to_string());
        let item_count = items.len();

        let Some(batch) = self.resolve_batch(batch_key, items).await else {
            log::warn!("⚠️  Batch {} dropped: none of its {} items resolved", label, item_count);
            self.notify(reply_chat_id).await;
            return;
        };

        match self.sink.emit(&batch).await {
            Ok(()) => {
                log::info!(
                    "✅ Batch {} delivered to {} ({} of {} images, carousel={})",
                    label,
                    self.sink.sink_type(),
                    batch.images.len(),
                    item_count,
                    batch.is_carousel()
                );
            }
            Err(e) => {
                log::error!("❌ Batch {} delivery failed, not retrying: {}", label, e);
                self.notify(reply_chat_id).await;
            }
        }
    }

    /// Resolve each item's best candidate; failures skip the item only
    async fn resolve_batch(&self, batch_key: Option<String>, items: Vec<Item>) -> Option<ReadyBatch> {
        let first = items.first()?;
        let origin = first.origin.clone();
        let actor = first.actor.clone();
        let caption = items
            .iter()
            .find_map(Item::non_empty_caption)
            .unwrap_or_default()
            .to_string();

        let mut images = Vec::with_capacity(items.len());
        for item in &items {
            let Some(candidate) = item.best_candidate() else {
                log::warn!("⚠️  Item {} has no media candidates, skipping", item.sequence_id);
                continue;
            };

            match self.resolver.resolve(&candidate.file_ref).await {
                Ok(file_url) => images.push(ResolvedImage {
                    file_url,
                    width: candidate.width,
                    height: candidate.height,
                    file_size: candidate.size,
                }),
                Err(e) => {
                    log::warn!("⚠️  Item {} skipped, could not resolve {}: {}", item.sequence_id, candidate.file_ref, e);
                }
            }
        }

        if images.is_empty() {
            return None;
        }

        Some(ReadyBatch {
            batch_key,
            images,
            caption,
            origin,
            actor,
        })
    }

    async fn notify(&self, chat_id: Option<i64>) {
        if let (Some(notifier), Some(chat_id)) = (&self.notifier, chat_id) {
            notifier.notify_failure(chat_id).await;
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, BatchStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, InFlight> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator_core::backend::{EmitError, ResolveError};
    use crate::aggregator_core::item::{Actor, Candidate, Origin};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct EchoResolver;

    #[async_trait]
    impl FileResolver for EchoResolver {
        async fn resolve(&self, file_ref: &str) -> Result<String, ResolveError> {
            Ok(format!("https://files.test/{}", file_ref))
        }
    }

    struct ChannelSink(mpsc::UnboundedSender<ReadyBatch>);

    #[async_trait]
    impl BatchSink for ChannelSink {
        async fn emit(&self, batch: &ReadyBatch) -> Result<(), EmitError> {
            let _ = self.0.send(batch.clone());
            Ok(())
        }

        fn sink_type(&self) -> &'static str {
            "channel"
        }
    }

    fn make_engine(quiet_ms: u64) -> (AggregationEngine, mpsc::UnboundedReceiver<ReadyBatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = AggregationEngine::new(
            Duration::from_millis(quiet_ms),
            Arc::new(EchoResolver),
            Arc::new(ChannelSink(tx)),
        );
        (engine, rx)
    }

    fn make_item(key: Option<&str>, sequence_id: &str) -> Item {
        Item {
            batch_key: key.map(str::to_string),
            sequence_id: sequence_id.to_string(),
            candidates: vec![Candidate {
                file_ref: format!("ref-{}", sequence_id),
                width: 100,
                height: 100,
                size: 10,
            }],
            caption: None,
            origin: Origin::default(),
            actor: Actor::default(),
            reply_chat_id: None,
        }
    }

    #[tokio::test]
    async fn test_keyed_items_accumulate_until_quiet() {
        let (engine, mut rx) = make_engine(100);

        engine.on_arrival(make_item(Some("g1"), "1"));
        engine.on_arrival(make_item(Some("g1"), "2"));

        assert_eq!(engine.pending_len("g1"), 2);
        assert_eq!(engine.pending_keys(), vec!["g1".to_string()]);
        assert!(rx.try_recv().is_err());

        let batch = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.batch_key.as_deref(), Some("g1"));
        assert_eq!(batch.images.len(), 2);
        assert_eq!(batch.images[0].file_url, "https://files.test/ref-1");
        assert_eq!(engine.pending_len("g1"), 0);
    }

    #[tokio::test]
    async fn test_flush_is_idempotent() {
        let (engine, mut rx) = make_engine(10_000);

        engine.on_arrival(make_item(Some("g1"), "1"));

        assert!(engine.flush("g1").await);
        assert!(!engine.flush("g1").await);

        assert_eq!(rx.recv().await.unwrap().images.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_without_flush_drops_pending() {
        let (engine, mut rx) = make_engine(10_000);

        engine.on_arrival(make_item(Some("g1"), "1"));
        engine.on_arrival(make_item(Some("g2"), "2"));

        assert_eq!(engine.shutdown(false).await, 2);
        assert!(engine.pending_keys().is_empty());
        assert!(rx.try_recv().is_err());
    }
}
