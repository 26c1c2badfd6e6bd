//! Update poller - long-polls getUpdates and feeds photos into the engine
//!
//! Main loop:
//! 1. getUpdates(offset) with a server-side long-poll timeout
//! 2. Advance offset past every update seen (handled or not)
//! 3. Dispatch: `/start` → greeting, photo → normalize → engine, else ignore
//!
//! Poll failures back off exponentially (1s doubling, capped at 60s); a
//! successful poll resets the backoff. Ten failures in a row stop the poller.

use super::client::{TelegramClient, TelegramError};
use super::types::{Message, Update};
use crate::aggregator_core::{normalize, AggregationEngine};
use std::sync::Arc;
use std::time::Duration;

const RETRY_INITIAL_DELAY: Duration = Duration::from_secs(1);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(60);
const RETRY_LIMIT: u32 = 10;

/// The poller gave up after too many consecutive getUpdates failures
#[derive(Debug)]
pub struct PollerGaveUp {
    pub failures: u32,
    pub last_error: TelegramError,
}

impl std::fmt::Display for PollerGaveUp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "getUpdates failed {} times in a row, last error: {}",
            self.failures, self.last_error
        )
    }
}

impl std::error::Error for PollerGaveUp {}

/// Consecutive-failure budget for getUpdates
#[derive(Debug)]
struct RetryBudget {
    initial: Duration,
    cap: Duration,
    limit: u32,
    failures: u32,
}

impl RetryBudget {
    fn new(initial: Duration, cap: Duration, limit: u32) -> Self {
        Self {
            initial,
            cap,
            limit,
            failures: 0,
        }
    }

    /// Record a failure; the delay to wait before polling again, or None once
    /// the budget is spent
    fn record_failure(&mut self) -> Option<Duration> {
        if self.failures >= self.limit {
            return None;
        }
        let delay = self.initial.saturating_mul(2_u32.saturating_pow(self.failures)).min(self.cap);
        self.failures += 1;
        Some(delay)
    }

    fn record_success(&mut self) {
        self.failures = 0;
    }
}

pub const GREETING: &str = "Hi! Send me an image or a gallery and I will process it.";
pub const INVALID_IMAGE_NOTICE: &str = "Please send a valid image.";

/// What the poller decided to do with one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Greet(i64),
    Arrival,
    Reject(i64),
    Ignore,
}

pub struct UpdatePoller {
    client: Arc<TelegramClient>,
    engine: AggregationEngine,
    poll_timeout_secs: u64,
    offset: Option<i64>,
}

impl UpdatePoller {
    pub fn new(client: Arc<TelegramClient>, engine: AggregationEngine, poll_timeout_secs: u64) -> Self {
        Self {
            client,
            engine,
            poll_timeout_secs,
            offset: None,
        }
    }

    /// Poll until the backoff gives up; runs indefinitely otherwise
    pub async fn run(mut self) -> Result<(), PollerGaveUp> {
        let mut budget = RetryBudget::new(RETRY_INITIAL_DELAY, RETRY_MAX_DELAY, RETRY_LIMIT);

        log::info!("📡 Polling Bot API for updates (long-poll {}s)", self.poll_timeout_secs);

        loop {
            match self.client.get_updates(self.offset, self.poll_timeout_secs).await {
                Ok(updates) => {
                    budget.record_success();
                    for update in updates {
                        self.handle_update(update).await;
                    }
                }
                Err(e) => {
                    let Some(delay) = budget.record_failure() else {
                        return Err(PollerGaveUp {
                            failures: budget.failures,
                            last_error: e,
                        });
                    };
                    log::error!(
                        "❌ getUpdates failed ({} of {}), retrying in {}ms: {}",
                        budget.failures,
                        budget.limit,
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn handle_update(&mut self, update: Update) {
        self.offset = Some(next_offset(self.offset, update.update_id));

        let Some(message) = update.message else {
            log::debug!("Update {} has no message, skipping", update.update_id);
            return;
        };

        match dispatch(&self.engine, &message) {
            Dispatch::Greet(chat_id) => {
                log::info!("👋 /start from chat {}", chat_id);
                if let Err(e) = self.client.send_message(chat_id, GREETING).await {
                    log::warn!("⚠️  Could not greet chat {}: {}", chat_id, e);
                }
            }
            Dispatch::Reject(chat_id) => {
                if let Err(e) = self.client.send_message(chat_id, INVALID_IMAGE_NOTICE).await {
                    log::warn!("⚠️  Could not notify chat {}: {}", chat_id, e);
                }
            }
            Dispatch::Arrival | Dispatch::Ignore => {}
        }
    }
}

/// Offset that acknowledges `update_id` without ever moving backwards
pub fn next_offset(current: Option<i64>, update_id: i64) -> i64 {
    current.unwrap_or(i64::MIN).max(update_id + 1)
}

/// Route one message; photos go straight into the engine
pub fn dispatch(engine: &AggregationEngine, message: &Message) -> Dispatch {
    let chat_id = message.chat.id;

    if let Some(text) = message.text.as_deref() {
        if text.split_whitespace().next().is_some_and(is_start_command) {
            return Dispatch::Greet(chat_id);
        }
    }

    if message.photo.is_none() {
        log::debug!("Message {} in chat {} is not a photo, ignoring", message.message_id, chat_id);
        return Dispatch::Ignore;
    }

    match normalize(message) {
        Ok(item) => {
            engine.on_arrival(item);
            Dispatch::Arrival
        }
        Err(e) => {
            log::warn!("⚠️  Rejected message {} from chat {}: {}", message.message_id, chat_id, e);
            Dispatch::Reject(chat_id)
        }
    }
}

/// `/start` or `/start@SomeBot`
fn is_start_command(word: &str) -> bool {
    word == "/start" || word.starts_with("/start@")
}
