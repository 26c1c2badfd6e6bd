//! Carousel relay: batches Telegram album photos and posts one payload per album
//!
//! ```text
//! UpdatePoller → normalize → AggregationEngine ──(quiet period)──→ WebhookEmitter
//!                                   ↑ FileResolver (getFile)
//! ```

pub mod aggregator_core;
pub mod config;
pub mod delivery;
pub mod server;
pub mod telegram;

pub use aggregator_core::AggregationEngine;
pub use config::{ConfigError, RuntimeConfig};
