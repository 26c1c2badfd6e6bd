//! Aggregator Core - album batching engine
//!
//! # Architecture
//!
//! ```text
//! Bot API Message → normalize() → Item
//!     ↓
//! AggregationEngine::on_arrival()
//!     ├─ no batch key → deliver immediately (singleton)
//!     └─ batch key    → BatchStore append + rearm quiet-period timer
//!                            ↓ timer fires
//!                       drain → FileResolver → BatchSink
//! ```

pub mod backend;
pub mod engine;
pub mod item;
pub mod normalizer;
pub mod store;

pub use backend::{BatchSink, EmitError, FailureNotifier, FileResolver, ResolveError};
pub use engine::AggregationEngine;
pub use item::{Actor, Candidate, Item, Origin, ReadyBatch, ResolvedImage};
pub use normalizer::{normalize, NormalizeError};
pub use store::BatchStore;
