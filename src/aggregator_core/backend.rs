//! Collaborator traits the aggregation engine is wired against
//!
//! Resolution, delivery and user notification are all external I/O; the engine
//! only sees these traits, which keeps it testable with in-memory doubles.

use super::item::ReadyBatch;
use async_trait::async_trait;

#[derive(Debug)]
pub enum ResolveError {
    /// Platform answered but refused or had no path for the reference
    NotFound(String),
    Transport(String),
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::NotFound(msg) => write!(f, "File not resolvable: {}", msg),
            ResolveError::Transport(msg) => write!(f, "Resolution transport error: {}", msg),
        }
    }
}

impl std::error::Error for ResolveError {}

#[derive(Debug)]
pub enum EmitError {
    /// Downstream answered with a non-2xx status
    Status(u16),
    Transport(String),
}

impl std::fmt::Display for EmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmitError::Status(code) => write!(f, "Downstream returned status {}", code),
            EmitError::Transport(msg) => write!(f, "Delivery transport error: {}", msg),
        }
    }
}

impl std::error::Error for EmitError {}

/// Turns an item reference into a downloadable URL
#[async_trait]
pub trait FileResolver: Send + Sync {
    async fn resolve(&self, file_ref: &str) -> Result<String, ResolveError>;
}

/// Downstream consumer of drained batches
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Deliver one batch; best-effort, never retried by the caller
    async fn emit(&self, batch: &ReadyBatch) -> Result<(), EmitError>;

    /// Sink name for logging
    fn sink_type(&self) -> &'static str;
}

/// Tells the originating user that their upload was not delivered
#[async_trait]
pub trait FailureNotifier: Send + Sync {
    async fn notify_failure(&self, chat_id: i64);
}
