//! Outbound delivery to the downstream webhook

pub mod payload;
pub mod webhook;

pub use payload::{ImageDetail, OutboundPayload};
pub use webhook::WebhookEmitter;
