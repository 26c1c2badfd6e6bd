//! Webhook emitter - one best-effort POST per drained batch
//!
//! No retries and no queuing: a non-2xx answer or a timeout is reported to the
//! engine as an `EmitError`, which logs it and moves on.

use super::payload::OutboundPayload;
use crate::aggregator_core::backend::{BatchSink, EmitError};
use crate::aggregator_core::item::ReadyBatch;
use async_trait::async_trait;
use std::time::Duration;

pub struct WebhookEmitter {
    client: reqwest::Client,
    url: String,
}

impl WebhookEmitter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl BatchSink for WebhookEmitter {
    async fn emit(&self, batch: &ReadyBatch) -> Result<(), EmitError> {
        let payload = OutboundPayload::from_batch(batch, chrono::Utc::now());

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EmitError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmitError::Status(status.as_u16()));
        }

        log::debug!(
            "📤 Webhook accepted {} images (status {})",
            payload.total_images,
            status.as_u16()
        );
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "webhook"
    }
}
