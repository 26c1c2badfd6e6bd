//! Normalized inbound items and the resolved batches built from them

use serde::{Deserialize, Serialize};

/// One resolution variant of an item's media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Platform reference, resolved to a URL at drain time
    pub file_ref: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

impl Candidate {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Chat the content originally came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub display_name: String,
    pub context_id: String,
}

/// Sender of the inbound event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub handle: Option<String>,
}

/// One unit of input to the aggregation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Present iff the item belongs to a multi-item batch
    pub batch_key: Option<String>,
    /// Originating event id, for logs only
    pub sequence_id: String,
    pub candidates: Vec<Candidate>,
    pub caption: Option<String>,
    pub origin: Origin,
    pub actor: Actor,
    /// Chat that receives the failure notice, if any
    pub reply_chat_id: Option<i64>,
}

impl Item {
    /// Highest `width * height` candidate; the first one seen wins ties
    pub fn best_candidate(&self) -> Option<&Candidate> {
        self.candidates.iter().fold(None, |best: Option<&Candidate>, candidate| match best {
            Some(current) if current.area() >= candidate.area() => Some(current),
            _ => Some(candidate),
        })
    }

    /// Caption text, None when absent or blank
    pub fn non_empty_caption(&self) -> Option<&str> {
        self.caption
            .as_deref()
            .filter(|caption| !caption.trim().is_empty())
    }
}

/// A drained item whose best candidate resolved to a concrete URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedImage {
    pub file_url: String,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
}

/// Everything the emitter needs for one outbound call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyBatch {
    /// None for singleton emissions
    pub batch_key: Option<String>,
    pub images: Vec<ResolvedImage>,
    pub caption: String,
    pub origin: Origin,
    pub actor: Actor,
}

impl ReadyBatch {
    pub fn is_carousel(&self) -> bool {
        self.images.len() > 1
    }
}
