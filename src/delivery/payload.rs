//! Canonical JSON body posted to the downstream webhook

use crate::aggregator_core::item::{ReadyBatch, ResolvedImage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDetail {
    pub file_url: String,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
}

impl From<&ResolvedImage> for ImageDetail {
    fn from(image: &ResolvedImage) -> Self {
        Self {
            file_url: image.file_url.clone(),
            width: image.width,
            height: image.height,
            file_size: image.file_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundPayload {
    pub user_id: i64,
    pub username: Option<String>,
    /// Legacy single-image field, only set for non-carousel emissions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub file_urls: Vec<String>,
    pub images_details: Vec<ImageDetail>,
    pub total_images: usize,
    pub timestamp: String,
    pub caption: String,
    pub source_chat_name: String,
    pub source_chat_id: String,
    pub is_carousel: bool,
}

impl OutboundPayload {
    pub fn from_batch(batch: &ReadyBatch, timestamp: DateTime<Utc>) -> Self {
        let file_urls: Vec<String> = batch.images.iter().map(|image| image.file_url.clone()).collect();
        let is_carousel = file_urls.len() > 1;

        Self {
            user_id: batch.actor.id,
            username: batch.actor.handle.clone(),
            file_url: if is_carousel { None } else { file_urls.first().cloned() },
            images_details: batch.images.iter().map(ImageDetail::from).collect(),
            total_images: file_urls.len(),
            file_urls,
            timestamp: timestamp.to_rfc3339(),
            caption: batch.caption.clone(),
            source_chat_name: batch.origin.display_name.clone(),
            source_chat_id: batch.origin.context_id.clone(),
            is_carousel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator_core::item::{Actor, Origin};
    use chrono::TimeZone;

    fn image(url: &str) -> ResolvedImage {
        ResolvedImage {
            file_url: url.to_string(),
            width: 1280,
            height: 720,
            file_size: 5000,
        }
    }

    fn batch(images: Vec<ResolvedImage>) -> ReadyBatch {
        ReadyBatch {
            batch_key: Some("g1".to_string()),
            images,
            caption: "hello".to_string(),
            origin: Origin {
                display_name: "Family".to_string(),
                context_id: "-500".to_string(),
            },
            actor: Actor {
                id: 42,
                handle: None,
            },
        }
    }

    #[test]
    fn test_carousel_payload_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let payload = OutboundPayload::from_batch(&batch(vec![image("https://f/1"), image("https://f/2")]), ts);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["user_id"], 42);
        assert!(json["username"].is_null());
        assert!(json.get("file_url").is_none());
        assert_eq!(json["file_urls"], serde_json::json!(["https://f/1", "https://f/2"]));
        assert_eq!(json["images_details"][1]["file_url"], "https://f/2");
        assert_eq!(json["images_details"][0]["file_size"], 5000);
        assert_eq!(json["total_images"], 2);
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00+00:00");
        assert_eq!(json["caption"], "hello");
        assert_eq!(json["source_chat_name"], "Family");
        assert_eq!(json["source_chat_id"], "-500");
        assert_eq!(json["is_carousel"], true);
    }

    #[test]
    fn test_single_payload_keeps_legacy_field() {
        let payload = OutboundPayload::from_batch(&batch(vec![image("https://f/only")]), Utc::now());

        assert!(!payload.is_carousel);
        assert_eq!(payload.total_images, 1);
        assert_eq!(payload.file_url.as_deref(), Some("https://f/only"));
        assert_eq!(payload.file_urls, vec!["https://f/only".to_string()]);
    }
}
