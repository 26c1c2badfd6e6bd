//! HTTP surface: liveness probe and the channel relay endpoint
//!
//! Routes:
//! - `GET /`, `GET /ping` → 200 "Pong! Online"
//! - `POST /webhook` → publish `file_urls` / `file_url` to the channel
//!   (mounted only when a channel is configured)
//! - anything else → 404

use crate::telegram::client::TelegramError;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub const PONG: &str = "Pong! Online";

/// Publishes media URLs into a channel
#[async_trait]
pub trait MediaPublisher: Send + Sync {
    async fn publish(&self, channel_id: &str, file_urls: &[String], caption: &str) -> Result<(), TelegramError>;
}

/// Where relayed media goes
#[derive(Clone)]
pub struct RelayTarget {
    pub publisher: Arc<dyn MediaPublisher>,
    pub channel_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    pub file_urls: Option<Vec<String>>,
    pub file_url: Option<String>,
    pub caption: Option<String>,
    pub source_chat_name: Option<String>,
    pub source_chat_id: Option<String>,
}

impl RelayRequest {
    /// URLs to publish; the list form wins over the single form
    pub fn urls(&self) -> Vec<String> {
        match (&self.file_urls, &self.file_url) {
            (Some(urls), _) if !urls.is_empty() => urls.clone(),
            (_, Some(url)) if !url.is_empty() => vec![url.clone()],
            _ => Vec::new(),
        }
    }
}

pub fn router(relay: Option<RelayTarget>) -> Router {
    let mut app = Router::new()
        .route("/", get(ping))
        .route("/ping", get(ping));

    if let Some(target) = relay {
        let relay_routes = Router::new()
            .route("/webhook", post(relay_media))
            .with_state(Arc::new(target));
        app = app.merge(relay_routes);
    }

    app.fallback(not_found)
}

/// Bind 0.0.0.0:`port`
pub async fn bind(port: u16) -> std::io::Result<tokio::net::TcpListener> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    log::info!("🌐 HTTP server listening on http://0.0.0.0:{}", port);
    Ok(listener)
}

/// Serve `app` on an already bound listener until the task is dropped
pub async fn serve(listener: tokio::net::TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app).await
}

async fn ping() -> &'static str {
    PONG
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "error", "message": "Endpoint not found" })),
    )
}

async fn relay_media(State(target): State<Arc<RelayTarget>>, body: Bytes) -> impl IntoResponse {
    let request: RelayRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("⚠️  Malformed relay request: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body");
        }
    };

    let urls = request.urls();
    if urls.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "file_url or file_urls not provided");
    }

    let caption = request.caption.clone().unwrap_or_default();
    log::info!(
        "📨 Relay request with {} images from {} ({})",
        urls.len(),
        request.source_chat_name.as_deref().unwrap_or("unknown"),
        request.source_chat_id.as_deref().unwrap_or("unknown")
    );

    match target.publisher.publish(&target.channel_id, &urls, &caption).await {
        Ok(()) => {
            log::info!("✅ Relayed {} images to channel {}", urls.len(), target.channel_id);
            (
                StatusCode::OK,
                Json(json!({ "status": "success", "message": "Media sent to channel" })),
            )
        }
        Err(e) => {
            log::error!("❌ Relay to channel {} failed: {}", target.channel_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to publish media")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({ "status": "error", "message": message })))
}
