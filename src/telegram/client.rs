//! Bot API client over reqwest
//!
//! Endpoint: {api_url}/bot{token}/{method}, JSON bodies, answers wrapped in
//! `{"ok": bool, "result": ...}`. Files are served from
//! {api_url}/file/bot{token}/{file_path}.

use super::types::{ApiResponse, File, InputMediaPhoto, Update};
use crate::aggregator_core::backend::{FailureNotifier, FileResolver, ResolveError};
use crate::server::MediaPublisher;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

/// Generic text sent when an upload could not be delivered downstream
pub const FAILURE_NOTICE: &str = "Something went wrong while processing your images. Please try again later.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum TelegramError {
    /// Transport failure; the URL (which embeds the token) is stripped
    Http(reqwest::Error),
    Api { code: Option<i64>, description: String },
    MissingResult(&'static str),
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        TelegramError::Http(err.without_url())
    }
}

impl std::fmt::Display for TelegramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelegramError::Http(e) => write!(f, "HTTP error: {}", e),
            TelegramError::Api { code, description } => match code {
                Some(code) => write!(f, "Bot API error {}: {}", code, description),
                None => write!(f, "Bot API error: {}", description),
            },
            TelegramError::MissingResult(method) => write!(f, "Bot API returned no result for {}", method),
        }
    }
}

impl std::error::Error for TelegramError {}

pub struct TelegramClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// Download URL for a `file_path` returned by getFile
    pub fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_url, self.token, file_path)
    }

    async fn call<B, T>(&self, method: &'static str, body: &B, timeout: Option<Duration>) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response: ApiResponse<T> = request.send().await?.json().await?;

        if !response.ok {
            return Err(TelegramError::Api {
                code: response.error_code,
                description: response.description.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        response.result.ok_or(TelegramError::MissingResult(method))
    }

    /// Long-poll for updates newer than `offset`
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });

        // Leave headroom over the server-side long-poll window
        let timeout = Duration::from_secs(timeout_secs) + Duration::from_secs(10);
        self.call("getUpdates", &body, Some(timeout)).await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, TelegramError> {
        self.call("getFile", &json!({ "file_id": file_id }), None).await
    }

    pub async fn send_message<C>(&self, chat_id: C, text: &str) -> Result<(), TelegramError>
    where
        C: Serialize + Send + Sync,
    {
        let _: serde_json::Value = self
            .call("sendMessage", &json!({ "chat_id": chat_id, "text": text }), None)
            .await?;
        Ok(())
    }

    pub async fn send_photo<C>(&self, chat_id: C, photo_url: &str, caption: &str) -> Result<(), TelegramError>
    where
        C: Serialize + Send + Sync,
    {
        let body = json!({ "chat_id": chat_id, "photo": photo_url, "caption": caption });
        let _: serde_json::Value = self.call("sendPhoto", &body, None).await?;
        Ok(())
    }

    pub async fn send_media_group<C>(&self, chat_id: C, media: Vec<InputMediaPhoto>) -> Result<(), TelegramError>
    where
        C: Serialize + Send + Sync,
    {
        let body = json!({ "chat_id": chat_id, "media": media });
        let _: serde_json::Value = self.call("sendMediaGroup", &body, None).await?;
        Ok(())
    }
}

#[async_trait]
impl FileResolver for TelegramClient {
    async fn resolve(&self, file_ref: &str) -> Result<String, ResolveError> {
        match self.get_file(file_ref).await {
            Ok(File { file_path: Some(path), .. }) => Ok(self.file_url(&path)),
            Ok(File { file_path: None, .. }) => Err(ResolveError::NotFound(format!("{} has no file_path", file_ref))),
            Err(TelegramError::Http(e)) => Err(ResolveError::Transport(e.to_string())),
            Err(e) => Err(ResolveError::NotFound(e.to_string())),
        }
    }
}

#[async_trait]
impl FailureNotifier for TelegramClient {
    async fn notify_failure(&self, chat_id: i64) {
        if let Err(e) = self.send_message(chat_id, FAILURE_NOTICE).await {
            log::warn!("⚠️  Could not send failure notice to chat {}: {}", chat_id, e);
        }
    }
}

#[async_trait]
impl MediaPublisher for TelegramClient {
    async fn publish(&self, channel_id: &str, file_urls: &[String], caption: &str) -> Result<(), TelegramError> {
        match file_urls {
            [] => Ok(()),
            [single] => self.send_photo(channel_id, single, caption).await,
            many => {
                let media = many
                    .iter()
                    .enumerate()
                    .map(|(i, url)| {
                        let caption = (i == 0).then(|| caption.to_string());
                        InputMediaPhoto::new(url.clone(), caption)
                    })
                    .collect();
                self.send_media_group(channel_id, media).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_embed_token() {
        let client = TelegramClient::new("https://api.telegram.org/", "123:abc").unwrap();
        assert_eq!(client.method_url("getMe"), "https://api.telegram.org/bot123:abc/getMe");
        assert_eq!(
            client.file_url("photos/file_1.jpg"),
            "https://api.telegram.org/file/bot123:abc/photos/file_1.jpg"
        );
    }

    #[test]
    fn test_api_error_display() {
        let err = TelegramError::Api {
            code: Some(400),
            description: "Bad Request: wrong file_id".to_string(),
        };
        assert_eq!(err.to_string(), "Bot API error 400: Bad Request: wrong file_id");
    }
}
