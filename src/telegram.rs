//! Telegram delivery transport.
//!
//! Two calls matter: `sendMediaGroup` for the photo album and
//! `sendMessage` for HTML-formatted text chunks. Both go through the
//! shared retry policy; HTTP 429 responses carry a `retry_after` in the
//! response body that is honored before the next attempt, non-429 4xx
//! responses are terminal for the call.

use crate::config::LinkButton;
use crate::retry::{RetryClass, RetryPolicy, with_retry};
use crate::utils::truncate_for_log;
use thiserror::Error;
use tracing::{info, warn};

/// Telegram caps a media group at this many attachments.
pub const MEDIA_GROUP_LIMIT: usize = 10;

/// One photo prepared for upload.
#[derive(Debug, Clone)]
pub struct Photo {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("transport returned {status}: {body}")]
    Rejected {
        status: u16,
        body: String,
        retry_after: Option<u64>,
    },
}

impl TransportError {
    pub fn retry_class(&self) -> RetryClass {
        match self {
            TransportError::Request(_) => RetryClass::Transient,
            TransportError::Rejected { status, retry_after, .. } => match status {
                429 => RetryClass::RateLimited(retry_after.unwrap_or(5)),
                400..=499 => RetryClass::Terminal,
                _ => RetryClass::Transient,
            },
        }
    }
}

/// The delivery side the publisher talks to. Production uses
/// [`TelegramClient`]; tests substitute a scripted transport.
pub trait Transport {
    async fn send_album(&self, photos: &[Photo]) -> Result<(), TransportError>;
    async fn send_text(&self, text: &str, buttons: &[LinkButton]) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    token: String,
    chat_id: String,
    policy: RetryPolicy,
}

impl TelegramClient {
    pub fn new(http: reqwest::Client, token: String, chat_id: String, policy: RetryPolicy) -> Self {
        Self {
            http,
            token,
            chat_id,
            policy,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.token, method)
    }

    async fn check(resp: reqwest::Response) -> Result<(), TransportError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(TransportError::Rejected {
            status: status.as_u16(),
            retry_after: parse_retry_after(&body),
            body: truncate_for_log(&body, 300),
        })
    }
}

impl Transport for TelegramClient {
    async fn send_album(&self, photos: &[Photo]) -> Result<(), TransportError> {
        if photos.is_empty() {
            warn!("No photos to send in media group");
            return Ok(());
        }
        let photos = if photos.len() > MEDIA_GROUP_LIMIT {
            warn!(
                count = photos.len(),
                limit = MEDIA_GROUP_LIMIT,
                "Media group over the attachment limit; extra photos dropped"
            );
            &photos[..MEDIA_GROUP_LIMIT]
        } else {
            photos
        };

        let url = self.method_url("sendMediaGroup");
        let media = media_payload(photos.len());

        with_retry(&self.policy, "sendMediaGroup", TransportError::retry_class, || {
            let url = url.clone();
            let media = media.clone();
            async move {
                let mut form = reqwest::multipart::Form::new()
                    .text("chat_id", self.chat_id.clone())
                    .text("media", media);
                for (idx, photo) in photos.iter().enumerate() {
                    let part = reqwest::multipart::Part::bytes(photo.bytes.clone())
                        .file_name(photo.filename.clone())
                        .mime_str("image/png")?;
                    form = form.part(format!("file{idx}"), part);
                }
                let resp = self.http.post(&url).multipart(form).send().await?;
                Self::check(resp).await
            }
        })
        .await?;

        info!(count = photos.len(), "Sent media group");
        Ok(())
    }

    async fn send_text(&self, text: &str, buttons: &[LinkButton]) -> Result<(), TransportError> {
        let url = self.method_url("sendMessage");
        let mut payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if !buttons.is_empty() {
            payload["reply_markup"] = keyboard_payload(buttons);
        }

        with_retry(&self.policy, "sendMessage", TransportError::retry_class, || {
            let payload = payload.clone();
            let url = url.clone();
            async move {
                let resp = self.http.post(&url).json(&payload).send().await?;
                Self::check(resp).await
            }
        })
        .await
    }
}

/// `media` field for sendMediaGroup: photo entries referencing the
/// attached multipart files.
fn media_payload(count: usize) -> String {
    let items: Vec<serde_json::Value> = (0..count)
        .map(|idx| {
            serde_json::json!({
                "type": "photo",
                "media": format!("attach://file{idx}"),
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

/// Single-row inline keyboard.
fn keyboard_payload(buttons: &[LinkButton]) -> serde_json::Value {
    let row: Vec<serde_json::Value> = buttons
        .iter()
        .map(|b| serde_json::json!({"text": b.text, "url": b.url}))
        .collect();
    serde_json::json!({ "inline_keyboard": [row] })
}

/// Pull `parameters.retry_after` out of a 429 response body.
fn parse_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("parameters")?
        .get("retry_after")?
        .as_u64()
}
