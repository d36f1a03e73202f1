//! HTTP fetch layer.
//!
//! One explicitly constructed [`HttpClient`] is built at startup and passed
//! into the pipeline; there is no module-level session object. Fetches
//! classify failures for the shared retry policy: timeouts, connection
//! errors, and 5xx are transient; 4xx (except 429) are terminal; 429
//! carries the server-specified wait.

use crate::retry::{RetryClass, RetryPolicy, with_retry};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from fetching a URL, shaped for retry classification.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: u16,
        retry_after: Option<u64>,
    },
}

impl FetchError {
    pub fn retry_class(&self) -> RetryClass {
        match self {
            FetchError::Request { .. } => RetryClass::Transient,
            FetchError::Status { status, retry_after, .. } => match status {
                429 => RetryClass::RateLimited(retry_after.unwrap_or(5)),
                400..=499 => RetryClass::Terminal,
                _ => RetryClass::Transient,
            },
        }
    }
}

/// Fetch a URL as text. Implemented by [`HttpClient`]; test code provides
/// canned responses.
pub trait FetchText {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetch a URL as raw bytes (images).
pub trait FetchBytes {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Shared HTTP client with browser-like headers and retrying fetches.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpClient {
    pub fn new(policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        let inner = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()?;
        Ok(Self { inner, policy })
    }

    async fn get_checked(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                retry_after,
            });
        }
        Ok(resp)
    }
}

impl FetchText for HttpClient {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        with_retry(&self.policy, "fetch_text", FetchError::retry_class, || async move {
            let resp = self.get_checked(url).await?;
            let body = resp.text().await.map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
            debug!(%url, bytes = body.len(), "Fetched page");
            Ok(body)
        })
        .await
    }
}

impl FetchBytes for HttpClient {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        with_retry(&self.policy, "fetch_bytes", FetchError::retry_class, || async move {
            let resp = self.get_checked(url).await?;
            let body = resp.bytes().await.map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
            debug!(%url, bytes = body.len(), "Fetched bytes");
            Ok(body.to_vec())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: u16, retry_after: Option<u64>) -> FetchError {
        FetchError::Status {
            url: "https://example.net/x".to_string(),
            status,
            retry_after,
        }
    }

    #[test]
    fn test_5xx_is_transient() {
        assert_eq!(status_error(502, None).retry_class(), RetryClass::Transient);
    }

    #[test]
    fn test_4xx_is_terminal() {
        assert_eq!(status_error(404, None).retry_class(), RetryClass::Terminal);
        assert_eq!(status_error(403, None).retry_class(), RetryClass::Terminal);
    }

    #[test]
    fn test_429_honors_retry_after() {
        assert_eq!(
            status_error(429, Some(17)).retry_class(),
            RetryClass::RateLimited(17)
        );
        // Missing header falls back to a short default wait.
        assert_eq!(
            status_error(429, None).retry_class(),
            RetryClass::RateLimited(5)
        );
    }
}
