//! Best-effort text translation.
//!
//! Translation failure is an expected, frequent, non-fatal outcome, so the
//! boundary callers see is [`Translation`] — translated text or the
//! original — never an error. The fallible provider call sits behind the
//! [`Translate`] trait and is retried through the shared policy before the
//! fallback kicks in.

use crate::retry::{RetryClass, RetryPolicy, with_retry};
use std::error::Error;
use tracing::{debug, warn};

/// Outcome of a translation attempt: either the translated text, or the
/// original carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    Translated(String),
    Original(String),
}

impl Translation {
    pub fn into_text(self) -> String {
        match self {
            Translation::Translated(t) | Translation::Original(t) => t,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Translation::Translated(_))
    }
}

/// A fallible translation provider.
pub trait Translate {
    async fn translate(&self, text: &str, to_lang: &str) -> Result<String, Box<dyn Error>>;
}

/// Translate `text`, retrying the provider up to the policy's attempts
/// with backoff; exhausted retries fall back to the original text.
pub async fn translate_or_original<T: Translate>(
    provider: &T,
    text: &str,
    to_lang: &str,
    policy: &RetryPolicy,
) -> Translation {
    if text.trim().is_empty() || to_lang.is_empty() {
        return Translation::Original(text.to_string());
    }
    let result = with_retry(
        policy,
        "translate",
        |_e: &Box<dyn Error>| RetryClass::Transient,
        || async move { provider.translate(text, to_lang).await },
    )
    .await;
    match result {
        Ok(translated) => {
            debug!(to_lang, bytes = translated.len(), "Translated text");
            Translation::Translated(translated)
        }
        Err(e) => {
            warn!(to_lang, error = %e, "Translation unavailable; using original text");
            Translation::Original(text.to_string())
        }
    }
}

/// HTTP translation provider speaking the unofficial single-call endpoint.
///
/// The endpoint returns a nested JSON array whose first element lists
/// translated segments; everything else is ignored.
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    client: reqwest::Client,
    endpoint: String,
    from_lang: String,
}

const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

impl HttpTranslator {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            from_lang: "en".to_string(),
        }
    }

    fn request_url(&self, text: &str, to_lang: &str) -> String {
        format!(
            "{}?client=gtx&dt=t&sl={}&tl={}&q={}",
            self.endpoint,
            self.from_lang,
            to_lang,
            urlencoding::encode(text)
        )
    }
}

impl Translate for HttpTranslator {
    async fn translate(&self, text: &str, to_lang: &str) -> Result<String, Box<dyn Error>> {
        let url = self.request_url(text, to_lang);
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let body: serde_json::Value = resp.json().await?;
        let segments = body
            .get(0)
            .and_then(|v| v.as_array())
            .ok_or("unexpected translation response shape")?;
        let mut out = String::new();
        for segment in segments {
            if let Some(part) = segment.get(0).and_then(|v| v.as_str()) {
                out.push_str(part);
            }
        }
        if out.trim().is_empty() {
            return Err("translator returned empty text".into());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FlakyTranslator {
        fail_first: usize,
        calls: AtomicUsize,
    }

    impl Translate for FlakyTranslator {
        async fn translate(&self, text: &str, _to: &str) -> Result<String, Box<dyn Error>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err("provider unavailable".into())
            } else {
                Ok(format!("[ru] {text}"))
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_translates_after_transient_failure() {
        let provider = FlakyTranslator {
            fail_first: 2,
            calls: AtomicUsize::new(0),
        };
        let result = translate_or_original(&provider, "hello", "ru", &fast_policy()).await;
        assert_eq!(result, Translation::Translated("[ru] hello".to_string()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_falls_back_to_original_after_exhaustion() {
        let provider = FlakyTranslator {
            fail_first: 10,
            calls: AtomicUsize::new(0),
        };
        let result = translate_or_original(&provider, "hello", "ru", &fast_policy()).await;
        assert_eq!(result, Translation::Original("hello".to_string()));
        assert!(!result.succeeded());
        // Bounded attempts, then gave up.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_target_language_skips_provider() {
        let provider = FlakyTranslator {
            fail_first: 0,
            calls: AtomicUsize::new(0),
        };
        let result = translate_or_original(&provider, "hello", "", &fast_policy()).await;
        assert_eq!(result, Translation::Original("hello".to_string()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_request_url_encodes_query() {
        let t = HttpTranslator::new(reqwest::Client::new());
        let url = t.request_url("a b&c", "ru");
        assert!(url.contains("tl=ru"));
        assert!(url.contains("q=a%20b%26c"));
    }
}
