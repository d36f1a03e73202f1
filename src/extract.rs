//! Article content extraction.
//!
//! Extraction is a strategy, not a hard-coded scrape: the CSS selectors
//! that locate the body container and images come from the active
//! [`SourceProfile`](crate::config::SourceProfile), because upstream
//! markup drifts and no one selector list stays authoritative.
//!
//! The extracted text is normalized (invisible characters stripped,
//! whitespace collapsed) before it reaches the hasher, so the content hash
//! is stable for byte-identical article bodies.

use crate::config::SourceProfile;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use tracing::{debug, warn};
use url::Url;

static INVISIBLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{200B}-\u{200F}\u{FEFF}\u{00A0}]").unwrap());
static SPACE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static NEWLINE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Boilerplate paragraphs dropped from article bodies.
const NOISE_PARAGRAPHS: &[&str] = &["read more", "related news", "video", "see more"];

/// What extraction produced for one article page.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Normalized body text, paragraphs joined with `\n\n`.
    pub text: String,
    /// Absolute image URLs in document order, deduplicated.
    pub image_urls: Vec<String>,
}

impl Extraction {
    /// An article with zero recoverable content is not worth processing.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.image_urls.is_empty()
    }
}

/// Turns raw article markup into `(text, image_urls)`.
pub trait ExtractContent {
    fn extract(&self, html: &str) -> Extraction;
}

/// Selector-list-driven extractor configured from a source profile.
pub struct SelectorExtractor {
    content_selectors: Vec<Selector>,
    image_selectors: Vec<Selector>,
    paragraph: Selector,
    img: Selector,
    allowed_image_host: Option<String>,
}

impl SelectorExtractor {
    pub fn from_profile(profile: &SourceProfile) -> Result<Self, Box<dyn Error>> {
        let parse = |s: &str| -> Result<Selector, Box<dyn Error>> {
            Selector::parse(s).map_err(|e| format!("invalid selector {s:?}: {e}").into())
        };
        let content_selectors = profile
            .content_selectors
            .iter()
            .map(|s| parse(s))
            .collect::<Result<Vec<_>, Box<dyn Error>>>()?;
        let image_selectors = profile
            .image_selectors
            .iter()
            .map(|s| parse(s))
            .collect::<Result<Vec<_>, Box<dyn Error>>>()?;
        Ok(Self {
            content_selectors,
            image_selectors,
            paragraph: Selector::parse("p").unwrap(),
            img: Selector::parse("img").unwrap(),
            allowed_image_host: profile.allowed_image_host.clone(),
        })
    }

    fn image_allowed(&self, url: &str) -> bool {
        match &self.allowed_image_host {
            None => true,
            Some(host) => Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h == host))
                .unwrap_or(false),
        }
    }

    fn collect_images<'a>(&self, imgs: impl Iterator<Item = ElementRef<'a>>) -> Vec<String> {
        imgs.filter_map(|img| extract_img_url(&img))
            .filter(|u| self.image_allowed(u))
            .unique()
            .collect()
    }
}

impl ExtractContent for SelectorExtractor {
    fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);

        let container = self
            .content_selectors
            .iter()
            .find_map(|sel| document.select(sel).next());

        let text = match container {
            Some(node) => {
                let paras: Vec<String> = node
                    .select(&self.paragraph)
                    .map(|p| p.text().collect::<String>().trim().to_string())
                    .filter(|p| !p.is_empty())
                    .filter(|p| !NOISE_PARAGRAPHS.contains(&p.to_lowercase().as_str()))
                    .collect();
                normalize_text(&paras.join("\n\n"))
            }
            None => {
                warn!("No content container matched any configured selector");
                String::new()
            }
        };

        // Images inside the body container first; site-specific gallery
        // blocks as a fallback.
        let mut image_urls = match container {
            Some(node) => self.collect_images(node.select(&self.img)),
            None => Vec::new(),
        };
        if image_urls.is_empty() {
            image_urls = self.collect_images(
                self.image_selectors
                    .iter()
                    .flat_map(|sel| document.select(sel)),
            );
        }

        debug!(
            text_bytes = text.len(),
            images = image_urls.len(),
            "Extracted article content"
        );
        Extraction { text, image_urls }
    }
}

/// Pick the best URL out of an `<img>` tag's lazy-loading attributes.
///
/// Srcset values keep only the first candidate; query strings are dropped;
/// relative URLs are skipped.
fn extract_img_url(img: &ElementRef<'_>) -> Option<String> {
    for attr in ["data-src", "data-lazy-src", "data-srcset", "srcset", "src"] {
        let Some(val) = img.value().attr(attr) else {
            continue;
        };
        let Some(first) = val.split_whitespace().next() else {
            continue;
        };
        if !first.starts_with("http://") && !first.starts_with("https://") {
            continue;
        }
        let clean = first.split('?').next().unwrap_or(first);
        return Some(clean.trim_end_matches(',').to_string());
    }
    None
}

/// Strip invisible characters, collapse space runs and 3+ newlines.
pub fn normalize_text(text: &str) -> String {
    let no_invisible = INVISIBLE_RE.replace_all(text, "");
    let single_spaced = SPACE_RUN_RE.replace_all(&no_invisible, " ");
    NEWLINE_RUN_RE
        .replace_all(&single_spaced, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceProfile;

    fn extractor() -> SelectorExtractor {
        let profile = SourceProfile {
            allowed_image_host: Some("img.example.org".to_string()),
            ..SourceProfile::default()
        };
        SelectorExtractor::from_profile(&profile).unwrap()
    }

    const PAGE: &str = r#"
<html><body>
  <article class="fck_detail">
    <p>First paragraph of the story.</p>
    <p>Read More</p>
    <p>Second   paragraph with doubled  spaces.</p>
    <img data-src="https://img.example.org/a.jpg?w=1200&h=800">
    <img src="https://img.example.org/b.webp">
    <img src="https://cdn.elsewhere.net/tracking.gif">
    <img src="/relative/path.jpg">
    <img src="https://img.example.org/a.jpg?w=300">
  </article>
</body></html>"#;

    #[test]
    fn test_extracts_paragraphs_and_filters_noise() {
        let extraction = extractor().extract(PAGE);
        assert_eq!(
            extraction.text,
            "First paragraph of the story.\n\nSecond paragraph with doubled spaces."
        );
    }

    #[test]
    fn test_image_urls_filtered_and_deduplicated() {
        let extraction = extractor().extract(PAGE);
        // Query strings stripped, foreign host and relative URL dropped,
        // the twice-referenced image kept once.
        assert_eq!(
            extraction.image_urls,
            vec![
                "https://img.example.org/a.jpg".to_string(),
                "https://img.example.org/b.webp".to_string(),
            ]
        );
    }

    #[test]
    fn test_selector_fallback_order() {
        let html = r#"<div class="detail-content"><p>Fallback body.</p></div>"#;
        let extraction = extractor().extract(html);
        assert_eq!(extraction.text, "Fallback body.");
    }

    #[test]
    fn test_gallery_selector_fallback_for_images() {
        let html = r#"
<article class="fck_detail"><p>Body only.</p></article>
<div class="item_slide_show"><img src="https://img.example.org/slide.jpg"></div>"#;
        let extraction = extractor().extract(html);
        assert_eq!(
            extraction.image_urls,
            vec!["https://img.example.org/slide.jpg".to_string()]
        );
    }

    #[test]
    fn test_no_container_yields_empty_extraction() {
        let extraction = extractor().extract("<html><body><p>stray</p></body></html>");
        assert!(extraction.is_empty());
    }

    #[test]
    fn test_normalize_text_strips_invisible_and_collapses() {
        let raw = "a\u{200B}b\u{FEFF}c\u{00A0}d  e\tf\n\n\n\ng";
        assert_eq!(normalize_text(raw), "abcd e f\n\ng");
    }

    #[test]
    fn test_normalized_text_is_hash_stable() {
        let a = normalize_text("Same  body\n\n\ntext");
        let b = normalize_text("Same  body\n\n\ntext");
        assert_eq!(
            crate::utils::sha256_hex(&a),
            crate::utils::sha256_hex(&b)
        );
    }
}
