//! Application configuration: source profiles and publish settings.
//!
//! Extraction heuristics are deliberately data, not code. Upstream sites
//! change their markup, so the CSS selector lists that locate article
//! content and images live in a YAML profile that can be edited without a
//! rebuild. A missing config file falls back to the built-in defaults.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use tracing::info;

/// Where and how to discover and extract articles for one upstream source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceProfile {
    pub name: String,
    /// Base URL used to resolve relative links from index pages.
    pub base_url: String,
    /// RSS feed URL; when set, discovery goes through the feed.
    pub rss_url: Option<String>,
    /// Index pages to scan for article links when no feed is configured.
    pub index_pages: Vec<String>,
    /// Selector matching article anchors on index pages.
    pub link_selector: String,
    /// Candidate selectors for the article body container, tried in order.
    pub content_selectors: Vec<String>,
    /// Fallback selectors for images outside the body container.
    pub image_selectors: Vec<String>,
    /// When set, only image URLs on this host are kept.
    pub allowed_image_host: Option<String>,
}

impl Default for SourceProfile {
    fn default() -> Self {
        Self {
            name: "vnexpress".to_string(),
            base_url: "https://e.vnexpress.net".to_string(),
            rss_url: Some("https://e.vnexpress.net/rss/news.rss".to_string()),
            index_pages: Vec::new(),
            link_selector: "article a[href]".to_string(),
            content_selectors: vec![
                "article.fck_detail".to_string(),
                "div.detail-content".to_string(),
                "div.main_content_detail".to_string(),
            ],
            image_selectors: vec![
                ".img_general img".to_string(),
                ".item_slide_show img".to_string(),
                ".photo img".to_string(),
            ],
            allowed_image_host: Some("i-vnexpress.vnecdn.net".to_string()),
        }
    }
}

/// An inline link button attached to the final message chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

/// Publisher-side settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Watermark image composited onto each photo; skipped when missing.
    pub watermark: Option<String>,
    /// Buttons for the final chunk of every article.
    pub buttons: Vec<LinkButton>,
    /// Maximum characters per text message.
    pub chunk_size: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            watermark: Some("watermark.png".to_string()),
            buttons: Vec::new(),
            chunk_size: 4096,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceProfile,
    pub publish: PublishConfig,
}

impl AppConfig {
    /// Load from a YAML file, or fall back to defaults when no path is
    /// given. A path that exists but fails to parse is an error; bad
    /// selectors should not silently degrade into the defaults.
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(Path::new(p))?;
                let config: AppConfig = serde_yaml::from_str(&raw)?;
                info!(path = %p, source = %config.source.name, "Loaded configuration");
                Ok(config)
            }
            None => Ok(AppConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_has_selectors() {
        let config = AppConfig::default();
        assert!(!config.source.content_selectors.is_empty());
        assert!(config.source.rss_url.is_some());
        assert_eq!(config.publish.chunk_size, 4096);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
source:
  name: example
  base_url: https://news.example.org
  rss_url: https://news.example.org/feed.xml
publish:
  buttons:
    - text: "Feedback"
      url: "https://t.me/example_feedback"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.source.name, "example");
        // Unset fields come from the profile defaults.
        assert!(!config.source.content_selectors.is_empty());
        assert_eq!(config.publish.buttons.len(), 1);
        assert_eq!(config.publish.chunk_size, 4096);
    }

    #[test]
    fn test_index_page_profile() {
        let yaml = r#"
source:
  name: example
  base_url: https://news.example.org
  rss_url: null
  index_pages:
    - https://news.example.org/world
    - https://news.example.org/world/page/2
  link_selector: ".title-news a[href]"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.source.rss_url.is_none());
        assert_eq!(config.source.index_pages.len(), 2);
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.source.name, "vnexpress");
    }
}
