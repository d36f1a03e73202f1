//! Data models for feed entries, on-disk article records, and catalog
//! entries.
//!
//! - [`ArticleDescriptor`]: one upstream article as discovered from a feed
//!   or index page, before its full content is fetched
//! - [`ArticleMeta`]: the persisted `meta.json` record owned by the
//!   pipeline and read (never mutated) by the publisher
//! - [`CatalogEntry`]: the minimal `{id, hash, translated_to}` projection
//!   kept in the catalog for change detection

use crate::utils::sha256_hex;
use serde::{Deserialize, Serialize};

/// An upstream article as discovered, carrying only feed-level fields.
///
/// Identity is the feed's own guid when present; otherwise a SHA-256 of
/// the canonical link so the same upstream item maps to the same id on
/// every run.
#[derive(Debug, Clone)]
pub struct ArticleDescriptor {
    /// Stable identity: feed guid, or SHA-256 of the link when absent.
    pub id: String,
    /// Absolute URL of the full article.
    pub link: String,
    /// Title as published in the feed; may be empty for index-discovered
    /// articles.
    pub title: String,
    /// Short description/teaser from the feed, if any.
    pub description: String,
    /// Publication date in `YYYY-MM-DD`, when the feed supplied one.
    pub published: Option<String>,
}

impl ArticleDescriptor {
    /// Build a descriptor from feed fields, deriving the id from the link
    /// when the guid is missing or blank.
    pub fn from_feed_fields(
        guid: Option<String>,
        link: String,
        title: String,
        description: String,
        published: Option<String>,
    ) -> Self {
        let id = match guid {
            Some(g) if !g.trim().is_empty() => g.trim().to_string(),
            _ => sha256_hex(&link),
        };
        Self {
            id,
            link,
            title,
            description,
            published,
        }
    }

    /// Best-effort title: the feed title when present, otherwise the last
    /// path segment of the link with hyphens spaced out.
    pub fn display_title(&self) -> String {
        if !self.title.trim().is_empty() {
            return self.title.trim().to_string();
        }
        let segment = self
            .link
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("untitled");
        let segment = segment
            .trim_end_matches(".html")
            .trim_end_matches(".htm");
        segment.replace('-', " ")
    }
}

/// The on-disk record for one processed article
/// (`articles/<id>_<slug>/meta.json`).
///
/// The `posted` flag is informational only; actual publish state lives in
/// the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleMeta {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub date: Option<String>,
    pub link: String,
    pub title: String,
    /// Path to the text the publisher should send (translated when a
    /// translation was produced, original otherwise).
    pub text_file: String,
    pub images: Vec<String>,
    #[serde(default)]
    pub posted: bool,
    pub hash: String,
    #[serde(default)]
    pub translated_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ArticleMeta {
    /// Minimal catalog projection of this record.
    pub fn to_catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            id: self.id.clone(),
            hash: self.hash.clone(),
            translated_to: self.translated_to.clone(),
        }
    }
}

/// Minimal persisted record per article, intentionally stripped of
/// transient fields to bound catalog growth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub translated_to: String,
}
