//! Article discovery: turn a source profile into a batch of descriptors.
//!
//! Two modes, chosen by the profile: an RSS feed (preferred, richer
//! metadata) or scraping anchors off one or more HTML index pages for
//! sources without a feed. Index-discovered articles carry no feed
//! metadata; their ids derive from the canonical link.

use crate::client::FetchText;
use crate::config::SourceProfile;
use crate::feed;
use crate::models::ArticleDescriptor;
use itertools::Itertools;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{info, instrument, warn};
use url::Url;

/// Discover up to `limit` articles for `profile`.
///
/// A feed that cannot be fetched yields an empty batch (the run simply
/// finds nothing new), matching the transient-I/O posture elsewhere.
#[instrument(level = "info", skip_all, fields(source = %profile.name))]
pub async fn discover_articles<F: FetchText>(
    fetcher: &F,
    profile: &SourceProfile,
    limit: Option<usize>,
) -> Result<Vec<ArticleDescriptor>, Box<dyn Error>> {
    if let Some(rss_url) = &profile.rss_url {
        let xml = match fetcher.fetch_text(rss_url).await {
            Ok(xml) => xml,
            Err(e) => {
                warn!(%rss_url, error = %e, "Feed fetch failed; nothing to process");
                return Ok(Vec::new());
            }
        };
        return feed::parse_feed(&xml, limit);
    }

    index_articles(fetcher, profile, limit).await
}

/// Scrape article links from the profile's index pages.
async fn index_articles<F: FetchText>(
    fetcher: &F,
    profile: &SourceProfile,
    limit: Option<usize>,
) -> Result<Vec<ArticleDescriptor>, Box<dyn Error>> {
    let base_url = Url::parse(&profile.base_url)?;
    let selector = Selector::parse(&profile.link_selector)
        .map_err(|e| format!("invalid link selector {:?}: {e}", profile.link_selector))?;

    let mut links: Vec<String> = Vec::new();
    for page_url in &profile.index_pages {
        let html = match fetcher.fetch_text(page_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(%page_url, error = %e, "Index page fetch failed; skipping page");
                continue;
            }
        };
        let document = Html::parse_document(&html);
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if href.starts_with('#') || href.starts_with("javascript:") {
                continue;
            }
            let Ok(resolved) = base_url.join(href) else {
                continue;
            };
            // Keep it on the source's site; index pages love to link out.
            if resolved.host_str() != base_url.host_str() {
                continue;
            }
            links.push(resolved.to_string());
        }
    }

    let descriptors: Vec<ArticleDescriptor> = links
        .into_iter()
        .unique()
        .take(limit.unwrap_or(usize::MAX))
        .map(|link| {
            ArticleDescriptor::from_feed_fields(None, link, String::new(), String::new(), None)
        })
        .collect();

    info!(count = descriptors.len(), "Indexed article links");
    Ok(descriptors)
}
