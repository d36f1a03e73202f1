//! RSS feed parsing.
//!
//! Turns an RSS 2.0 document into [`ArticleDescriptor`]s. Only the item
//! fields the pipeline needs are read: guid, link, title, description, and
//! pubDate. Items without a guid get a deterministic id derived from the
//! link so identity is stable across runs.

use crate::models::ArticleDescriptor;
use chrono::DateTime;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::error::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct ItemFields {
    guid: Option<String>,
    link: String,
    title: String,
    description: String,
    pub_date: Option<String>,
}

impl ItemFields {
    fn into_descriptor(self) -> ArticleDescriptor {
        let published = self.pub_date.as_deref().and_then(parse_pub_date);
        ArticleDescriptor::from_feed_fields(
            self.guid,
            self.link,
            self.title,
            self.description,
            published,
        )
    }
}

/// Parse an RSS pubDate (RFC 2822, with an RFC 3339 fallback) into
/// `YYYY-MM-DD`.
fn parse_pub_date(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc2822(raw.trim())
        .or_else(|_| DateTime::parse_from_rfc3339(raw.trim()))
        .ok()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// Parse an RSS document into descriptors, newest-first as the feed lists
/// them, capped at `limit` when given.
///
/// Malformed XML past the last complete item is tolerated: everything
/// parsed up to the error is returned with a warning, matching the
/// "best-effort feed" posture of the rest of the pipeline.
pub fn parse_feed(xml: &str, limit: Option<usize>) -> Result<Vec<ArticleDescriptor>, Box<dyn Error>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut descriptors = Vec::new();
    let mut current: Option<ItemFields> = None;
    let mut field: Option<String> = None;

    loop {
        if let Some(max) = limit {
            if descriptors.len() >= max {
                break;
            }
        }
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "item" {
                    current = Some(ItemFields::default());
                } else if current.is_some() {
                    field = Some(name);
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(item), Some(name)) = (current.as_mut(), field.as_deref()) {
                    let text = t
                        .unescape()
                        .map(|cow| cow.trim().to_string())
                        .unwrap_or_default();
                    append_field(item, name, &text);
                }
            }
            Ok(Event::CData(t)) => {
                if let (Some(item), Some(name)) = (current.as_mut(), field.as_deref()) {
                    let text = String::from_utf8_lossy(&t.into_inner()).trim().to_string();
                    append_field(item, name, &text);
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "item" {
                    if let Some(item) = current.take() {
                        if item.link.is_empty() {
                            warn!(title = %item.title, "Feed item has no link; dropping");
                        } else {
                            let descriptor = item.into_descriptor();
                            debug!(id = %descriptor.id, title = %descriptor.title, "Found feed entry");
                            descriptors.push(descriptor);
                        }
                    }
                } else {
                    field = None;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, parsed = descriptors.len(), "Feed has XML errors; keeping entries parsed so far");
                break;
            }
        }
    }

    info!(count = descriptors.len(), "Parsed feed entries");
    Ok(descriptors)
}

fn append_field(item: &mut ItemFields, name: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    match name {
        "guid" => item.guid = Some(text.to_string()),
        "link" => item.link = text.to_string(),
        "title" => item.title = text.to_string(),
        "description" => item.description = text.to_string(),
        "pubDate" => item.pub_date = Some(text.to_string()),
        _ => {}
    }
}
