//! The publisher: deliver processed articles that are not yet in the
//! posted-state ledger.
//!
//! Selection is deterministic (ids ascending), delivery is sequential and
//! throttled. An article is marked delivered only when every text chunk
//! was accepted; images alone do not count, so a half-delivered article is
//! retried wholesale on the next run. Image-level delivery tracking does
//! not exist on purpose — re-uploading an album is cheap, losing text is
//! not.

use crate::config::LinkButton;
use crate::format::{chunk_text, escape_html};
use crate::ledger::Ledger;
use crate::models::ArticleMeta;
use crate::telegram::{Photo, Transport};
use crate::utils::compare_ids;
use crate::watermark::prepare_photo_bytes;
use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// An article validated and ready to send.
#[derive(Debug)]
struct PreparedArticle {
    id: String,
    title: String,
    text_path: PathBuf,
    image_paths: Vec<PathBuf>,
}

pub struct Publisher<'a, T: Transport> {
    transport: &'a T,
    delay: Duration,
    limit: Option<usize>,
    watermark: Option<PathBuf>,
    buttons: Vec<LinkButton>,
    chunk_size: usize,
}

impl<'a, T: Transport> Publisher<'a, T> {
    pub fn new(
        transport: &'a T,
        delay: Duration,
        limit: Option<usize>,
        watermark: Option<PathBuf>,
        buttons: Vec<LinkButton>,
        chunk_size: usize,
    ) -> Self {
        Self {
            transport,
            delay,
            limit,
            watermark,
            buttons,
            chunk_size,
        }
    }

    /// Deliver pending articles from `parsed_dir`, appending successfully
    /// delivered ids to the ledger. Returns how many articles were sent.
    #[instrument(level = "info", skip_all, fields(dir = %parsed_dir.display()))]
    pub async fn run(&self, parsed_dir: &Path, ledger: &Ledger) -> Result<usize, Box<dyn Error>> {
        let posted_old = ledger.load();
        info!(count = posted_old.len(), "Loaded previously posted ids");

        let mut candidates = collect_candidates(parsed_dir, &posted_old);
        if candidates.is_empty() {
            info!("No new articles to publish");
            return Ok(0);
        }
        candidates.sort_by(|a, b| compare_ids(&a.id, &b.id));
        info!(count = candidates.len(), "Articles pending publication");

        let mut new_ids: HashSet<String> = HashSet::new();
        let mut sent = 0usize;

        for article in &candidates {
            if let Some(limit) = self.limit {
                if sent >= limit {
                    info!(limit, "Batch limit reached; stopping");
                    break;
                }
            }

            info!(id = %article.id, "Publishing article");
            if self.deliver_article(article).await {
                new_ids.insert(article.id.clone());
                sent += 1;
                info!(id = %article.id, "Published");
            } else {
                warn!(id = %article.id, "Delivery incomplete; will retry on a future run");
            }

            tokio::time::sleep(self.delay).await;
        }

        let all_ids: HashSet<String> = posted_old.union(&new_ids).cloned().collect();
        ledger.save(&all_ids)?;
        info!(sent, total_posted = all_ids.len(), "Publisher run complete");
        Ok(sent)
    }

    /// Send one article: album first (best-effort), then every text chunk.
    /// True only when all chunks were accepted.
    async fn deliver_article(&self, article: &PreparedArticle) -> bool {
        if !article.image_paths.is_empty() {
            let photos = self.prepare_photos(&article.image_paths);
            if photos.is_empty() {
                warn!(id = %article.id, "No usable photos after preparation");
            } else if let Err(e) = self.transport.send_album(&photos).await {
                // Text is still worth sending on its own.
                warn!(id = %article.id, error = %e, "Album delivery failed; sending text only");
            }
        }

        let raw_text = match std::fs::read_to_string(&article.text_path) {
            Ok(text) => text,
            Err(e) => {
                error!(id = %article.id, path = %article.text_path.display(), error = %e, "Cannot read article text");
                return false;
            }
        };

        let body = strip_title_header(&raw_text, &article.title);
        let message = format!(
            "<b>{}</b>\n\n{}",
            escape_html(&article.title),
            escape_html(body)
        );
        let chunks = chunk_text(&message, self.chunk_size);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let buttons: &[LinkButton] = if i == last { &self.buttons } else { &[] };
            if let Err(e) = self.transport.send_text(chunk, buttons).await {
                error!(id = %article.id, chunk = i, error = %e, "Text chunk rejected; aborting article");
                return false;
            }
        }
        true
    }

    fn prepare_photos(&self, paths: &[PathBuf]) -> Vec<Photo> {
        paths
            .iter()
            .filter_map(|path| {
                let bytes = prepare_photo_bytes(path, self.watermark.as_deref())?;
                if bytes.is_empty() {
                    return None;
                }
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "photo.png".to_string());
                Some(Photo { filename, bytes })
            })
            .collect()
    }
}

/// Scan article directories and validate each meta.json, keeping only
/// articles absent from the ledger. Broken directories are skipped, never
/// fatal.
fn collect_candidates(parsed_dir: &Path, posted: &HashSet<String>) -> Vec<PreparedArticle> {
    let Ok(entries) = std::fs::read_dir(parsed_dir) else {
        warn!(dir = %parsed_dir.display(), "Articles directory unreadable");
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    let mut candidates = Vec::new();
    for dir in dirs {
        let meta_path = dir.join("meta.json");
        if !meta_path.is_file() {
            continue;
        }
        let meta: ArticleMeta = match std::fs::read_to_string(&meta_path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()))
        {
            Ok(meta) => meta,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Unreadable meta.json; skipping");
                continue;
            }
        };
        if meta.id.is_empty() {
            warn!(dir = %dir.display(), "Article has no id; skipping");
            continue;
        }
        if posted.contains(&meta.id) {
            debug!(id = %meta.id, "Already posted; skipping");
            continue;
        }
        match validate_article(&meta, &dir) {
            Some(prepared) => candidates.push(prepared),
            None => warn!(id = %meta.id, dir = %dir.display(), "Article failed validation; skipping"),
        }
    }
    candidates
}

/// Resolve the text file and images for an article, tolerating records
/// whose paths have moved.
fn validate_article(meta: &ArticleMeta, dir: &Path) -> Option<PreparedArticle> {
    let title = meta.title.trim();
    if title.is_empty() {
        return None;
    }

    // Text file: the recorded name, then the translated rendition, then
    // the original, then any .txt in the directory.
    let mut text_path: Option<PathBuf> = Path::new(&meta.text_file)
        .file_name()
        .map(|name| dir.join(name))
        .filter(|p| p.is_file());
    if text_path.is_none() && !meta.translated_to.is_empty() {
        let candidate = dir.join(format!("content.{}.txt", meta.translated_to));
        if candidate.is_file() {
            text_path = Some(candidate);
        }
    }
    if text_path.is_none() {
        let candidate = dir.join("content.txt");
        if candidate.is_file() {
            text_path = Some(candidate);
        }
    }
    if text_path.is_none() {
        text_path = std::fs::read_dir(dir)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .find(|p| p.extension().is_some_and(|ext| ext == "txt"));
    }
    let text_path = text_path?;

    // Images: recorded names under the article dir or images/, falling
    // back to scanning images/.
    let mut image_paths: Vec<PathBuf> = Vec::new();
    for name in &meta.images {
        let Some(file_name) = Path::new(name).file_name() else {
            continue;
        };
        let direct = dir.join(file_name);
        let nested = dir.join("images").join(file_name);
        if direct.is_file() {
            image_paths.push(direct);
        } else if nested.is_file() {
            image_paths.push(nested);
        }
    }
    if image_paths.is_empty() {
        if let Ok(entries) = std::fs::read_dir(dir.join("images")) {
            image_paths = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| {
                            matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png")
                        })
                })
                .collect();
            image_paths.sort();
        }
    }

    Some(PreparedArticle {
        id: meta.id.clone(),
        title: title.to_string(),
        text_path,
        image_paths,
    })
}

/// Drop a leading title line from the text body so the title is not sent
/// twice (translated text files start with the title as a header).
fn strip_title_header<'t>(text: &'t str, title: &str) -> &'t str {
    let trimmed = text.trim_start();
    if trimmed.len() >= title.len()
        && trimmed.is_char_boundary(title.len())
        && trimmed[..title.len()].eq_ignore_ascii_case(title)
    {
        return trimmed[title.len()..].trim_start();
    }
    text
}
