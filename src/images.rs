//! Image download and content-addressed storage.
//!
//! Filenames derive from the image URL (truncated SHA-256 plus a sniffed
//! extension), so a re-run that sees the same URL finds the file already
//! on disk and skips the download. Downloads within one article run
//! through a bounded worker pool; failures are per-image and never abort
//! the batch.

use crate::client::FetchBytes;
use crate::utils::sha256_hex;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Concurrent downloads per article.
const DOWNLOAD_WORKERS: usize = 5;

static EXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp)(\?|$)").unwrap());

/// Filename for an image URL: 32 hex chars of its digest plus an extension
/// sniffed from the URL, `.bin` when none is recognizable.
pub fn image_filename(url: &str) -> String {
    let digest = sha256_hex(url);
    let ext = EXT_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| format!(".{}", m.as_str().to_lowercase()))
        .unwrap_or_else(|| ".bin".to_string());
    format!("{}{}", &digest[..32], ext)
}

/// Download one image into `dir`, skipping if a non-empty file already
/// exists. Returns the saved path, or `None` when the download failed.
pub async fn save_image<F: FetchBytes>(
    fetcher: &F,
    url: &str,
    dir: &Path,
) -> Option<PathBuf> {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %e, "Cannot create image directory");
        return None;
    }

    let dest = dir.join(image_filename(url));
    match tokio::fs::metadata(&dest).await {
        Ok(meta) if meta.len() > 0 => {
            debug!(path = %dest.display(), "Image already saved; skipping download");
            return Some(dest);
        }
        _ => {}
    }

    match fetcher.fetch_bytes(url).await {
        Ok(bytes) if !bytes.is_empty() => {
            if let Err(e) = tokio::fs::write(&dest, &bytes).await {
                warn!(path = %dest.display(), error = %e, "Failed writing image");
                return None;
            }
            debug!(%url, path = %dest.display(), bytes = bytes.len(), "Saved image");
            Some(dest)
        }
        Ok(_) => {
            warn!(%url, "Downloaded image is empty; discarding");
            None
        }
        Err(e) => {
            warn!(%url, error = %e, "Image download failed");
            None
        }
    }
}

/// Download all `urls` into `dir` with a bounded worker pool, returning
/// the paths that made it to disk. Order follows completion, not input;
/// callers sort or ignore ordering.
pub async fn download_all<F: FetchBytes + Sync>(
    fetcher: &F,
    urls: &[String],
    dir: &Path,
) -> Vec<PathBuf> {
    let saved: Vec<PathBuf> = stream::iter(urls.iter())
        .map(|url| async move { save_image(fetcher, url, dir).await })
        .buffer_unordered(DOWNLOAD_WORKERS)
        .filter_map(|opt| std::future::ready(opt))
        .collect()
        .await;

    info!(
        requested = urls.len(),
        saved = saved.len(),
        "Image downloads complete"
    );
    saved
}
