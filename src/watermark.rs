//! Watermark compositing for outgoing photos.
//!
//! The watermark is scaled to 45% of the base image width and pasted into
//! the top-right corner with a 2% margin. Watermarking is cosmetic:
//! a missing watermark file or any decode/composite failure falls back to
//! the plain image so delivery still happens.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

const WATERMARK_SCALE: f32 = 0.45;
const PADDING_SCALE: f32 = 0.02;

/// Produce the PNG bytes to upload for one photo.
///
/// Fallback order: watermarked PNG, plain re-encoded PNG, raw file bytes.
/// Returns `None` only when the file cannot be read at all, in which case
/// the caller skips this photo.
pub fn prepare_photo_bytes(img_path: &Path, watermark_path: Option<&Path>) -> Option<Vec<u8>> {
    let base = match image::open(img_path) {
        Ok(img) => img,
        Err(e) => {
            warn!(path = %img_path.display(), error = %e, "Cannot decode image; sending raw bytes");
            return std::fs::read(img_path).ok();
        }
    };

    let watermark = watermark_path.and_then(|p| match image::open(p) {
        Ok(img) => Some(img),
        Err(e) => {
            warn!(path = %p.display(), error = %e, "Watermark unavailable; sending plain image");
            None
        }
    });

    let composed = match watermark {
        Some(wm) => composite(&base, &wm),
        None => base,
    };

    let mut buf = Vec::new();
    match composed.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png) {
        Ok(()) => Some(buf),
        Err(e) => {
            warn!(path = %img_path.display(), error = %e, "PNG encode failed; sending raw bytes");
            std::fs::read(img_path).ok()
        }
    }
}

fn composite(base: &DynamicImage, watermark: &DynamicImage) -> DynamicImage {
    let base_w = base.width();
    let wm_w = ((base_w as f32) * WATERMARK_SCALE).max(1.0) as u32;
    let scale = wm_w as f32 / watermark.width().max(1) as f32;
    let wm_h = ((watermark.height() as f32) * scale).max(1.0) as u32;

    let scaled = watermark.resize_exact(wm_w, wm_h, FilterType::Lanczos3);
    let padding = ((base_w as f32) * PADDING_SCALE) as i64;
    let x = base_w as i64 - wm_w as i64 - padding;

    let mut out = base.to_rgba8();
    image::imageops::overlay(&mut out, &scaled.to_rgba8(), x.max(0), padding);
    debug!(wm_w, wm_h, "Composited watermark");
    DynamicImage::ImageRgba8(out)
}
