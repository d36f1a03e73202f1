//! Helpers shared across the pipeline and publisher: slugs, hashing,
//! id ordering, and file system checks.

use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Convert a title to a directory/anchor-friendly slug.
///
/// Lowercases, strips everything that is not alphanumeric, whitespace, or a
/// hyphen, then collapses whitespace/hyphen runs into single hyphens.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify_title("Hello, World!"), "hello-world");
/// assert_eq!(slugify_title("Multiple   Spaces"), "multiple-spaces");
/// ```
pub fn slugify_title(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();

    let mut slug = String::with_capacity(cleaned.len());
    let mut last_was_sep = true;
    for c in cleaned.trim().chars() {
        if c.is_whitespace() || c == '-' {
            if !last_was_sep {
                slug.push('-');
                last_was_sep = true;
            }
        } else {
            slug.push(c);
            last_was_sep = false;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// SHA-256 digest of `data`, hex-encoded.
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Order article ids numerically when both sides parse as integers,
/// falling back to lexicographic order for opaque guids.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes with an ellipsis and byte
/// count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…(+{} bytes)", &s[..end], s.len() - end)
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if missing, then performs a write test by creating
/// and immediately deleting a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Small sync write probe; simpler error surface than async.
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_title() {
        assert_eq!(slugify_title("Hello World"), "hello-world");
        assert_eq!(slugify_title("Test-Article!"), "test-article");
        assert_eq!(slugify_title("Multiple   Spaces"), "multiple-spaces");
        assert_eq!(slugify_title("Special@#$Characters"), "specialcharacters");
        assert_eq!(slugify_title("  padded  "), "padded");
        assert_eq!(slugify_title("Vietnam's GDP grows 7.4%"), "vietnams-gdp-grows-74");
    }

    #[test]
    fn test_sha256_hex_is_stable() {
        let a = sha256_hex("same input");
        let b = sha256_hex("same input");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_sha256_hex_single_char_sensitivity() {
        assert_ne!(sha256_hex("body text"), sha256_hex("body texT"));
    }

    #[test]
    fn test_compare_ids_numeric() {
        assert_eq!(compare_ids("9", "10"), Ordering::Less);
        assert_eq!(compare_ids("42", "42"), Ordering::Equal);
    }

    #[test]
    fn test_compare_ids_falls_back_to_lexicographic() {
        assert_eq!(compare_ids("abc", "abd"), Ordering::Less);
        // Mixed numeric/opaque compares as strings.
        assert_eq!(compare_ids("10", "9-guid"), Ordering::Less);
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }
}
