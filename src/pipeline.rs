//! The article pipeline: fetch → extract → hash → translate → persist.
//!
//! Each run is incremental and idempotent. An article whose extracted
//! content hashes to the same value as its on-disk record, under the same
//! translation target, is returned from cache without any translation or
//! download work. Individual article failures (no content, no images,
//! network trouble) are logged and skipped; they never abort the batch.

use crate::client::{FetchBytes, FetchText};
use crate::extract::ExtractContent;
use crate::images;
use crate::models::{ArticleDescriptor, ArticleMeta, CatalogEntry};
use crate::retry::RetryPolicy;
use crate::translate::{Translate, translate_or_original};
use crate::utils::{sha256_hex, slugify_title};
use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

/// What one batch run did to the catalog view.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Ids processed for the first time.
    pub new_articles: usize,
    /// Ids whose catalog entry actually changed (content edit or new
    /// translation target).
    pub updated_articles: usize,
    /// Descriptors skipped: excluded, empty, image-less, or failed.
    pub skipped: usize,
}

impl BatchOutcome {
    /// True when the catalog view differs from what was loaded.
    pub fn catalog_dirty(&self) -> bool {
        self.new_articles > 0 || self.updated_articles > 0
    }
}

pub struct Pipeline<'a, F, X, T> {
    fetcher: &'a F,
    extractor: &'a X,
    translator: &'a T,
    output_dir: PathBuf,
    translate_to: String,
    policy: RetryPolicy,
}

impl<'a, F, X, T> Pipeline<'a, F, X, T>
where
    F: FetchText + FetchBytes + Sync,
    X: ExtractContent,
    T: Translate,
{
    pub fn new(
        fetcher: &'a F,
        extractor: &'a X,
        translator: &'a T,
        output_dir: impl Into<PathBuf>,
        translate_to: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            translator,
            output_dir: output_dir.into(),
            translate_to: translate_to.into(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Process a batch of descriptors sequentially, updating the
    /// in-memory catalog view with last-write-wins per id.
    ///
    /// `excluded` is the externally-supplied already-delivered set; ids in
    /// it are never reprocessed.
    #[instrument(level = "info", skip_all, fields(batch = descriptors.len(), lang = %self.translate_to))]
    pub async fn process_batch(
        &self,
        descriptors: &[ArticleDescriptor],
        excluded: &HashSet<String>,
        catalog: &mut Vec<CatalogEntry>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for descriptor in descriptors {
            if excluded.contains(&descriptor.id) {
                info!(id = %descriptor.id, "Already delivered; skipping");
                outcome.skipped += 1;
                continue;
            }
            match self.process_article(descriptor).await {
                Ok(Some(meta)) => {
                    let entry = meta.to_catalog_entry();
                    match catalog.iter().position(|e| e.id == entry.id) {
                        Some(pos) => {
                            // Replace, never merge.
                            if catalog[pos] != entry {
                                catalog[pos] = entry;
                                outcome.updated_articles += 1;
                                info!(id = %meta.id, "Updated article in catalog");
                            }
                        }
                        None => {
                            catalog.push(entry);
                            outcome.new_articles += 1;
                            info!(id = %meta.id, "Processed new article");
                        }
                    }
                }
                Ok(None) => outcome.skipped += 1,
                Err(e) => {
                    error!(id = %descriptor.id, error = %e, "Article processing failed; continuing with batch");
                    outcome.skipped += 1;
                }
            }
        }

        info!(
            new = outcome.new_articles,
            updated = outcome.updated_articles,
            skipped = outcome.skipped,
            "Batch complete"
        );
        outcome
    }

    /// Process one article end to end. `Ok(None)` means the article was
    /// deliberately skipped; `Err` is an unexpected per-article failure.
    async fn process_article(
        &self,
        descriptor: &ArticleDescriptor,
    ) -> Result<Option<ArticleMeta>, Box<dyn Error>> {
        let id = &descriptor.id;

        let html = match self.fetcher.fetch_text(&descriptor.link).await {
            Ok(html) => html,
            Err(e) => {
                warn!(%id, link = %descriptor.link, error = %e, "Article fetch failed; skipping");
                return Ok(None);
            }
        };

        let extraction = self.extractor.extract(&html);
        if extraction.is_empty() {
            warn!(%id, "No usable text or images extracted; skipping");
            return Ok(None);
        }

        let hash = sha256_hex(&extraction.text);
        let title = descriptor.display_title();
        let slug = slugify_title(&title);
        let art_dir = self.output_dir.join(format!("{id}_{slug}"));
        let meta_path = art_dir.join("meta.json");

        // Idempotence short-circuit: unchanged content under the same
        // translation target is a metadata read, nothing more.
        if let Some(existing) = read_existing_meta(&meta_path) {
            if existing.hash == hash && existing.translated_to == self.translate_to && existing.id == *id
            {
                info!(%id, "Unchanged article; returning cached record");
                return Ok(Some(existing));
            }
        }

        let img_dir = art_dir.join("images");
        let image_paths = images::download_all(self.fetcher, &extraction.image_urls, &img_dir).await;
        if image_paths.is_empty() {
            warn!(%id, "No images saved; discarding article");
            return Ok(None);
        }

        tokio::fs::create_dir_all(&art_dir).await?;

        let final_title = translate_or_original(self.translator, &title, &self.translate_to, &self.policy)
            .await
            .into_text();

        let original_file = art_dir.join("content.txt");
        tokio::fs::write(&original_file, &extraction.text).await?;

        let mut meta = ArticleMeta {
            id: id.clone(),
            slug,
            date: descriptor.published.clone(),
            link: descriptor.link.clone(),
            title: final_title.clone(),
            text_file: original_file.display().to_string(),
            images: image_paths.iter().map(|p| p.display().to_string()).collect(),
            posted: false,
            hash,
            translated_to: String::new(),
            translated_file: None,
            description: (!descriptor.description.is_empty()).then(|| descriptor.description.clone()),
        };

        if !self.translate_to.is_empty() {
            let translated = self.translate_body(&extraction.text).await;
            let translated_file = art_dir.join(format!("content.{}.txt", self.translate_to));
            let body = format!("{final_title}\n\n\n{translated}");
            tokio::fs::write(&translated_file, body).await?;

            meta.translated_to = self.translate_to.clone();
            meta.translated_file = Some(translated_file.display().to_string());
            // The publisher sends the translated rendition.
            meta.text_file = translated_file.display().to_string();
        }

        let json = serde_json::to_string_pretty(&meta)?;
        tokio::fs::write(&meta_path, json).await?;

        Ok(Some(meta))
    }

    /// Translate the body paragraph by paragraph; each paragraph falls
    /// back to its original text independently.
    async fn translate_body(&self, text: &str) -> String {
        let mut translated = Vec::new();
        for para in text.split("\n\n").filter(|p| !p.trim().is_empty()) {
            let result =
                translate_or_original(self.translator, para, &self.translate_to, &self.policy).await;
            translated.push(result.into_text());
        }
        translated.join("\n\n")
    }
}

fn read_existing_meta(meta_path: &Path) -> Option<ArticleMeta> {
    let raw = std::fs::read_to_string(meta_path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!(path = %meta_path.display(), error = %e, "Existing meta unreadable; reprocessing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FetchError;
    use crate::config::SourceProfile;
    use crate::extract::SelectorExtractor;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const ARTICLE_HTML: &str = r#"
<html><body><article class="fck_detail">
  <p>Storm winds reached the coast overnight.</p>
  <p>Thousands were evacuated inland.</p>
  <img src="https://img.example.org/storm.jpg">
</article></body></html>"#;

    struct FakeNet {
        pages: HashMap<String, String>,
        bytes: HashMap<String, Vec<u8>>,
        page_calls: Mutex<Vec<String>>,
    }

    impl FakeNet {
        fn with_article(link: &str, html: &str, images: &[(&str, &[u8])]) -> Self {
            Self {
                pages: HashMap::from([(link.to_string(), html.to_string())]),
                bytes: images
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
                page_calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl FetchText for FakeNet {
        async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            self.page_calls.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
                retry_after: None,
            })
        }
    }

    impl FetchBytes for FakeNet {
        async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.bytes.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
                retry_after: None,
            })
        }
    }

    struct CountingTranslator {
        calls: AtomicUsize,
    }

    impl CountingTranslator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Translate for CountingTranslator {
        async fn translate(&self, text: &str, _to: &str) -> Result<String, Box<dyn Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("[ru] {text}"))
        }
    }

    fn extractor() -> SelectorExtractor {
        SelectorExtractor::from_profile(&SourceProfile {
            allowed_image_host: Some("img.example.org".to_string()),
            ..SourceProfile::default()
        })
        .unwrap()
    }

    fn descriptor(id: &str, link: &str) -> ArticleDescriptor {
        ArticleDescriptor {
            id: id.to_string(),
            link: link.to_string(),
            title: "Storm hits coast".to_string(),
            description: "Teaser".to_string(),
            published: Some("2025-07-01".to_string()),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_processes_new_article_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let link = "https://news.example.org/storm.html";
        let net = FakeNet::with_article(
            link,
            ARTICLE_HTML,
            &[("https://img.example.org/storm.jpg", b"jpeg-bytes")],
        );
        let ex = extractor();
        let tr = CountingTranslator::new();
        let pipeline =
            Pipeline::new(&net, &ex, &tr, dir.path(), "ru").with_retry_policy(fast_policy());

        let mut catalog = Vec::new();
        let outcome = pipeline
            .process_batch(&[descriptor("42", link)], &HashSet::new(), &mut catalog)
            .await;

        assert_eq!(outcome.new_articles, 1);
        assert!(outcome.catalog_dirty());
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].id, "42");
        assert_eq!(catalog[0].translated_to, "ru");

        let art_dir = dir.path().join("42_storm-hits-coast");
        assert!(art_dir.join("meta.json").exists());
        assert!(art_dir.join("content.txt").exists());
        assert!(art_dir.join("content.ru.txt").exists());

        let translated = std::fs::read_to_string(art_dir.join("content.ru.txt")).unwrap();
        assert!(translated.starts_with("[ru] Storm hits coast\n\n\n"));
        assert!(translated.contains("[ru] Storm winds reached the coast overnight."));

        // Title plus two paragraphs.
        assert_eq!(tr.call_count(), 3);
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let link = "https://news.example.org/storm.html";
        let net = FakeNet::with_article(
            link,
            ARTICLE_HTML,
            &[("https://img.example.org/storm.jpg", b"jpeg-bytes")],
        );
        let ex = extractor();
        let tr = CountingTranslator::new();
        let pipeline =
            Pipeline::new(&net, &ex, &tr, dir.path(), "ru").with_retry_policy(fast_policy());

        let mut catalog = Vec::new();
        let descriptors = [descriptor("42", link)];
        pipeline
            .process_batch(&descriptors, &HashSet::new(), &mut catalog)
            .await;
        let catalog_after_first = catalog.clone();
        let translation_calls = tr.call_count();
        let meta_path = dir.path().join("42_storm-hits-coast").join("meta.json");
        let meta_after_first = std::fs::read_to_string(&meta_path).unwrap();

        let outcome = pipeline
            .process_batch(&descriptors, &HashSet::new(), &mut catalog)
            .await;

        // Cached short-circuit: no new translation work, identical record,
        // catalog untouched.
        assert_eq!(outcome.new_articles, 0);
        assert_eq!(outcome.updated_articles, 0);
        assert!(!outcome.catalog_dirty());
        assert_eq!(tr.call_count(), translation_calls);
        assert_eq!(catalog, catalog_after_first);
        assert_eq!(std::fs::read_to_string(&meta_path).unwrap(), meta_after_first);
    }

    #[tokio::test]
    async fn test_changed_content_replaces_catalog_entry() {
        let dir = tempfile::tempdir().unwrap();
        let link = "https://news.example.org/storm.html";
        let ex = extractor();
        let tr = CountingTranslator::new();

        let mut catalog = Vec::new();
        {
            let net = FakeNet::with_article(
                link,
                ARTICLE_HTML,
                &[("https://img.example.org/storm.jpg", b"jpeg-bytes")],
            );
            let pipeline =
                Pipeline::new(&net, &ex, &tr, dir.path(), "").with_retry_policy(fast_policy());
            pipeline
                .process_batch(&[descriptor("42", link)], &HashSet::new(), &mut catalog)
                .await;
        }
        let first_hash = catalog[0].hash.clone();

        // Upstream silently edits the body.
        let edited = ARTICLE_HTML.replace("Thousands", "Hundreds");
        let net = FakeNet::with_article(
            link,
            &edited,
            &[("https://img.example.org/storm.jpg", b"jpeg-bytes")],
        );
        let pipeline =
            Pipeline::new(&net, &ex, &tr, dir.path(), "").with_retry_policy(fast_policy());
        let outcome = pipeline
            .process_batch(&[descriptor("42", link)], &HashSet::new(), &mut catalog)
            .await;

        assert_eq!(outcome.updated_articles, 1);
        assert_eq!(outcome.new_articles, 0);
        assert_eq!(catalog.len(), 1);
        assert_ne!(catalog[0].hash, first_hash);
    }

    #[tokio::test]
    async fn test_article_without_images_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let link = "https://news.example.org/storm.html";
        // Image URL extraction succeeds but every download 404s.
        let net = FakeNet::with_article(link, ARTICLE_HTML, &[]);
        let ex = extractor();
        let tr = CountingTranslator::new();
        let pipeline =
            Pipeline::new(&net, &ex, &tr, dir.path(), "ru").with_retry_policy(fast_policy());

        let mut catalog = Vec::new();
        let outcome = pipeline
            .process_batch(&[descriptor("42", link)], &HashSet::new(), &mut catalog)
            .await;

        assert_eq!(outcome.skipped, 1);
        assert!(catalog.is_empty());
        assert!(!dir.path().join("42_storm-hits-coast").join("meta.json").exists());
        // Discarded before any translation was attempted.
        assert_eq!(tr.call_count(), 0);
    }

    #[tokio::test]
    async fn test_excluded_ids_are_never_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let link = "https://news.example.org/storm.html";
        let net = FakeNet::with_article(
            link,
            ARTICLE_HTML,
            &[("https://img.example.org/storm.jpg", b"jpeg-bytes")],
        );
        let ex = extractor();
        let tr = CountingTranslator::new();
        let pipeline =
            Pipeline::new(&net, &ex, &tr, dir.path(), "").with_retry_policy(fast_policy());

        let excluded: HashSet<String> = ["42".to_string()].into();
        let mut catalog = Vec::new();
        let outcome = pipeline
            .process_batch(&[descriptor("42", link)], &excluded, &mut catalog)
            .await;

        assert_eq!(outcome.skipped, 1);
        assert!(catalog.is_empty());
        assert!(net.page_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_abort_batch() {
        let dir = tempfile::tempdir().unwrap();
        let good = "https://news.example.org/good.html";
        let net = FakeNet::with_article(
            good,
            ARTICLE_HTML,
            &[("https://img.example.org/storm.jpg", b"jpeg-bytes")],
        );
        let ex = extractor();
        let tr = CountingTranslator::new();
        let pipeline =
            Pipeline::new(&net, &ex, &tr, dir.path(), "").with_retry_policy(fast_policy());

        let mut catalog = Vec::new();
        let outcome = pipeline
            .process_batch(
                &[
                    descriptor("1", "https://news.example.org/missing.html"),
                    descriptor("2", good),
                ],
                &HashSet::new(),
                &mut catalog,
            )
            .await;

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.new_articles, 1);
        assert_eq!(catalog[0].id, "2");
    }

    #[tokio::test]
    async fn test_empty_extraction_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let link = "https://news.example.org/empty.html";
        let net = FakeNet::with_article(link, "<html><body>nothing here</body></html>", &[]);
        let ex = extractor();
        let tr = CountingTranslator::new();
        let pipeline =
            Pipeline::new(&net, &ex, &tr, dir.path(), "").with_retry_policy(fast_policy());

        let mut catalog = Vec::new();
        let outcome = pipeline
            .process_batch(&[descriptor("9", link)], &HashSet::new(), &mut catalog)
            .await;
        assert_eq!(outcome.skipped, 1);
        assert!(catalog.is_empty());
    }
}
