//! # Crawl Loop
//!
//! Each iteration moves through `FETCH → CHECK_DEDUP → EXTRACT → PERSIST → LOG`
//! and ends in exactly one [`IterationOutcome`]. The outcome decides the pause
//! before the next iteration. The loop itself never stops on a failed
//! iteration; it ends only on cancellation or when the article limit is hit.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use futures::FutureExt;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use super::config::CrawlerConfig;
use super::content_extraction::{extract_article, extract_title};
use super::document::HtmlDocument;
use super::error::{CrawlError, ExtractionError};
use super::fetch::{FetchClient, FetchedPage, Fetcher};
use super::ledger::DownloadLedger;
use super::storage::{ArtifactStore, PersistReport};
use super::ArticleModel;
use crate::error::Result;

/// An article that went through every stage
#[derive(Debug)]
pub struct SavedArticle {
    pub title: String,
    pub folder: PathBuf,

    /// Final URL of the article page
    pub url: String,
    pub report: PersistReport,
}

/// Why an iteration stopped without saving anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The ledger already has a row for the title
    AlreadyDownloaded { title: String },

    /// The page has a title but no main content region
    MissingContent { title: String },
}

/// Result of one iteration
#[derive(Debug)]
pub enum IterationOutcome {
    Saved(SavedArticle),
    Skipped(SkipReason),
    Failed(CrawlError),
}

/// Counters for one call to [`Crawler::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub iterations: usize,
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunStats {
    fn record(&mut self, outcome: &IterationOutcome) {
        self.iterations += 1;
        match outcome {
            IterationOutcome::Saved(_) => self.saved += 1,
            IterationOutcome::Skipped(_) => self.skipped += 1,
            IterationOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Result of the synchronous part of an iteration
enum Inspection {
    Skip(SkipReason),
    Extracted { model: ArticleModel, folder: PathBuf },
}

/// Downloads random articles until cancelled
pub struct Crawler<F: Fetcher = FetchClient> {
    config: CrawlerConfig,
    fetcher: F,
    store: ArtifactStore,
    ledger: DownloadLedger,
}

impl Crawler<FetchClient> {
    /// Create a crawler that talks to the network
    pub fn from_config(config: CrawlerConfig) -> Result<Self> {
        let fetcher = FetchClient::new(&config)?;
        Self::new(config, fetcher)
    }
}

impl<F: Fetcher> Crawler<F> {
    /// Create a crawler with a custom fetcher
    ///
    /// Validates the configuration and opens (or creates) the ledger.
    pub fn new(config: CrawlerConfig, fetcher: F) -> Result<Self> {
        config.validate()?;
        let ledger = DownloadLedger::open(&config.storage_root, &config.ledger_file)
            .map_err(CrawlError::from)?;
        let store = ArtifactStore::new(&config.storage_root);

        Ok(Self {
            config,
            fetcher,
            store,
            ledger,
        })
    }

    /// The configuration the crawler runs with
    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// The ledger the crawler records articles in
    pub fn ledger(&self) -> &DownloadLedger {
        &self.ledger
    }

    /// Run one iteration
    pub async fn run_iteration(&self) -> IterationOutcome {
        match self.try_iteration().await {
            Ok(outcome) => outcome,
            Err(e) => IterationOutcome::Failed(e),
        }
    }

    async fn try_iteration(&self) -> std::result::Result<IterationOutcome, CrawlError> {
        let page = self
            .fetcher
            .get(&self.config.random_article_url, self.config.request_timeout)
            .await?;
        debug!(url = %page.url, "Fetched random article");

        let (model, folder) = match self.inspect(&page)? {
            Inspection::Skip(reason) => return Ok(IterationOutcome::Skipped(reason)),
            Inspection::Extracted { model, folder } => (model, folder),
        };

        let report = self
            .store
            .persist(&self.fetcher, &folder, &model, self.config.file_timeout)
            .await?;

        self.ledger
            .append(&model.title, &folder, &page.url, Local::now().naive_local())?;

        Ok(IterationOutcome::Saved(SavedArticle {
            title: model.title,
            folder,
            url: page.url,
            report,
        }))
    }

    /// Parse the page, check the ledger and extract the article
    ///
    /// The parsed tree is not `Send`, so it lives only inside this function.
    fn inspect(&self, page: &FetchedPage) -> std::result::Result<Inspection, CrawlError> {
        let doc = HtmlDocument::parse_bytes(&page.body);
        let title = extract_title(&doc)?;

        let (downloaded, folder) = self.ledger.is_downloaded(&title)?;
        if downloaded {
            return Ok(Inspection::Skip(SkipReason::AlreadyDownloaded { title }));
        }

        match extract_article(&doc, &page.url, &self.config) {
            Ok(model) => Ok(Inspection::Extracted { model, folder }),
            Err(ExtractionError::MissingContent) => {
                Ok(Inspection::Skip(SkipReason::MissingContent { title }))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run one iteration, turning a panic into a failed outcome
    async fn guarded_iteration(&self) -> IterationOutcome {
        AssertUnwindSafe(self.run_iteration())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                IterationOutcome::Failed(CrawlError::Other(format!(
                    "iteration panicked: {}",
                    panic_message(panic.as_ref())
                )))
            })
    }

    /// How long to wait after an outcome
    pub fn pause_for(&self, outcome: &IterationOutcome) -> Duration {
        match outcome {
            IterationOutcome::Saved(_) => {
                let (min, max) = (self.config.min_delay, self.config.max_delay);
                if min >= max {
                    min
                } else {
                    rand::thread_rng().gen_range(min..=max)
                }
            }
            IterationOutcome::Skipped(_) => self.config.skip_pause,
            IterationOutcome::Failed(_) => self.config.error_cooldown,
        }
    }

    /// Crawl until `shutdown` is cancelled or the article limit is reached
    #[instrument(skip_all)]
    pub async fn run(&self, shutdown: CancellationToken) -> RunStats {
        let mut stats = RunStats::default();
        info!(
            url = %self.config.random_article_url,
            root = %self.config.storage_root.display(),
            "Starting crawl"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Shutdown requested, stopping");
                break;
            }

            let n = stats.iterations + 1;
            let outcome = self
                .guarded_iteration()
                .instrument(info_span!("iteration", n))
                .await;
            log_outcome(&outcome);
            stats.record(&outcome);

            if self
                .config
                .max_articles
                .is_some_and(|limit| stats.saved >= limit)
            {
                info!(saved = stats.saved, "Article limit reached, stopping");
                break;
            }

            let pause = self.pause_for(&outcome);
            debug!(?pause, "Pausing");
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!(
            iterations = stats.iterations,
            saved = stats.saved,
            skipped = stats.skipped,
            failed = stats.failed,
            "Crawl finished"
        );
        stats
    }
}

fn log_outcome(outcome: &IterationOutcome) {
    match outcome {
        IterationOutcome::Saved(article) => info!(
            title = %article.title,
            images = article.report.images.saved,
            media = article.report.media.saved,
            tables = article.report.tables,
            failures = article.report.failures.len(),
            "Saved article"
        ),
        IterationOutcome::Skipped(SkipReason::AlreadyDownloaded { title }) => {
            info!(%title, "Already downloaded, skipping")
        }
        IterationOutcome::Skipped(SkipReason::MissingContent { title }) => {
            warn!(%title, "No main content, skipping")
        }
        IterationOutcome::Failed(e) => error!(kind = ?e.kind(), "Iteration failed: {}", e),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::ErrorKind;
    use crate::crawler::fetch::FetchFuture;
    use crate::crawler::mock_fetcher::MockFetcher;
    use tempfile::TempDir;

    const RANDOM: &str = "https://wiki.test/wiki/Special:Random";
    const ARTICLE: &str = "https://wiki.test/wiki/Test_Page";
    const IMAGE: &str = "https://upload.wiki.test/a/b/Map.png";

    const PAGE: &str = r#"<html><body>
        <h1 id="firstHeading">Test Page</h1>
        <div id="mw-content-text">
          <p>P1</p>
          <img src="//upload.wiki.test/a/b/Map.png">
          <h2>History<span>[edit]</span></h2>
          <p>P2</p>
          <table class="wikitable"><tr><th>A</th></tr><tr><td>1</td></tr></table>
          <ol class="references"><li>Ref</li></ol>
        </div>
      </body></html>"#;

    fn config(dir: &TempDir) -> CrawlerConfig {
        CrawlerConfig::builder()
            .storage_root(dir.path())
            .random_article_url(RANDOM)
            .site_base("https://wiki.test/")
            .delay_range(Duration::ZERO, Duration::ZERO)
            .skip_pause(Duration::ZERO)
            .error_cooldown(Duration::ZERO)
            .build()
    }

    fn crawler(dir: &TempDir, fetcher: MockFetcher) -> Crawler<MockFetcher> {
        Crawler::new(config(dir), fetcher).unwrap()
    }

    fn article_fetcher() -> MockFetcher {
        let fetcher = MockFetcher::new();
        fetcher
            .serve_redirected(RANDOM, ARTICLE, PAGE)
            .serve(IMAGE, "png bytes");
        fetcher
    }

    #[tokio::test]
    async fn test_saves_article_and_logs_final_url() {
        let dir = TempDir::new().unwrap();
        let crawler = crawler(&dir, article_fetcher());

        let article = match crawler.run_iteration().await {
            IterationOutcome::Saved(article) => article,
            other => panic!("expected saved article, got {:?}", other),
        };
        assert_eq!(article.title, "Test Page");
        assert_eq!(article.folder, dir.path().join("Test_Page"));
        assert_eq!(article.report.images.saved, 1);
        assert_eq!(article.report.tables, 1);

        let entries = crawler.ledger().entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, ARTICLE);
        assert!(article.folder.join("images/Map.png").exists());
    }

    #[tokio::test]
    async fn test_second_iteration_is_skipped_without_downloads() {
        let dir = TempDir::new().unwrap();
        let fetcher = article_fetcher();
        let crawler = crawler(&dir, fetcher.clone());

        assert!(matches!(
            crawler.run_iteration().await,
            IterationOutcome::Saved(_)
        ));
        let outcome = crawler.run_iteration().await;
        assert!(matches!(
            outcome,
            IterationOutcome::Skipped(SkipReason::AlreadyDownloaded { ref title }) if title == "Test Page"
        ));

        assert_eq!(fetcher.request_count(RANDOM), 2);
        assert_eq!(fetcher.request_count(IMAGE), 1);
        assert_eq!(crawler.ledger().entries().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dedup_survives_restart() {
        let dir = TempDir::new().unwrap();
        let fetcher = article_fetcher();
        crawler(&dir, fetcher.clone()).run_iteration().await;

        let restarted = crawler(&dir, fetcher.clone());
        assert!(matches!(
            restarted.run_iteration().await,
            IterationOutcome::Skipped(SkipReason::AlreadyDownloaded { .. })
        ));
        assert_eq!(fetcher.request_count(IMAGE), 1);
    }

    #[tokio::test]
    async fn test_removed_article_directory_is_downloaded_again() {
        let dir = TempDir::new().unwrap();
        let fetcher = article_fetcher();
        let crawler = crawler(&dir, fetcher.clone());

        assert!(matches!(
            crawler.run_iteration().await,
            IterationOutcome::Saved(_)
        ));
        std::fs::remove_dir_all(dir.path().join("Test_Page")).unwrap();

        assert!(matches!(
            crawler.run_iteration().await,
            IterationOutcome::Saved(_)
        ));
        assert!(dir.path().join("Test_Page/images/Map.png").exists());
        assert_eq!(fetcher.request_count(IMAGE), 2);
        assert_eq!(crawler.ledger().entries().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_content_is_skipped() {
        let dir = TempDir::new().unwrap();
        let fetcher = MockFetcher::new();
        fetcher.serve(RANDOM, r#"<h1 id="firstHeading">Stub</h1><p>no region</p>"#);
        let crawler = crawler(&dir, fetcher);

        let outcome = crawler.run_iteration().await;
        assert!(matches!(
            outcome,
            IterationOutcome::Skipped(SkipReason::MissingContent { ref title }) if title == "Stub"
        ));
        assert!(crawler.ledger().entries().unwrap().is_empty());
        assert!(!dir.path().join("Stub").exists());
    }

    #[tokio::test]
    async fn test_missing_title_fails() {
        let dir = TempDir::new().unwrap();
        let fetcher = MockFetcher::new();
        fetcher.serve(RANDOM, "<html><body><p>nothing</p></body></html>");
        let crawler = crawler(&dir, fetcher);

        let outcome = crawler.run_iteration().await;
        assert!(matches!(
            outcome,
            IterationOutcome::Failed(CrawlError::Extraction(ExtractionError::MissingTitle))
        ));
    }

    #[tokio::test]
    async fn test_fetch_failure_uses_cooldown() {
        let dir = TempDir::new().unwrap();
        let fetcher = MockFetcher::new();
        fetcher.fail(RANDOM, 503);
        let config = CrawlerConfig::builder()
            .storage_root(dir.path())
            .random_article_url(RANDOM)
            .error_cooldown(Duration::from_secs(5))
            .skip_pause(Duration::from_secs(1))
            .build();
        let crawler = Crawler::new(config, fetcher).unwrap();

        let outcome = crawler.run_iteration().await;
        match &outcome {
            IterationOutcome::Failed(e) => assert_eq!(e.kind(), ErrorKind::Transport),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(crawler.pause_for(&outcome), Duration::from_secs(5));
        assert!(crawler.ledger().entries().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pause_policy() {
        let dir = TempDir::new().unwrap();
        let config = CrawlerConfig::builder()
            .storage_root(dir.path())
            .delay_range(Duration::from_millis(10), Duration::from_millis(20))
            .skip_pause(Duration::from_secs(1))
            .error_cooldown(Duration::from_secs(5))
            .build();
        let crawler = Crawler::new(config, MockFetcher::new()).unwrap();

        let saved = IterationOutcome::Saved(SavedArticle {
            title: "T".to_string(),
            folder: dir.path().join("T"),
            url: ARTICLE.to_string(),
            report: PersistReport::default(),
        });
        for _ in 0..20 {
            let pause = crawler.pause_for(&saved);
            assert!(pause >= Duration::from_millis(10) && pause <= Duration::from_millis(20));
        }

        let skipped = IterationOutcome::Skipped(SkipReason::MissingContent {
            title: "T".to_string(),
        });
        assert_eq!(crawler.pause_for(&skipped), Duration::from_secs(1));

        let failed = IterationOutcome::Failed(CrawlError::Other("x".to_string()));
        assert_eq!(crawler.pause_for(&failed), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_run_stops_at_article_limit() {
        let dir = TempDir::new().unwrap();
        let config = CrawlerConfig::builder()
            .storage_root(dir.path())
            .random_article_url(RANDOM)
            .delay_range(Duration::ZERO, Duration::ZERO)
            .max_articles(Some(1))
            .build();
        let crawler = Crawler::new(config, article_fetcher()).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(5), crawler.run(CancellationToken::new()))
            .await
            .unwrap();
        assert_eq!(
            stats,
            RunStats {
                iterations: 1,
                saved: 1,
                skipped: 0,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_run_respects_cancelled_token() {
        let dir = TempDir::new().unwrap();
        let fetcher = article_fetcher();
        let crawler = crawler(&dir, fetcher.clone());

        let token = CancellationToken::new();
        token.cancel();
        let stats = crawler.run(token).await;

        assert_eq!(stats, RunStats::default());
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_run_cancels_during_pause() {
        let dir = TempDir::new().unwrap();
        let fetcher = MockFetcher::new();
        fetcher.fail(RANDOM, 500);
        let config = CrawlerConfig::builder()
            .storage_root(dir.path())
            .random_article_url(RANDOM)
            .error_cooldown(Duration::from_secs(3600))
            .build();
        let crawler = Crawler::new(config, fetcher).unwrap();

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let stats = tokio::time::timeout(Duration::from_secs(5), crawler.run(token))
            .await
            .unwrap();
        assert_eq!(stats.iterations, 1);
        assert_eq!(stats.failed, 1);
    }

    struct PanickingFetcher;

    impl Fetcher for PanickingFetcher {
        fn get<'a>(&'a self, _url: &'a str, _timeout: Duration) -> FetchFuture<'a> {
            Box::pin(futures::future::lazy(|_| -> std::result::Result<FetchedPage, CrawlError> {
                panic!("fetcher exploded")
            }))
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let dir = TempDir::new().unwrap();
        let crawler = Crawler::new(config(&dir), PanickingFetcher).unwrap();

        let outcome = crawler.guarded_iteration().await;
        match outcome {
            IterationOutcome::Failed(CrawlError::Other(msg)) => {
                assert!(msg.contains("fetcher exploded"))
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let config = CrawlerConfig::builder()
            .storage_root(dir.path())
            .delay_range(Duration::from_secs(3), Duration::from_secs(1))
            .build();
        assert!(Crawler::new(config, MockFetcher::new()).is_err());
    }
}
