//! # Crawler Configuration Module
//!
//! This module provides the configuration for the article crawler: where
//! articles are stored, which page to ask for a random article, how long to
//! wait between requests and after failures, and how requests identify
//! themselves. It uses a builder pattern for flexible configuration.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: The immutable configuration shared by the fetch client,
//!   the artifact store and the crawl loop
//! - `CrawlerConfigBuilder`: Builder pattern implementation for easier configuration
//!
//! ## Features
//!
//! - Defaults suitable for polite, unattended crawling of English Wikipedia
//! - Randomized delay bounds between saved articles
//! - Fixed cooldown after failed iterations
//! - Configurable linked-media extensions and user agent

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Endpoint that redirects to a random article
pub const DEFAULT_RANDOM_ARTICLE_URL: &str = "https://en.wikipedia.org/wiki/Special:Random";

/// Base used to resolve linked media hrefs
pub const DEFAULT_SITE_BASE: &str = "https://en.wikipedia.org/";

/// Extensions that mark an anchor as linked media
pub const DEFAULT_MEDIA_EXTENSIONS: [&str; 5] = [".pdf", ".mp3", ".ogg", ".wav", ".mp4"];

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Root directory holding article directories and the ledger
    pub storage_root: PathBuf,

    /// File name of the download ledger inside `storage_root`
    pub ledger_file: String,

    /// URL requested at the start of every iteration
    pub random_article_url: String,

    /// Base URL that linked media hrefs are resolved against
    pub site_base: String,

    /// Timeout for the random article request
    pub request_timeout: Duration,

    /// Timeout for each image or media download
    pub file_timeout: Duration,

    /// Lower bound of the pause after a saved article
    pub min_delay: Duration,

    /// Upper bound of the pause after a saved article
    pub max_delay: Duration,

    /// Pause after a skipped iteration
    pub skip_pause: Duration,

    /// Pause after a failed iteration
    pub error_cooldown: Duration,

    /// Lowercase extensions identifying linked media
    pub media_extensions: Vec<String>,

    /// User agent to use for requests
    pub user_agent: String,

    /// Stop after this many saved articles; run forever when `None`
    pub max_articles: Option<usize>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("wikipedia_articles"),
            ledger_file: "download_log.csv".to_string(),
            random_article_url: DEFAULT_RANDOM_ARTICLE_URL.to_string(),
            site_base: DEFAULT_SITE_BASE.to_string(),
            request_timeout: Duration::from_secs(10),
            file_timeout: Duration::from_secs(60),
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
            skip_pause: Duration::from_secs(1),
            error_cooldown: Duration::from_secs(5),
            media_extensions: DEFAULT_MEDIA_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            user_agent: format!(
                "Mozilla/5.0 (compatible; wikicrawl/{})",
                env!("CARGO_PKG_VERSION")
            ),
            max_articles: None,
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the storage root directory
    pub fn storage_root(mut self, storage_root: impl Into<PathBuf>) -> Self {
        self.config.storage_root = storage_root.into();
        self
    }

    /// Set the ledger file name
    pub fn ledger_file(mut self, ledger_file: impl Into<String>) -> Self {
        self.config.ledger_file = ledger_file.into();
        self
    }

    /// Set the random article endpoint
    pub fn random_article_url(mut self, url: impl Into<String>) -> Self {
        self.config.random_article_url = url.into();
        self
    }

    /// Set the base URL for linked media
    pub fn site_base(mut self, site_base: impl Into<String>) -> Self {
        self.config.site_base = site_base.into();
        self
    }

    /// Set the timeout for the random article request
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the timeout for file downloads
    pub fn file_timeout(mut self, timeout: Duration) -> Self {
        self.config.file_timeout = timeout;
        self
    }

    /// Set the bounds of the randomized pause after a saved article
    pub fn delay_range(mut self, min_delay: Duration, max_delay: Duration) -> Self {
        self.config.min_delay = min_delay;
        self.config.max_delay = max_delay;
        self
    }

    /// Set the pause after a skipped iteration
    pub fn skip_pause(mut self, pause: Duration) -> Self {
        self.config.skip_pause = pause;
        self
    }

    /// Set the pause after a failed iteration
    pub fn error_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.error_cooldown = cooldown;
        self
    }

    /// Set the linked media extensions
    pub fn media_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.media_extensions = extensions
            .into_iter()
            .map(|ext| ext.into().to_lowercase())
            .collect();
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Stop after a number of saved articles
    pub fn max_articles(mut self, max_articles: Option<usize>) -> Self {
        self.config.max_articles = max_articles;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Path of the download ledger
    pub fn ledger_path(&self) -> PathBuf {
        self.storage_root.join(&self.ledger_file)
    }

    /// Check the configuration for values the crawler cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.min_delay > self.max_delay {
            return Err(Error::Config(format!(
                "min delay {:?} is greater than max delay {:?}",
                self.min_delay, self.max_delay
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("user agent must not be empty".to_string()));
        }
        if self.ledger_file.trim().is_empty() {
            return Err(Error::Config("ledger file name must not be empty".to_string()));
        }
        for (name, value) in [
            ("random article URL", &self.random_article_url),
            ("site base", &self.site_base),
        ] {
            Url::parse(value)
                .map_err(|e| Error::Config(format!("invalid {} '{}': {}", name, value, e)))?;
        }
        Ok(())
    }
}
