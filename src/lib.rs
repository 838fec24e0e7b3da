//! # wikicrawl - Random Wikipedia Article Archiver
//!
//! This crate repeatedly fetches random articles from Wikipedia, extracts
//! their structured content and stores every article in its own directory,
//! keeping an append-only ledger so no article is downloaded twice.
//!
//! ## Features
//!
//! - Text grouped by section, with leading text under `Introduction`
//! - Images, data tables, linked media, references and external links
//! - Durable CSV ledger that survives restarts
//! - One failing artifact never aborts the rest of an article
//! - Randomized delays between articles and a cooldown after failures
//! - Async API with Tokio and graceful shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use wikicrawl::crawler::{Crawler, CrawlerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CrawlerConfig::builder()
//!         .storage_root("wikipedia_articles")
//!         .delay_range(Duration::from_secs(2), Duration::from_secs(5))
//!         .max_articles(Some(10))
//!         .build();
//!
//!     let crawler = Crawler::from_config(config)?;
//!     let stats = crawler.run(CancellationToken::new()).await;
//!     println!("Saved {} articles", stats.saved);
//!     Ok(())
//! }
//! ```

mod error;

pub mod crawler;

pub use error::{Error, Result};

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::crawler::{Crawler, CrawlerConfig, IterationOutcome, RunStats};
    pub use crate::error::Error;
    pub use crate::error::Result;
}
