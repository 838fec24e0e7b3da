//! # Wikipedia Article Crawler
//!
//! This module provides the crawl-and-extract pipeline: it repeatedly asks the
//! wiki for a random article, parses the page into an [`ArticleModel`], writes
//! every artifact of the article into its own directory, and records the
//! article in a durable ledger so it is never downloaded twice.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: Immutable configuration (storage root, delays, timeouts, user agent)
//! - `DocumentTree` / `HtmlDocument`: Minimal typed view of a parsed page
//! - `extract_title` / `extract_article`: Pure extraction of the article model
//! - `Fetcher` / `FetchClient`: HTTP GET with identity headers and timeouts
//! - `ArtifactStore`: Per-article directory layout and artifact writers
//! - `DownloadLedger`: Append-only CSV record of completed articles
//! - `Crawler`: The iteration state machine and the unbounded crawl loop
//!
//! ## Features
//!
//! - Sections grouped by heading, with an `Introduction` section for leading text
//! - Images, data tables, linked media, references and external links
//! - Per-artifact fault isolation: one failing download never aborts an article
//! - Fixed pauses after skips and failures, randomized delay after each article
//! - Graceful shutdown through a cancellation token

mod config;
mod content_extraction;
mod document;
mod error;
mod fetch;
mod ledger;
pub mod mock_fetcher;
mod pipeline;
mod storage;

pub use config::{CrawlerConfig, CrawlerConfigBuilder, DEFAULT_MEDIA_EXTENSIONS};
pub use content_extraction::{extract_article, extract_title};
pub use document::{DocumentTree, HtmlDocument};
pub use error::{CrawlError, ErrorKind, ExtractionError};
pub use fetch::{FetchClient, FetchFuture, FetchedPage, Fetcher};
pub use ledger::{DownloadLedger, LedgerEntry, LedgerError};
pub use pipeline::{Crawler, IterationOutcome, RunStats, SavedArticle, SkipReason};
pub use storage::{ArtifactStore, FileTally, PersistReport, sanitize_title};

use serde::{Deserialize, Serialize};

/// Heading of the section collecting text that precedes the first heading
pub const INTRODUCTION: &str = "Introduction";

/// Everything extracted from one article page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleModel {
    /// Title taken from the primary heading
    pub title: String,

    /// Sections in document order, never empty
    pub sections: Vec<Section>,

    /// Images found in the content region
    pub images: Vec<ImageRef>,

    /// Data tables found in the content region
    pub tables: Vec<Table>,

    /// Links to media files
    pub linked_media: Vec<MediaRef>,

    /// Text of each reference list entry
    pub references: Vec<String>,

    /// Entries of the external links list
    pub external_links: Vec<ExternalLink>,
}

/// A heading and the paragraphs that follow it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub paragraphs: Vec<String>,
}

/// An image to download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub absolute_url: String,
}

/// A linked media file to download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub absolute_url: String,
}

/// A table as rows of cell text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

/// An entry of the external links section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub url: String,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_model_serializes() {
        let model = ArticleModel {
            title: "Test Page".to_string(),
            sections: vec![Section {
                heading: INTRODUCTION.to_string(),
                paragraphs: vec!["Hello".to_string()],
            }],
            ..Default::default()
        };

        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["title"], "Test Page");
        assert_eq!(json["sections"][0]["heading"], "Introduction");
        assert_eq!(json["images"].as_array().unwrap().len(), 0);
    }
}
