//! Error types for the crawler module

use std::path::PathBuf;

use crate::crawler::ledger::LedgerError;
use crate::error::Error as CrateError;
use thiserror::Error;

/// Reasons a parsed page cannot be turned into an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The page has no primary heading to take the title from
    #[error("page has no title heading")]
    MissingTitle,

    /// The page has no main content region
    #[error("page has no main content region")]
    MissingContent,
}

/// Error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// HTTP client error, including timeouts
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("HTTP status {status} for {url}")]
    Status {
        /// Requested URL
        url: String,
        /// Status code returned
        status: u16,
    },

    /// Content extraction error
    #[error("Content extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// A single artifact could not be fetched or written
    #[error("Artifact error for {}: {message}", path.display())]
    ArtifactWrite {
        /// Target path of the artifact
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// Reading or appending the download ledger failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Filesystem error outside a single artifact
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

/// Coarse classification used to pick a recovery policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Extraction,
    ArtifactWrite,
    Ledger,
    Internal,
}

impl CrawlError {
    /// Build an artifact error from anything displayable
    pub fn artifact(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        CrawlError::ArtifactWrite {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrawlError::Http(_) | CrawlError::Status { .. } => ErrorKind::Transport,
            CrawlError::Extraction(_) => ErrorKind::Extraction,
            CrawlError::ArtifactWrite { .. } => ErrorKind::ArtifactWrite,
            CrawlError::Ledger(_) => ErrorKind::Ledger,
            CrawlError::UrlParse(_) | CrawlError::Io(_) | CrawlError::Other(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<CrawlError> for CrateError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::Http(e) => CrateError::Http(e),
            CrawlError::Io(e) => CrateError::Io(e),
            _ => CrateError::Crawl(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let status = CrawlError::Status {
            url: "https://example.com".to_string(),
            status: 503,
        };
        assert_eq!(status.kind(), ErrorKind::Transport);
        assert_eq!(
            CrawlError::from(ExtractionError::MissingTitle).kind(),
            ErrorKind::Extraction
        );
        assert_eq!(
            CrawlError::artifact("/tmp/x.png", "boom").kind(),
            ErrorKind::ArtifactWrite
        );
        assert_eq!(
            CrawlError::Other("odd".to_string()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_artifact_error_message() {
        let err = CrawlError::artifact("/tmp/images/a.png", "HTTP status 404");
        assert_eq!(
            err.to_string(),
            "Artifact error for /tmp/images/a.png: HTTP status 404"
        );
    }

    #[test]
    fn test_conversion_to_crate_error() {
        let err: CrateError = CrawlError::from(ExtractionError::MissingContent).into();
        assert!(matches!(err, CrateError::Crawl(msg) if msg.contains("main content")));
    }
}
