//! # Mock Fetcher for Testing
//!
//! Provides a `MockFetcher` that implements the `Fetcher` trait for use in
//! tests. Responses are scripted per URL, and every request is recorded so
//! tests can assert which URLs the crawler touched. Unknown URLs answer 404.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::crawler::error::CrawlError;
use crate::crawler::fetch::{FetchFuture, FetchedPage, Fetcher};

#[derive(Debug, Clone)]
enum Scripted {
    Page { final_url: String, body: Vec<u8> },
    Status(u16),
}

/// A scripted fetcher for tests
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    routes: Arc<Mutex<HashMap<String, Scripted>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    /// Creates a mock that answers 404 to everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`
    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) -> &Self {
        self.serve_redirected(url, url, body)
    }

    /// Serve `body` for `url` as if the request ended up at `final_url`
    pub fn serve_redirected(&self, url: &str, final_url: &str, body: impl Into<Vec<u8>>) -> &Self {
        self.insert(
            url,
            Scripted::Page {
                final_url: final_url.to_string(),
                body: body.into(),
            },
        )
    }

    /// Answer `url` with a non-success status
    pub fn fail(&self, url: &str, status: u16) -> &Self {
        self.insert(url, Scripted::Status(status))
    }

    /// Every URL requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of times `url` was requested
    pub fn request_count(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.as_str() == url).count()
    }

    fn insert(&self, url: &str, scripted: Scripted) -> &Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(url.to_string(), scripted);
        }
        self
    }

    fn respond(&self, url: &str) -> Result<FetchedPage, CrawlError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        let scripted = self
            .routes
            .lock()
            .map_err(|e| CrawlError::Other(format!("mock fetcher poisoned: {}", e)))?
            .get(url)
            .cloned()
            .unwrap_or(Scripted::Status(404));

        match scripted {
            Scripted::Page { final_url, body } => Ok(FetchedPage {
                url: final_url,
                status: 200,
                body,
            }),
            Scripted::Status(status) => Err(CrawlError::Status {
                url: url.to_string(),
                status,
            }),
        }
    }
}

impl Fetcher for MockFetcher {
    fn get<'a>(&'a self, url: &'a str, _timeout: Duration) -> FetchFuture<'a> {
        let result = self.respond(url);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses() {
        let fetcher = MockFetcher::new();
        fetcher
            .serve("https://example.com/a", "alpha")
            .fail("https://example.com/b", 500);

        let page = fetcher
            .get("https://example.com/a", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(page.body, b"alpha");

        let err = fetcher
            .get("https://example.com/b", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Status { status: 500, .. }));

        let err = fetcher
            .get("https://example.com/unknown", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Status { status: 404, .. }));

        assert_eq!(fetcher.requests().len(), 3);
        assert_eq!(fetcher.request_count("https://example.com/a"), 1);
    }

    #[tokio::test]
    async fn test_redirected_page() {
        let fetcher = MockFetcher::new();
        fetcher.serve_redirected("https://example.com/random", "https://example.com/wiki/X", "x");

        let page = fetcher
            .get("https://example.com/random", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(page.url, "https://example.com/wiki/X");
    }
}
