//! HTTP fetching for the crawler module
//!
//! The crawl loop and the artifact store only see the [`Fetcher`] trait, so
//! tests can drive them with a scripted fetcher instead of the network.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client as ReqwestClient;
use tracing::{debug, instrument};

use crate::crawler::CrawlerConfig;
use crate::crawler::error::CrawlError;

/// Boxed future returned by [`Fetcher::get`]
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<FetchedPage, CrawlError>> + Send + 'a>>;

/// A successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Raw response body
    pub body: Vec<u8>,
}

/// Issues GET requests
pub trait Fetcher: Send + Sync {
    /// GET `url`, failing on transport errors, timeouts and non-success statuses
    fn get<'a>(&'a self, url: &'a str, timeout: Duration) -> FetchFuture<'a>;
}

/// reqwest backed fetcher that identifies itself with the configured user agent
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: ReqwestClient,
}

impl FetchClient {
    /// Create a client from the crawler configuration
    pub fn new(config: &CrawlerConfig) -> Result<Self, CrawlError> {
        let client = ReqwestClient::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, CrawlError> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?.to_vec();
        debug!(url = %final_url, bytes = body.len(), "Fetched");
        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

impl Fetcher for FetchClient {
    fn get<'a>(&'a self, url: &'a str, timeout: Duration) -> FetchFuture<'a> {
        Box::pin(self.fetch(url, timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn client(user_agent: &str) -> FetchClient {
        let config = CrawlerConfig::builder().user_agent(user_agent).build();
        FetchClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_get_success() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("GET", "/wiki/Page")
            .match_header("user-agent", "wikicrawl-test")
            .with_status(200)
            .with_body("<html>hello</html>")
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/wiki/Page", server.url());
        let page = client("wikicrawl-test")
            .get(&url, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.url, url);
        assert_eq!(page.body, b"<html>hello</html>");

        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_redirect_reports_final_url() {
        let mut server = Server::new_async().await;
        let target = format!("{}/wiki/Landed", server.url());
        let redirect = server
            .mock("GET", "/wiki/Special:Random")
            .with_status(302)
            .with_header("location", target.as_str())
            .create_async()
            .await;
        let landed = server
            .mock("GET", "/wiki/Landed")
            .with_status(200)
            .with_body("landed")
            .create_async()
            .await;

        let url = format!("{}/wiki/Special:Random", server.url());
        let page = client("wikicrawl-test")
            .get(&url, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(page.url, target);
        assert_eq!(page.body, b"landed");

        redirect.assert_async().await;
        landed.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("GET", "/missing.png")
            .with_status(404)
            .with_body("Not Found")
            .create_async()
            .await;

        let url = format!("{}/missing.png", server.url());
        let result = client("wikicrawl-test")
            .get(&url, Duration::from_secs(5))
            .await;

        assert!(matches!(result, Err(CrawlError::Status { status: 404, .. })));
        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let result = client("wikicrawl-test")
            .get("http://127.0.0.1:1/unreachable", Duration::from_secs(2))
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), crate::crawler::ErrorKind::Transport);
    }
}
