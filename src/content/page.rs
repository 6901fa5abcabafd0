//! Page inputs for the capture pipeline.
//!
//! A [`PageSource`] is the page a content agent lives in: it knows its URL
//! and title, can refetch its original HTML over the network, and can
//! serialize its live DOM.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for a network refetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

// ============================================================================
// PageSource
// ============================================================================

/// Page that can be captured.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Current page URL.
    fn url(&self) -> String;

    /// Current document title.
    fn title(&self) -> String;

    /// Refetches the page's original HTML from its URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be fetched.
    async fn fetch_original(&self) -> Result<String>;

    /// Serializes the live document element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureFailed`] if the document is unavailable.
    fn serialize_dom(&self) -> Result<String>;
}

// ============================================================================
// HttpFetcher
// ============================================================================

/// Refetches page HTML over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with [`DEFAULT_FETCH_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Creates a fetcher with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Fetches the body of `url`.
    ///
    /// # Errors
    ///
    /// - [`Error::CaptureFailed`] for unparseable or non-HTTP URLs
    /// - [`Error::Http`] for transport failures and non-success statuses
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::capture_failed(format!("invalid page url {url}: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::capture_failed(format!(
                "cannot refetch {} url",
                parsed.scheme()
            )));
        }

        debug!(url = %parsed, "Refetching page");

        let response = self.client.get(parsed).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

// ============================================================================
// StaticPage
// ============================================================================

#[derive(Debug, Clone)]
struct PageState {
    url: String,
    title: String,
    dom: Option<String>,
}

/// In-memory page with an optional network refetch.
///
/// # Example
///
/// ```
/// use page_bridge::content::{PageSource, StaticPage};
///
/// let page = StaticPage::new("https://example.com/", "Example", "<html></html>");
/// assert_eq!(page.title(), "Example");
/// ```
#[derive(Debug)]
pub struct StaticPage {
    state: RwLock<PageState>,
    fetcher: Option<HttpFetcher>,
}

impl StaticPage {
    /// Creates a page with the given live DOM and no network access.
    pub fn new(url: impl Into<String>, title: impl Into<String>, dom: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(PageState {
                url: url.into(),
                title: title.into(),
                dom: Some(dom.into()),
            }),
            fetcher: None,
        }
    }

    /// Enables network refetch through `fetcher`.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: HttpFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replaces the page contents after a navigation.
    pub fn navigate(&self, url: impl Into<String>, title: impl Into<String>, dom: impl Into<String>) {
        let mut state = self.state.write();
        state.url = url.into();
        state.title = title.into();
        state.dom = Some(dom.into());
    }

    /// Drops the live document; later serializations fail.
    pub fn unload(&self) {
        self.state.write().dom = None;
    }
}

#[async_trait]
impl PageSource for StaticPage {
    fn url(&self) -> String {
        self.state.read().url.clone()
    }

    fn title(&self) -> String {
        self.state.read().title.clone()
    }

    async fn fetch_original(&self) -> Result<String> {
        let Some(fetcher) = &self.fetcher else {
            return Err(Error::capture_failed("network refetch disabled"));
        };
        let url = self.url();
        fetcher.fetch(&url).await
    }

    fn serialize_dom(&self) -> Result<String> {
        self.state
            .read()
            .dom
            .clone()
            .ok_or_else(|| Error::capture_failed("document is not available"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one HTTP response on a local port.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.expect("write");
            socket.shutdown().await.expect("shutdown");
        });

        format!("http://{addr}/page")
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let url = serve_once("200 OK", "<html><body>net</body></html>").await;
        let fetcher = HttpFetcher::new().expect("client");
        let body = fetcher.fetch(&url).await.expect("fetch");
        assert_eq!(body, "<html><body>net</body></html>");
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let url = serve_once("404 Not Found", "missing").await;
        let fetcher = HttpFetcher::new().expect("client");
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http() {
        let fetcher = HttpFetcher::new().expect("client");
        let err = fetcher.fetch("about:blank").await.unwrap_err();
        assert!(matches!(err, Error::CaptureFailed { .. }));

        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, Error::CaptureFailed { .. }));
    }

    #[tokio::test]
    async fn test_static_page_without_fetcher() {
        let page = StaticPage::new("https://example.com/", "Example", "<p>dom</p>");
        assert!(page.fetch_original().await.is_err());
        assert_eq!(page.serialize_dom().expect("dom"), "<p>dom</p>");
    }

    #[tokio::test]
    async fn test_static_page_navigate_and_unload() {
        let page = StaticPage::new("https://a.test/", "A", "<p>a</p>");
        page.navigate("https://b.test/", "B", "<p>b</p>");
        assert_eq!(page.url(), "https://b.test/");
        assert_eq!(page.title(), "B");

        page.unload();
        assert!(page.serialize_dom().is_err());
    }
}
