//! Page fetching with retry and optional read-through caching
//!
//! All network traffic goes through [`PageFetcher`]. A fetch is retried a
//! bounded number of times with a linearly growing backoff; only after the
//! last attempt fails does the error propagate, and the calling crawl task
//! must treat it as fatal for its own unit of work.
//!
//! The cache is read-only once populated: a hit is never re-validated
//! against the live page, so it trades freshness for reduced load. Callers
//! that re-crawl for new content run with the cache disabled.

use crate::MinerError;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

/// Browser-like identification header; some forums serve crawler UAs a
/// degraded markup variant.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/90.0.4430.93 Safari/537.36";

/// Builds the shared HTTP client
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Retry behavior for failed fetches
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts before the error propagates
    pub max_attempts: u32,

    /// Backoff between attempts; attempt `n` failing sleeps `n * base_delay`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(30),
        }
    }
}

/// Raw page cache keyed by a sanitized form of the URL
#[derive(Debug)]
pub struct PageCache {
    dir: PathBuf,
    domain: String,
}

impl PageCache {
    pub fn new(dir: PathBuf, domain: String) -> Self {
        Self { dir, domain }
    }

    /// Cache key: the URL minus its domain, with path separators and colons
    /// stripped, suffixed `.html`
    fn path_for(&self, url: &str) -> PathBuf {
        let key = url
            .replace(&self.domain, "")
            .replace(['/', ':'], "");
        self.dir.join(format!("{}.html", key))
    }

    fn load(&self, url: &str) -> Option<String> {
        let path = self.path_for(url);
        if path.is_file() {
            std::fs::read_to_string(path).ok()
        } else {
            None
        }
    }

    fn save(&self, url: &str, body: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(url), body)
    }
}

/// HTTP page fetcher with bounded retry and optional disk cache
pub struct PageFetcher {
    client: Client,
    cache: Option<PageCache>,
    retry: RetryPolicy,
}

impl PageFetcher {
    pub fn new(client: Client, cache: Option<PageCache>, retry: RetryPolicy) -> Self {
        Self {
            client,
            cache,
            retry,
        }
    }

    /// Fetches a page body, retrying per the policy
    pub async fn fetch(&self, url: &str) -> crate::Result<String> {
        self.fetch_parsed(url, |body| Ok(body.to_string())).await
    }

    /// Fetches a page and runs `parse` over the body, retrying the whole
    /// fetch+parse step on any failure
    ///
    /// An extraction failure counts as a failed attempt just like a network
    /// error, matching the retry contract of the crawl tasks.
    pub async fn fetch_parsed<T, F>(&self, url: &str, parse: F) -> crate::Result<T>
    where
        F: Fn(&str) -> crate::Result<T>,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.retry.max_attempts {
            match self.fetch_once(url).await.and_then(|body| parse(&body)) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(
                        "Fetch attempt {}/{} failed for {}: {}",
                        attempt,
                        self.retry.max_attempts,
                        url,
                        e
                    );
                    last_error = e.to_string();

                    // Wait only between attempts, never after the last one.
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.base_delay * attempt).await;
                    }
                }
            }
        }

        Err(MinerError::Fetch {
            url: url.to_string(),
            attempts: self.retry.max_attempts,
            message: last_error,
        })
    }

    async fn fetch_once(&self, url: &str) -> crate::Result<String> {
        if let Some(cache) = &self.cache {
            if let Some(body) = cache.load(url) {
                tracing::debug!("Cache hit for {}", url);
                return Ok(body);
            }
        }

        tracing::debug!("Requesting {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;

        if let Some(cache) = &self.cache {
            tracing::debug!("Caching {}", url);
            cache.save(url, &body)?;
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher(cache: Option<PageCache>) -> PageFetcher {
        PageFetcher::new(
            build_http_client().unwrap(),
            cache,
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::ZERO,
            },
        )
    }

    #[test]
    fn test_cache_key_sanitization() {
        let cache = PageCache::new(PathBuf::from("/tmp/cache"), "forum.example.com".to_string());
        let path = cache.path_for("https://forum.example.com/forum/general/page-2");
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "httpsforumgeneralpage-2.html"
        );
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(None);
        let body = fetcher.fetch(&format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(body, "<html>hi</html>");
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(None);
        let body = fetcher
            .fetch(&format!("{}/flaky", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "recovered");
    }

    #[tokio::test]
    async fn test_retry_exhaustion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(None);
        let result = fetcher.fetch(&format!("{}/broken", server.uri())).await;

        match result {
            Err(MinerError::Fetch { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected fetch error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_cache_read_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cached"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let domain = url::Url::parse(&server.uri())
            .unwrap()
            .host_str()
            .unwrap()
            .to_string();
        let url = format!("{}/cached", server.uri());

        let fetcher = test_fetcher(Some(PageCache::new(dir.path().to_path_buf(), domain.clone())));
        assert_eq!(fetcher.fetch(&url).await.unwrap(), "fresh");

        // Second fetch must come from disk; the mock allows one hit only.
        let fetcher = test_fetcher(Some(PageCache::new(dir.path().to_path_buf(), domain)));
        assert_eq!(fetcher.fetch(&url).await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_parse_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/odd"))
            .respond_with(ResponseTemplate::new(200).set_body_string("payload"))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(None);
        let result = fetcher
            .fetch_parsed(&format!("{}/odd", server.uri()), |_| {
                Err::<(), _>(MinerError::Parse {
                    url: "x".to_string(),
                    message: "bad markup".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(MinerError::Fetch { attempts: 3, .. })));
    }
}
