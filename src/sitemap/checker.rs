//! Bounded-concurrency URL checks with a per-URL result cache

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tracing::{debug, warn};

use crate::core::config::SitemapConfig;
use crate::core::errors::{Result, ToolError};
use crate::sitemap::parser::Alternate;

/// Outcome of checking one URL
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UrlResult {
    pub url: String,
    pub status_code: Option<u16>,
    pub final_url: Option<String>,
    /// Every URL visited, starting with `url`; empty when not redirected
    pub redirect_chain: Vec<String>,
    /// Seconds until the final response arrived
    pub response_time: Option<f64>,
    pub error: Option<String>,
    pub content_type: Option<String>,
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub hreflang_links: Vec<Alternate>,
    #[serde(skip)]
    pub redirect_loop: bool,
}

impl UrlResult {
    fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Number of redirects followed
    pub fn redirect_count(&self) -> usize {
        self.redirect_chain.len().saturating_sub(1)
    }
}

enum FetchFailure {
    Timeout,
    TooManyRedirects(Vec<String>),
    Loop(Vec<String>),
    Other(String),
}

impl From<reqwest::Error> for FetchFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchFailure::Timeout
        } else {
            FetchFailure::Other(e.to_string())
        }
    }
}

type CacheSlot = Arc<OnceCell<UrlResult>>;

/// Checks URLs with at most `concurrency` requests in flight.
///
/// Each distinct URL is fetched once; concurrent callers share the fetch.
#[derive(Debug)]
pub struct UrlChecker {
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    cache: Mutex<HashMap<String, CacheSlot>>,
    max_redirects: usize,
}

impl UrlChecker {
    pub fn new(config: &SitemapConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(config.concurrency)
            .build()?;

        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            cache: Mutex::new(HashMap::new()),
            max_redirects: config.max_redirects,
        })
    }

    /// Check a URL, reusing any earlier result for it
    pub async fn check(&self, url: &str) -> UrlResult {
        let slot = {
            let mut cache = self.cache.lock().await;
            cache
                .entry(url.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        slot.get_or_init(|| async {
            match self.semaphore.acquire().await {
                Ok(_permit) => self.fetch(url).await,
                Err(_) => UrlResult::failed(url, "URL checker closed"),
            }
        })
        .await
        .clone()
    }

    /// Results of every URL checked so far
    pub async fn snapshot(&self) -> HashMap<String, UrlResult> {
        let cache = self.cache.lock().await;
        cache
            .iter()
            .filter_map(|(url, slot)| slot.get().map(|r| (url.clone(), r.clone())))
            .collect()
    }

    /// Distinct URLs requested so far
    pub async fn cached_urls(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// GET a document body, following redirects
    pub async fn fetch_document(&self, url: &str) -> Result<String> {
        let (response, _) = self.follow(url).await.map_err(|failure| match failure {
            FetchFailure::Timeout => ToolError::TimeoutError,
            FetchFailure::TooManyRedirects(_) | FetchFailure::Loop(_) => ToolError::NetworkError {
                message: format!("Redirect loop while fetching {}", url),
            },
            FetchFailure::Other(message) => ToolError::NetworkError { message },
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ApiError {
                status: status.as_u16(),
                message: format!("GET {}", url),
            });
        }

        let content_type = header_text(&response, reqwest::header::CONTENT_TYPE);
        if !content_type.contains("xml") {
            warn!("Unexpected content type for {}: {}", url, content_type);
        }

        Ok(response.text().await?)
    }

    async fn follow(&self, url: &str) -> std::result::Result<(reqwest::Response, Vec<String>), FetchFailure> {
        let mut current = reqwest::Url::parse(url)
            .map_err(|e| FetchFailure::Other(format!("Invalid URL: {}", e)))?;
        let mut visited = vec![current.clone()];
        let mut chain = vec![url.to_string()];

        loop {
            let response = self.client.get(current.clone()).send().await?;
            if !response.status().is_redirection() {
                return Ok((response, chain));
            }

            let location = header_text(&response, reqwest::header::LOCATION);
            if location.is_empty() {
                return Ok((response, chain));
            }

            let next = current
                .join(&location)
                .map_err(|e| FetchFailure::Other(format!("Invalid redirect target '{}': {}", location, e)))?;
            chain.push(next.to_string());

            if visited.contains(&next) {
                return Err(FetchFailure::Loop(chain));
            }
            if chain.len() - 1 > self.max_redirects {
                return Err(FetchFailure::TooManyRedirects(chain));
            }

            debug!("{} redirects to {}", current, next);
            visited.push(next.clone());
            current = next;
        }
    }

    async fn fetch(&self, url: &str) -> UrlResult {
        let started = Instant::now();
        let mut result = UrlResult {
            url: url.to_string(),
            ..Default::default()
        };

        match self.follow(url).await {
            Ok((response, chain)) => {
                result.response_time = Some(started.elapsed().as_secs_f64());
                result.status_code = Some(response.status().as_u16());
                result.final_url = chain.last().cloned();
                let content_type = header_text(&response, reqwest::header::CONTENT_TYPE);
                let redirected = chain.len() > 1;
                if redirected {
                    result.redirect_chain = chain;
                }

                if response.status().is_success() {
                    result.is_valid = true;
                    if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
                        result
                            .warnings
                            .push(format!("Unexpected content type: {}", content_type));
                    }
                    if redirected {
                        if let Some(final_url) = &result.final_url {
                            result.warnings.push(format!("Redirects to: {}", final_url));
                        }
                    }
                } else {
                    result.error = Some(format!("HTTP {}", response.status().as_u16()));
                }
                result.content_type = Some(content_type);
            }
            Err(FetchFailure::Timeout) => {
                result.error = Some("Request timeout".to_string());
            }
            Err(FetchFailure::TooManyRedirects(chain)) => {
                result.error = Some("Too many redirects (possible redirect loop)".to_string());
                result.redirect_chain = chain;
            }
            Err(FetchFailure::Loop(chain)) => {
                result.error = Some("Redirect loop detected".to_string());
                result.redirect_chain = chain;
                result.redirect_loop = true;
            }
            Err(FetchFailure::Other(message)) => {
                result.error = Some(message);
            }
        }

        debug!(
            "Checked {} -> {:?} {}",
            url,
            result.status_code,
            if result.is_valid { "ok" } else { "failed" }
        );
        result
    }
}

fn header_text(response: &reqwest::Response, name: reqwest::header::HeaderName) -> String {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::{header, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn redirect(to: String) -> Response {
        (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, to)]).into_response()
    }

    /// Router with the fixed pages used by checker and validator tests
    pub(crate) fn site_routes(hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/ok",
                get(|| async { ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], "<html></html>") }),
            )
            .route(
                "/en/ok",
                get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html></html>") }),
            )
            .route(
                "/json",
                get(|| async { ([(header::CONTENT_TYPE, "application/json")], "{}") }),
            )
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route("/moved", get(|| async { redirect("/ok".to_string()) }))
            .route("/loop-a", get(|| async { redirect("/loop-b".to_string()) }))
            .route("/loop-b", get(|| async { redirect("/loop-a".to_string()) }))
            .route(
                "/chain/:n",
                get(|Path(n): Path<u32>| async move { redirect(format!("/chain/{}", n + 1)) }),
            )
            .route(
                "/counted",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    ([(header::CONTENT_TYPE, "text/html")], "<html></html>")
                }),
            )
            .with_state(hits)
    }

    pub(crate) async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn checker() -> (UrlChecker, String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = serve(site_routes(hits.clone())).await;
        let mut config = SitemapConfig::new(&base);
        config.concurrency = 4;
        config.timeout = Duration::from_secs(5);
        (UrlChecker::new(&config).unwrap(), base, hits)
    }

    #[tokio::test]
    async fn test_valid_html_page() {
        let (checker, base, _) = checker().await;
        let result = checker.check(&format!("{}/ok", base)).await;

        assert!(result.is_valid);
        assert_eq!(result.status_code, Some(200));
        assert!(result.warnings.is_empty());
        assert!(result.redirect_chain.is_empty());
        assert!(result.response_time.is_some());
    }

    #[tokio::test]
    async fn test_non_html_is_a_warning() {
        let (checker, base, _) = checker().await;
        let result = checker.check(&format!("{}/json", base)).await;

        assert!(result.is_valid);
        assert_eq!(result.warnings, vec!["Unexpected content type: application/json"]);
    }

    #[tokio::test]
    async fn test_http_error() {
        let (checker, base, _) = checker().await;
        let result = checker.check(&format!("{}/missing", base)).await;

        assert!(!result.is_valid);
        assert_eq!(result.error.as_deref(), Some("HTTP 404"));
    }

    #[tokio::test]
    async fn test_redirect_is_followed_and_recorded() {
        let (checker, base, _) = checker().await;
        let result = checker.check(&format!("{}/moved", base)).await;

        assert!(result.is_valid);
        assert_eq!(result.redirect_count(), 1);
        assert_eq!(result.final_url, Some(format!("{}/ok", base)));
        assert_eq!(result.warnings, vec![format!("Redirects to: {}/ok", base)]);
    }

    #[tokio::test]
    async fn test_redirect_loop() {
        let (checker, base, _) = checker().await;
        let result = checker.check(&format!("{}/loop-a", base)).await;

        assert!(!result.is_valid);
        assert!(result.redirect_loop);
        assert_eq!(result.error.as_deref(), Some("Redirect loop detected"));
        assert_eq!(result.redirect_chain.len(), 3);
    }

    #[tokio::test]
    async fn test_too_many_redirects() {
        let (checker, base, _) = checker().await;
        let result = checker.check(&format!("{}/chain/0", base)).await;

        assert!(!result.is_valid);
        assert_eq!(
            result.error.as_deref(),
            Some("Too many redirects (possible redirect loop)")
        );
        assert_eq!(result.redirect_count(), 11);
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let (checker, _, _) = checker().await;
        let result = checker.check("http://127.0.0.1:9/nothing").await;
        assert!(!result.is_valid);
        assert!(result.error.is_some());
        assert_eq!(result.status_code, None);
    }

    #[tokio::test]
    async fn test_concurrent_checks_share_one_fetch() {
        let (checker, base, hits) = checker().await;
        let url = format!("{}/counted", base);

        let results = futures_util::future::join_all((0..8).map(|_| checker.check(&url))).await;

        assert!(results.iter().all(|r| r.is_valid));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(checker.cached_urls().await, 1);
        assert_eq!(checker.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_requests_stay_within_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/slow/:n",
                get(
                    |State((in_flight, peak)): State<(Arc<AtomicUsize>, Arc<AtomicUsize>)>| async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        ([(header::CONTENT_TYPE, "text/html")], "<html></html>")
                    },
                ),
            )
            .with_state((in_flight.clone(), peak.clone()));
        let base = serve(app).await;

        let mut config = SitemapConfig::new(&base);
        config.concurrency = 3;
        config.timeout = Duration::from_secs(5);
        let checker = UrlChecker::new(&config).unwrap();

        let urls: Vec<String> = (0..20).map(|n| format!("{}/slow/{}", base, n)).collect();
        let results = futures_util::future::join_all(urls.iter().map(|url| checker.check(url))).await;

        assert!(results.iter().all(|r| r.is_valid));
        assert_eq!(checker.cached_urls().await, 20);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak > 0 && peak <= config.concurrency, "peak in-flight was {}", peak);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }
}
