//! Segment-by-segment sitemap validation

use futures_util::future::join_all;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::core::config::SitemapConfig;
use crate::core::errors::{Result, ToolError};
use crate::sitemap::checker::{UrlChecker, UrlResult};
use crate::sitemap::parser::{self, SitemapEntry};
use crate::sitemap::report::{HreflangCoverage, SegmentResult, ValidationReport};

/// Redirect chains with more hops than this are reported
pub const LONG_REDIRECT_CHAIN: usize = 5;

/// Receives progress while a validation runs
pub trait ValidationObserver: Send + Sync {
    fn segment_started(&self, _segment: &str, _urls: usize) {}
    fn url_checked(&self, _result: &UrlResult) {}
    fn segment_finished(&self, _result: &SegmentResult) {}
}

/// Observer that ignores all progress
pub struct SilentObserver;

impl ValidationObserver for SilentObserver {}

pub struct SitemapValidator {
    config: SitemapConfig,
    checker: UrlChecker,
}

impl SitemapValidator {
    pub fn new(config: SitemapConfig) -> Result<Self> {
        config.validate()?;
        let checker = UrlChecker::new(&config)?;
        Ok(Self { config, checker })
    }

    /// `(segment name, sitemap URL)` pairs to validate
    pub async fn segments(&self) -> Result<Vec<(String, String)>> {
        if !self.config.from_index {
            return Ok(self
                .config
                .segments
                .iter()
                .map(|s| (s.clone(), self.config.segment_url(s)))
                .collect());
        }

        let index_url = self.config.index_url();
        info!("Discovering segments from {}", index_url);
        let xml = self.checker.fetch_document(&index_url).await?;
        let segments: Vec<(String, String)> = parser::parse_sitemap_index(&xml)?
            .into_iter()
            .map(|url| (parser::segment_name(&url), url))
            .collect();

        if segments.is_empty() {
            return Err(ToolError::ConfigError {
                message: format!("Sitemap index {} lists no sitemaps", index_url),
            });
        }
        Ok(segments)
    }

    /// Fetch, parse and check one segment sitemap
    pub async fn validate_segment(
        &self,
        segment: &str,
        sitemap_url: &str,
        observer: &dyn ValidationObserver,
    ) -> (SegmentResult, Vec<SitemapEntry>) {
        let mut result = SegmentResult::new(segment);
        info!("Validating {} sitemap: {}", segment, sitemap_url);

        let xml = match self.checker.fetch_document(sitemap_url).await {
            Ok(xml) => xml,
            Err(e) => {
                error!("Failed to fetch {}: {}", sitemap_url, e);
                result.errors.push(format!("Failed to fetch sitemap: {} ({})", sitemap_url, e));
                result.unreadable = true;
                return (result, Vec::new());
            }
        };

        let entries = match parser::parse_sitemap(&xml) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to parse {}: {}", sitemap_url, e);
                result.errors.push(format!("Failed to parse sitemap: {}", e));
                result.unreadable = true;
                return (result, Vec::new());
            }
        };

        if entries.is_empty() {
            warn!("No URLs found in {}", sitemap_url);
            result.errors.push("No URLs found in sitemap".to_string());
            return (result, entries);
        }

        observer.segment_started(segment, entries.len());

        let checks = entries.iter().map(move |entry| async move {
            let mut checked = self.checker.check(&entry.loc).await;
            checked.hreflang_links = entry.alternates.clone();
            observer.url_checked(&checked);
            checked
        });
        for checked in join_all(checks).await {
            result.push(checked);
        }

        if self.config.check_alternates {
            let locs: HashSet<&str> = entries.iter().map(|e| e.loc.as_str()).collect();
            let mut alternates: Vec<&str> = entries
                .iter()
                .flat_map(|e| e.alternates.iter().map(|a| a.href.as_str()))
                .filter(|href| !href.is_empty() && !locs.contains(href))
                .collect();
            alternates.sort_unstable();
            alternates.dedup();
            join_all(alternates.into_iter().map(|href| self.checker.check(href))).await;
        }

        observer.segment_finished(&result);
        info!(
            "{}: {}/{} URLs valid",
            segment, result.valid_urls, result.total_urls
        );
        (result, entries)
    }

    /// Validate every segment, then run the cross-segment checks
    pub async fn run(&self, observer: &dyn ValidationObserver) -> Result<ValidationReport> {
        let started = Instant::now();
        let mut report = ValidationReport::new(&self.config.base_url);
        let mut all_entries = Vec::new();

        for (segment, url) in self.segments().await? {
            let (result, entries) = self.validate_segment(&segment, &url, observer).await;
            report.add_segment(result);
            all_entries.extend(entries);
        }

        let known = self.checker.snapshot().await;
        let expected = self.config.expected_hreflangs();

        let mut seen = HashSet::new();
        for entry in &all_entries {
            for issue in hreflang_issues(entry, &expected, &known) {
                if seen.insert(issue.clone()) {
                    report.hreflang_issues.push(issue);
                }
            }
            report.entry_issues.extend(entry.lint(&self.config.base_url));
        }

        report.redirect_loops = redirect_issues(&known);
        report.duplicate_urls = duplicate_urls(&all_entries);
        report.hreflang_coverage = hreflang_coverage(&all_entries);
        report.execution_time = started.elapsed().as_secs_f64();

        info!(
            "Checked {} URLs ({} distinct requests) in {:.2}s",
            report.total_urls,
            self.checker.cached_urls().await,
            report.execution_time
        );
        Ok(report)
    }
}

/// Missing hreflang values and alternates known to be broken
pub fn hreflang_issues(
    entry: &SitemapEntry,
    expected: &[String],
    known: &HashMap<String, UrlResult>,
) -> Vec<String> {
    let mut issues = Vec::new();
    if entry.alternates.is_empty() {
        return issues;
    }

    let present: HashSet<&str> = entry.alternates.iter().map(|a| a.hreflang.as_str()).collect();
    let missing: Vec<&str> = expected
        .iter()
        .map(String::as_str)
        .filter(|lang| !present.contains(lang))
        .collect();
    if !missing.is_empty() {
        issues.push(format!("{}: Missing hreflang tags: {}", entry.loc, missing.join(", ")));
    }

    for alt in &entry.alternates {
        if let Some(result) = known.get(&alt.href).filter(|r| !r.is_valid) {
            issues.push(format!(
                "{}: Alternate [{}] {} is not accessible ({})",
                entry.loc,
                alt.hreflang,
                alt.href,
                result.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
    issues
}

/// Redirect loops and long chains, sorted by URL
pub fn redirect_issues(known: &HashMap<String, UrlResult>) -> Vec<String> {
    let sorted: BTreeMap<&String, &UrlResult> = known.iter().collect();
    let mut issues = Vec::new();
    for (url, result) in sorted {
        if result.redirect_loop {
            issues.push(format!(
                "{}: Redirect loop ({})",
                url,
                result.redirect_chain.join(" -> ")
            ));
        } else if result.redirect_count() > LONG_REDIRECT_CHAIN {
            issues.push(format!(
                "{}: Long redirect chain ({} redirects)",
                url,
                result.redirect_count()
            ));
        }
    }
    issues
}

/// URLs listed more than once across all segments
pub fn duplicate_urls(entries: &[SitemapEntry]) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.loc.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(url, _)| url.to_string())
        .collect()
}

pub fn hreflang_coverage(entries: &[SitemapEntry]) -> HreflangCoverage {
    HreflangCoverage {
        total_entries: entries.len(),
        entries_with_alternates: entries.iter().filter(|e| !e.alternates.is_empty()).count(),
        total_alternates: entries.iter().map(|e| e.alternates.len()).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sitemap::checker::tests::site_routes;
    use crate::sitemap::parser::Alternate;
    use axum::http::header;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn urlset(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:xhtml="http://www.w3.org/1999/xhtml">{}</urlset>"#,
            body
        )
    }

    fn xml_route(xml: String) -> axum::routing::MethodRouter {
        get(move || {
            let xml = xml.clone();
            async move { ([(header::CONTENT_TYPE, "application/xml")], xml) }
        })
    }

    /// Site with four segments: two populated, one missing, one empty
    async fn serve_site() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let pages = urlset(&format!(
            r#"<url><loc>{b}/ok</loc>
                 <xhtml:link rel="alternate" hreflang="en" href="{b}/en/ok"/>
                 <xhtml:link rel="alternate" hreflang="es" href="{b}/ok"/>
                 <xhtml:link rel="alternate" hreflang="x-default" href="{b}/ok"/></url>
               <url><loc>{b}/moved</loc></url>
               <url><loc>{b}/missing</loc></url>"#,
            b = base
        ));
        let articles = urlset(&format!(
            r#"<url><loc>{b}/ok</loc></url>
               <url><loc>{b}/loop-a</loc>
                 <xhtml:link rel="alternate" hreflang="en" href="{b}/missing"/>
                 <xhtml:link rel="alternate" hreflang="es" href="{b}/loop-a"/></url>"#,
            b = base
        ));
        let index = format!(
            r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                 <sitemap><loc>{b}/sitemap-pages.xml</loc></sitemap>
               </sitemapindex>"#,
            b = base
        );

        let app = Router::new()
            .route("/sitemap.xml", xml_route(index))
            .route("/sitemap-pages.xml", xml_route(pages))
            .route("/sitemap-articles.xml", xml_route(articles))
            .route("/sitemap-legal.xml", xml_route(urlset("")))
            .merge(site_routes(Arc::new(AtomicUsize::new(0))));

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        base
    }

    struct Counting(AtomicUsize);

    impl ValidationObserver for Counting {
        fn url_checked(&self, _result: &UrlResult) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_full_run() {
        let base = serve_site().await;
        let validator = SitemapValidator::new(SitemapConfig::new(&base)).unwrap();
        let observer = Counting(AtomicUsize::new(0));

        let report = validator.run(&observer).await.unwrap();

        let segments: Vec<&str> = report.sitemap_results.iter().map(|s| s.segment.as_str()).collect();
        assert_eq!(segments, vec!["pages", "articles", "works", "legal"]);

        let pages = &report.sitemap_results[0];
        assert_eq!((pages.total_urls, pages.valid_urls, pages.failed_urls), (3, 2, 1));
        assert_eq!(pages.redirect_urls, 1);

        let articles = &report.sitemap_results[1];
        assert_eq!((articles.valid_urls, articles.failed_urls), (1, 1));

        let works = &report.sitemap_results[2];
        assert!(works.unreadable);
        assert!(works.errors[0].starts_with("Failed to fetch sitemap"));

        let legal = &report.sitemap_results[3];
        assert!(!legal.unreadable);
        assert_eq!(legal.errors, vec!["No URLs found in sitemap"]);

        assert_eq!(report.total_urls, 5);
        assert_eq!(observer.0.load(Ordering::SeqCst), 5);
        assert_eq!(report.duplicate_urls, vec![format!("{}/ok", base)]);
        assert_eq!(report.redirect_loops.len(), 1);
        assert!(report.redirect_loops[0].starts_with(&format!("{}/loop-a: Redirect loop", base)));

        assert_eq!(
            report.hreflang_issues,
            vec![
                format!("{}/loop-a: Missing hreflang tags: x-default", base),
                format!(
                    "{b}/loop-a: Alternate [en] {b}/missing is not accessible (HTTP 404)",
                    b = base
                ),
                format!(
                    "{b}/loop-a: Alternate [es] {b}/loop-a is not accessible (Redirect loop detected)",
                    b = base
                ),
            ]
        );
        assert_eq!(
            report.hreflang_coverage,
            HreflangCoverage {
                total_entries: 5,
                entries_with_alternates: 2,
                total_alternates: 5,
            }
        );
        assert!(!report.passed());
    }

    #[tokio::test]
    async fn test_alternates_are_checked_through_the_cache() {
        let base = serve_site().await;
        let mut config = SitemapConfig::new(&base);
        config.segments = vec!["pages".to_string()];
        let validator = SitemapValidator::new(config).unwrap();

        validator.run(&SilentObserver).await.unwrap();
        let known = validator.checker.snapshot().await;
        assert!(known[&format!("{}/en/ok", base)].is_valid);
    }

    #[tokio::test]
    async fn test_skip_alternates() {
        let base = serve_site().await;
        let mut config = SitemapConfig::new(&base);
        config.segments = vec!["pages".to_string()];
        config.check_alternates = false;
        let validator = SitemapValidator::new(config).unwrap();

        let report = validator.run(&SilentObserver).await.unwrap();
        let known = validator.checker.snapshot().await;
        assert!(!known.contains_key(&format!("{}/en/ok", base)));
        assert!(report.hreflang_issues.is_empty());
    }

    #[tokio::test]
    async fn test_segments_from_index() {
        let base = serve_site().await;
        let mut config = SitemapConfig::new(&base);
        config.from_index = true;
        let validator = SitemapValidator::new(config).unwrap();

        let segments = validator.segments().await.unwrap();
        assert_eq!(
            segments,
            vec![("pages".to_string(), format!("{}/sitemap-pages.xml", base))]
        );
    }

    fn entry(loc: &str, alternates: &[(&str, &str)]) -> SitemapEntry {
        SitemapEntry {
            loc: loc.to_string(),
            alternates: alternates
                .iter()
                .map(|(lang, href)| Alternate {
                    hreflang: lang.to_string(),
                    href: href.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_hreflang_issues_without_alternates() {
        let expected = SitemapConfig::new("https://a.test").expected_hreflangs();
        assert!(hreflang_issues(&entry("https://a.test/x", &[]), &expected, &HashMap::new()).is_empty());

        let issues = hreflang_issues(
            &entry("https://a.test/x", &[("es", "https://a.test/x")]),
            &expected,
            &HashMap::new(),
        );
        assert_eq!(issues, vec!["https://a.test/x: Missing hreflang tags: en, x-default"]);
    }

    #[test]
    fn test_long_redirect_chain() {
        let chain: Vec<String> = (0..=6).map(|i| format!("https://a.test/{}", i)).collect();
        let mut known = HashMap::new();
        known.insert(
            chain[0].clone(),
            UrlResult {
                url: chain[0].clone(),
                redirect_chain: chain.clone(),
                is_valid: true,
                ..Default::default()
            },
        );
        assert_eq!(
            redirect_issues(&known),
            vec!["https://a.test/0: Long redirect chain (6 redirects)"]
        );
    }

    #[test]
    fn test_duplicates_and_coverage() {
        let entries = vec![
            entry("https://a.test/a", &[("en", "https://a.test/en/a")]),
            entry("https://a.test/b", &[]),
            entry("https://a.test/a", &[]),
        ];
        assert_eq!(duplicate_urls(&entries), vec!["https://a.test/a"]);
        assert_eq!(hreflang_coverage(&entries).entries_with_alternates, 1);
    }
}
