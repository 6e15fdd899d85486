//! Sitemap validation report

use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::core::errors::{Result, ToolError};
use crate::sitemap::checker::UrlResult;

/// Results for one sitemap segment
#[derive(Debug, Clone, Default, Serialize)]
pub struct SegmentResult {
    pub segment: String,
    pub total_urls: usize,
    pub valid_urls: usize,
    pub failed_urls: usize,
    pub redirect_urls: usize,
    pub errors: Vec<String>,
    pub url_results: Vec<UrlResult>,
    /// The sitemap itself could not be fetched or parsed
    #[serde(skip)]
    pub unreadable: bool,
}

impl SegmentResult {
    pub fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            ..Default::default()
        }
    }

    /// Add a checked URL to the tallies
    pub fn push(&mut self, result: UrlResult) {
        self.total_urls += 1;
        if result.is_valid {
            self.valid_urls += 1;
        } else {
            self.failed_urls += 1;
        }
        if !result.redirect_chain.is_empty() {
            self.redirect_urls += 1;
        }
        self.url_results.push(result);
    }

    pub fn failures(&self) -> impl Iterator<Item = &UrlResult> {
        self.url_results.iter().filter(|r| !r.is_valid)
    }

    /// `(url, warning)` for each warning on a valid URL
    pub fn warnings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.url_results
            .iter()
            .filter(|r| r.is_valid)
            .flat_map(|r| r.warnings.iter().map(move |w| (r.url.as_str(), w.as_str())))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HreflangCoverage {
    pub total_entries: usize,
    pub entries_with_alternates: usize,
    pub total_alternates: usize,
}

impl HreflangCoverage {
    pub fn percent(&self) -> f64 {
        if self.total_entries == 0 {
            0.0
        } else {
            self.entries_with_alternates as f64 * 100.0 / self.total_entries as f64
        }
    }
}

/// Full run report, serialized as the `--output` JSON file
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub base_url: String,
    pub timestamp: String,
    pub total_urls: usize,
    pub valid_urls: usize,
    pub failed_urls: usize,
    pub redirect_urls: usize,
    /// Seconds
    pub execution_time: f64,
    pub sitemap_results: Vec<SegmentResult>,
    pub hreflang_issues: Vec<String>,
    pub redirect_loops: Vec<String>,
    pub duplicate_urls: Vec<String>,
    pub entry_issues: Vec<String>,
    pub hreflang_coverage: HreflangCoverage,
}

impl ValidationReport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timestamp: chrono::Local::now().to_rfc3339(),
            total_urls: 0,
            valid_urls: 0,
            failed_urls: 0,
            redirect_urls: 0,
            execution_time: 0.0,
            sitemap_results: Vec::new(),
            hreflang_issues: Vec::new(),
            redirect_loops: Vec::new(),
            duplicate_urls: Vec::new(),
            entry_issues: Vec::new(),
            hreflang_coverage: HreflangCoverage::default(),
        }
    }

    pub fn add_segment(&mut self, segment: SegmentResult) {
        self.total_urls += segment.total_urls;
        self.valid_urls += segment.valid_urls;
        self.failed_urls += segment.failed_urls;
        self.redirect_urls += segment.redirect_urls;
        self.sitemap_results.push(segment);
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_urls == 0 {
            0.0
        } else {
            self.valid_urls as f64 * 100.0 / self.total_urls as f64
        }
    }

    pub fn unreadable_segments(&self) -> usize {
        self.sitemap_results.iter().filter(|s| s.unreadable).count()
    }

    /// No URL failed and every sitemap could be read
    pub fn passed(&self) -> bool {
        self.failed_urls == 0 && self.unreadable_segments() == 0
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?).map_err(|e| ToolError::FileError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        info!("Report saved to {}", path.display());
        Ok(())
    }
}
