//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::errors::{Result, ToolError};
use crate::core::models::Formality;

/// Paid DeepL API host
pub const DEEPL_PRO_ENDPOINT: &str = "https://api.deepl.com";

/// Free DeepL API host, used for keys ending in `:fx`
pub const DEEPL_FREE_ENDPOINT: &str = "https://api-free.deepl.com";

/// Name of the per-project translation settings file
pub const SETTINGS_FILE: &str = "translation-config.json";

/// Configuration for the translation API client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    pub api_key: String,
    pub api_endpoint: String,
    pub max_concurrent: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_ms: u64,
    pub char_limit: Option<usize>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        let api_key = std::env::var("DEEPL_API_KEY").unwrap_or_default();
        let api_endpoint = std::env::var("DEEPL_API_ENDPOINT")
            .unwrap_or_else(|_| default_endpoint(&api_key).to_string());
        Self {
            api_key,
            api_endpoint,
            max_concurrent: 5,
            max_retries: 3,
            retry_delay_ms: 1000,
            timeout_ms: 30000,
            char_limit: None,
        }
    }
}

/// Pick the API host matching the key's plan
pub fn default_endpoint(api_key: &str) -> &'static str {
    if api_key.ends_with(":fx") {
        DEEPL_FREE_ENDPOINT
    } else {
        DEEPL_PRO_ENDPOINT
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ToolError::ConfigError {
            message: format!("{} has an invalid value: {}", name, raw),
        }),
        Err(_) => Ok(default),
    }
}

impl TranslatorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("DEEPL_API_KEY").map_err(|_| ToolError::ConfigError {
            message: "DEEPL_API_KEY environment variable is required".to_string(),
        })?;

        let api_endpoint = std::env::var("DEEPL_API_ENDPOINT")
            .unwrap_or_else(|_| default_endpoint(&api_key).to_string());

        let char_limit = match std::env::var("DEEPL_CHAR_LIMIT") {
            Ok(_) => Some(env_or("DEEPL_CHAR_LIMIT", 0usize)?),
            Err(_) => None,
        };

        Ok(Self {
            api_key,
            api_endpoint,
            max_concurrent: env_or("MAX_CONCURRENT", 5)?,
            max_retries: env_or("MAX_RETRIES", 3)?,
            retry_delay_ms: env_or("RETRY_DELAY_MS", 1000)?,
            timeout_ms: env_or("REQUEST_TIMEOUT_MS", 30000)?,
            char_limit,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ToolError::ConfigError {
                message: "API key is required".to_string(),
            });
        }

        if self.api_endpoint.trim().is_empty() {
            return Err(ToolError::ConfigError {
                message: "API endpoint is required".to_string(),
            });
        }

        if self.max_concurrent == 0 {
            return Err(ToolError::ConfigError {
                message: "max_concurrent must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Full URL of an API path such as `/v2/translate`
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.api_endpoint.trim_end_matches('/'), path)
    }
}

/// Raw `translationSettings` block of the settings file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTranslationOptions {
    formality: Option<Formality>,
    preserve_formatting: Option<bool>,
    target_language: Option<String>,
}

/// Raw settings file layout
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettingsFile {
    #[serde(default)]
    non_translatable_terms: Vec<String>,
    #[serde(default)]
    translation_settings: RawTranslationOptions,
}

/// Per-project translation settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationSettings {
    pub non_translatable_terms: Vec<String>,
    pub formality: Formality,
    pub preserve_formatting: bool,
    pub target_language: String,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            non_translatable_terms: Vec::new(),
            formality: Formality::Default,
            preserve_formatting: true,
            target_language: "es".to_string(),
        }
    }
}

impl TranslationSettings {
    /// Load `translation-config.json` from the project root, defaults when absent
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(SETTINGS_FILE);
        if !path.exists() {
            warn!("{} not found, using defaults", SETTINGS_FILE);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ToolError::FileError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let settings = Self::from_json(&content)?;
        info!(
            "Loaded {} non-translatable terms from {}",
            settings.non_translatable_terms.len(),
            path.display()
        );
        Ok(settings)
    }

    /// Parse settings from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawSettingsFile = serde_json::from_str(content)?;
        let defaults = Self::default();
        Ok(Self {
            non_translatable_terms: raw.non_translatable_terms,
            formality: raw.translation_settings.formality.unwrap_or(defaults.formality),
            preserve_formatting: raw
                .translation_settings
                .preserve_formatting
                .unwrap_or(defaults.preserve_formatting),
            target_language: raw
                .translation_settings
                .target_language
                .unwrap_or(defaults.target_language),
        })
    }

    /// Whether a term is exempt from translation
    pub fn is_non_translatable(&self, term: &str) -> bool {
        self.non_translatable_terms.iter().any(|t| t == term)
    }
}

/// Sitemap segments checked when none are given
pub const DEFAULT_SEGMENTS: &[&str] = &["pages", "articles", "works", "legal"];

/// Site locales
pub const LOCALES: &[&str] = &["en", "es"];

/// Locale served without a path prefix
pub const DEFAULT_LOCALE: &str = "es";

/// Configuration for the sitemap validator
#[derive(Debug, Clone)]
pub struct SitemapConfig {
    pub base_url: String,
    pub concurrency: usize,
    pub segments: Vec<String>,
    pub from_index: bool,
    pub check_alternates: bool,
    pub locales: Vec<String>,
    pub default_locale: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl SitemapConfig {
    /// Default number of in-flight requests
    pub const DEFAULT_CONCURRENCY: usize = 20;

    /// Create a config for a site, stripping any trailing slash
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            concurrency: Self::DEFAULT_CONCURRENCY,
            segments: DEFAULT_SEGMENTS.iter().map(|s| s.to_string()).collect(),
            from_index: false,
            check_alternates: true,
            locales: LOCALES.iter().map(|s| s.to_string()).collect(),
            default_locale: DEFAULT_LOCALE.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_redirects: 10,
            user_agent: "Mozilla/5.0 (compatible; SitemapValidator/1.0)".to_string(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ToolError::ConfigError {
                message: "Base URL is required".to_string(),
            });
        }
        if reqwest::Url::parse(&self.base_url).is_err() {
            return Err(ToolError::ConfigError {
                message: format!("Invalid base URL: {}", self.base_url),
            });
        }
        if self.concurrency == 0 {
            return Err(ToolError::ConfigError {
                message: "concurrency must be greater than 0".to_string(),
            });
        }
        if !self.from_index && self.segments.is_empty() {
            return Err(ToolError::ConfigError {
                message: "At least one sitemap segment is required".to_string(),
            });
        }
        Ok(())
    }

    /// URL of a named sitemap segment
    pub fn segment_url(&self, segment: &str) -> String {
        format!("{}/sitemap-{}.xml", self.base_url, segment)
    }

    /// URL of the sitemap index
    pub fn index_url(&self) -> String {
        format!("{}/sitemap.xml", self.base_url)
    }

    /// hreflang values every alternate set should contain
    pub fn expected_hreflangs(&self) -> Vec<String> {
        let mut expected = self.locales.clone();
        expected.push("x-default".to_string());
        expected
    }
}
