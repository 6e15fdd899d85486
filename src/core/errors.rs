//! Custom error types for translation and validation operations

use thiserror::Error;

/// Errors raised by the article and sitemap tooling
#[derive(Error, Debug)]
pub enum ToolError {
    /// API request failed
    #[error("API error: {status} - {message}")]
    ApiError {
        status: u16,
        message: String,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Retry after {retry_after:?} seconds")]
    RateLimitError {
        retry_after: Option<u64>,
    },

    /// Character quota exceeded
    #[error("Translation character quota exceeded")]
    QuotaExceededError,

    /// Network error
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
    },

    /// Invalid response from API
    #[error("Invalid response: {message}")]
    InvalidResponseError {
        message: String,
    },

    /// Request timeout
    #[error("Request timeout")]
    TimeoutError,

    /// File operation error
    #[error("File error: {path} - {message}")]
    FileError {
        path: String,
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    /// Invalid file format
    #[error("Invalid file format: {format}")]
    InvalidFormat {
        format: String,
    },

    /// Article slug not present in the locale directory
    #[error("Article not found: {locale}/{slug}")]
    ArticleNotFound {
        locale: String,
        slug: String,
    },

    /// The translation API dropped a protected-content placeholder
    #[error("Placeholder {placeholder} missing from translated text")]
    PlaceholderLost {
        placeholder: String,
    },

    /// Malformed sitemap document
    #[error("Sitemap XML error: {message}")]
    XmlError {
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl ToolError {
    /// Whether a failed API call is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            ToolError::NetworkError { .. }
            | ToolError::TimeoutError
            | ToolError::RateLimitError { .. } => true,
            ToolError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<quick_xml::Error> for ToolError {
    fn from(err: quick_xml::Error) -> Self {
        ToolError::XmlError {
            message: err.to_string(),
        }
    }
}

/// Result type for tool operations
pub type Result<T> = std::result::Result<T, ToolError>;
