//! Site i18n tools
//!
//! Translation status reports, DeepL article translation with protected
//! content, and concurrent sitemap validation for a bilingual en/es site.

#![forbid(unsafe_code)]

pub mod cli;
pub mod core;
pub mod processors;
pub mod sitemap;
pub mod utils;

// Re-export key types for convenience
pub use crate::core::{
    client::AsyncTranslator,
    config::{SitemapConfig, TranslationSettings, TranslatorConfig},
    errors::{Result, ToolError},
    models::{Formality, TranslationRequest, TranslationResult},
};

pub use crate::processors::{
    article::{ArticleTranslator, TranslationRun},
    status::{StatusAnalyzer, StatusReport},
};

pub use crate::sitemap::{SitemapValidator, ValidationReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
