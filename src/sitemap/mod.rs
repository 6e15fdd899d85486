//! Sitemap parsing, URL checking and validation reports

pub mod checker;
pub mod parser;
pub mod report;
pub mod validator;

pub use checker::{UrlChecker, UrlResult};
pub use report::{SegmentResult, ValidationReport};
pub use validator::{SitemapValidator, ValidationObserver};
