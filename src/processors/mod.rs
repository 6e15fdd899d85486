//! Article processing: status reports and translation

pub mod article;
pub mod article_store;
pub mod frontmatter;
pub mod protect;
pub mod slug;
pub mod status;
