//! Locale article directories on disk

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::errors::{Result, ToolError};
use crate::processors::frontmatter::{with_alternate_locale, ArticleDocument};

/// Locale articles are written in
pub const SOURCE_LOCALE: &str = "en";

/// Locale articles are translated into
pub const TARGET_LOCALE: &str = "es";

/// Extensions recognized as article files, preferred first
pub const ARTICLE_EXTENSIONS: &[&str] = &["mdx", "md"];

/// An article file loaded from a locale directory
#[derive(Debug, Clone)]
pub struct Article {
    pub slug: String,
    pub path: PathBuf,
    pub document: ArticleDocument,
}

impl Article {
    /// File extension, `mdx` when missing
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(ARTICLE_EXTENSIONS[0])
    }
}

/// A file that could not be loaded as an article
#[derive(Debug, Clone)]
pub struct InvalidArticle {
    pub path: PathBuf,
    pub message: String,
}

/// Result of scanning one locale directory
#[derive(Debug, Clone, Default)]
pub struct LocaleScan {
    /// Articles sorted by slug
    pub articles: Vec<Article>,
    pub invalid: Vec<InvalidArticle>,
}

impl LocaleScan {
    /// Slugs that appear more than once
    pub fn duplicate_slugs(&self) -> Vec<String> {
        let mut duplicates: Vec<String> = self
            .articles
            .windows(2)
            .filter(|pair| pair[0].slug == pair[1].slug)
            .map(|pair| pair[0].slug.clone())
            .collect();
        duplicates.dedup();
        duplicates
    }
}

/// Article files under `<root>/src/content/articles/<locale>/`
#[derive(Debug, Clone)]
pub struct ArticleStore {
    articles_dir: PathBuf,
}

impl ArticleStore {
    /// Store for a project root
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            articles_dir: root.as_ref().join("src").join("content").join("articles"),
        }
    }

    /// Directory holding one locale's articles
    pub fn locale_dir(&self, locale: &str) -> PathBuf {
        self.articles_dir.join(locale)
    }

    fn is_article_file(path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                ARTICLE_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }

    /// Load a single article file
    pub fn load(&self, path: &Path) -> Result<Article> {
        let slug = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| ToolError::FileError {
                path: path.display().to_string(),
                message: "No file name".to_string(),
            })?;

        let content = std::fs::read_to_string(path).map_err(|e| ToolError::FileError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let document = ArticleDocument::parse(&content).map_err(|e| ToolError::FileError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(Article {
            slug,
            path: path.to_path_buf(),
            document,
        })
    }

    /// All articles of a locale; a missing directory is empty
    pub fn scan(&self, locale: &str) -> Result<LocaleScan> {
        let dir = self.locale_dir(locale);
        let mut scan = LocaleScan::default();
        if !dir.is_dir() {
            debug!("No article directory at {}", dir.display());
            return Ok(scan);
        }

        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| ToolError::FileError {
                path: dir.display().to_string(),
                message: e.to_string(),
            })?;
            let path = entry.path();
            if path.is_file() && Self::is_article_file(path) {
                paths.push(path.to_path_buf());
            }
        }
        paths.sort();

        for path in paths {
            match self.load(&path) {
                Ok(article) => scan.articles.push(article),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    scan.invalid.push(InvalidArticle {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        scan.articles.sort_by(|a, b| a.slug.cmp(&b.slug).then(a.path.cmp(&b.path)));
        Ok(scan)
    }

    /// Path of an existing article file for `slug`
    pub fn find(&self, locale: &str, slug: &str) -> Option<PathBuf> {
        let dir = self.locale_dir(locale);
        ARTICLE_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", slug, ext)))
            .find(|path| path.is_file())
    }

    /// Translation slug of an English article when its file exists
    pub fn existing_translation(&self, article: &Article) -> Option<String> {
        let slug = article.document.alternate_locale(TARGET_LOCALE)?;
        self.find(TARGET_LOCALE, slug).map(|_| slug.to_string())
    }

    /// Write a translated article into the target locale directory
    pub fn save_translation(
        &self,
        slug: &str,
        extension: &str,
        document: &ArticleDocument,
        dry_run: bool,
    ) -> Result<PathBuf> {
        let dir = self.locale_dir(TARGET_LOCALE);
        let output = dir.join(format!("{}.{}", slug, extension));

        if dry_run {
            info!("[DRY RUN] Would save to: {}", output.display());
            return Ok(output);
        }

        std::fs::create_dir_all(&dir).map_err(|e| ToolError::FileError {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(&output, document.render()?).map_err(|e| ToolError::FileError {
            path: output.display().to_string(),
            message: e.to_string(),
        })?;

        info!("Saved {} article: {}", TARGET_LOCALE, output.display());
        Ok(output)
    }

    /// Record the translation slug in the English article's frontmatter
    pub fn link_translation(&self, article: &Article, target_slug: &str, dry_run: bool) -> Result<()> {
        if dry_run {
            info!(
                "[DRY RUN] Would update {} with {} slug: {}",
                article.path.display(),
                TARGET_LOCALE,
                target_slug
            );
            return Ok(());
        }

        // edit the current text so edits made since loading are kept
        let content = std::fs::read_to_string(&article.path).map_err(|e| ToolError::FileError {
            path: article.path.display().to_string(),
            message: e.to_string(),
        })?;
        let updated = with_alternate_locale(&content, TARGET_LOCALE, target_slug).map_err(|e| {
            ToolError::FileError {
                path: article.path.display().to_string(),
                message: e.to_string(),
            }
        })?;
        std::fs::write(&article.path, updated).map_err(|e| ToolError::FileError {
            path: article.path.display().to_string(),
            message: e.to_string(),
        })?;

        info!("Updated {} with reference to {}", article.slug, target_slug);
        Ok(())
    }
}
