//! Article translation: frontmatter, body, slug and cross references

use serde_yaml::Value;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::core::client::AsyncTranslator;
use crate::core::config::TranslationSettings;
use crate::core::errors::{Result, ToolError};
use crate::core::models::TranslationRequest;
use crate::processors::article_store::{Article, ArticleStore, SOURCE_LOCALE, TARGET_LOCALE};
use crate::processors::frontmatter::ArticleDocument;
use crate::processors::protect::ContentProtector;
use crate::processors::slug::spanish_slug;

/// Frontmatter string fields sent for translation
const TRANSLATED_FIELDS: &[&str] = &["title", "description"];

/// Output of translating one article
#[derive(Debug, Clone)]
pub struct TranslatedArticle {
    pub slug: String,
    pub document: ArticleDocument,
}

/// Translates article text through the API, keeping protected content intact
#[derive(Debug, Clone)]
pub struct ArticleTranslator {
    translator: AsyncTranslator,
    settings: TranslationSettings,
    protector: ContentProtector,
}

impl ArticleTranslator {
    pub fn new(translator: AsyncTranslator, settings: TranslationSettings) -> Result<Self> {
        let protector = ContentProtector::new(&settings.non_translatable_terms)?;
        Ok(Self {
            translator,
            settings,
            protector,
        })
    }

    fn request(&self, text: impl Into<String>) -> TranslationRequest {
        TranslationRequest::new(text, self.settings.target_language.clone())
            .with_source_lang(SOURCE_LOCALE)
            .with_formality(self.settings.formality)
            .with_preserve_formatting(self.settings.preserve_formatting)
    }

    /// Translate text, leaving code, components, URLs and fixed terms untouched
    pub async fn translate_text(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let protected = self.protector.protect(text);
        let result = self.translator.translate(&self.request(protected.text.clone())).await?;
        protected.restore(&result.translation)
    }

    /// Translate `title`, `description` and `tags`; everything else is copied
    pub async fn translate_frontmatter(&self, document: &ArticleDocument) -> Result<ArticleDocument> {
        let mut translated = document.clone();

        for field in TRANSLATED_FIELDS {
            if let Some(text) = document.get_str(field) {
                let value = self.translate_text(text).await?;
                translated.frontmatter.insert(Value::from(*field), Value::from(value));
            }
        }

        if let Some(category) = document.category() {
            debug!("Category key preserved: {}", category);
        }

        if let Some(Value::Sequence(tags)) = document.frontmatter.get("tags") {
            let translated_tags = self.translate_tags(tags).await?;
            translated
                .frontmatter
                .insert(Value::from("tags"), Value::Sequence(translated_tags));
        }

        Ok(translated)
    }

    /// Translate string tags in one request; fixed terms and non-strings are kept
    async fn translate_tags(&self, tags: &[Value]) -> Result<Vec<Value>> {
        let mut translated_tags = tags.to_vec();
        let mut positions = Vec::new();
        let mut protected = Vec::new();
        for (i, tag) in tags.iter().enumerate() {
            match tag.as_str() {
                Some(text) if !text.trim().is_empty() && !self.settings.is_non_translatable(text) => {
                    positions.push(i);
                    protected.push(self.protector.protect(text));
                }
                _ => {}
            }
        }
        if protected.is_empty() {
            return Ok(translated_tags);
        }

        let texts: Vec<String> = protected.iter().map(|p| p.text.clone()).collect();
        let results = self.translator.translate_batch(&texts, &self.request("")).await?;
        for ((i, tag), result) in positions.into_iter().zip(&protected).zip(results) {
            translated_tags[i] = Value::from(tag.restore(&result.translation)?);
        }
        debug!("Translated {} tags", texts.len());
        Ok(translated_tags)
    }

    /// Translate a whole article; `target_slug` reuses an existing slug
    pub async fn translate_article(
        &self,
        article: &Article,
        target_slug: Option<&str>,
    ) -> Result<TranslatedArticle> {
        info!("Translating article: {}", article.slug);

        let mut document = self.translate_frontmatter(&article.document).await?;

        let slug = match target_slug {
            Some(slug) => slug.to_string(),
            None => spanish_slug(&article.slug, document.title().unwrap_or_default()),
        };

        document.set_alternate_locale(SOURCE_LOCALE, &article.slug);
        document.body = self.translate_text(&article.document.body).await?;

        info!("Translation complete: {} -> {}", article.slug, slug);
        Ok(TranslatedArticle { slug, document })
    }
}

/// Counters shown at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub translated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// What a run should translate
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub force: bool,
    pub article: Option<String>,
}

/// Outcome of choosing articles for a run
#[derive(Debug, Clone)]
pub enum Selection {
    /// Articles to translate
    Articles(Vec<Article>),
    /// Every English article already has a translation
    AllTranslated,
    /// The requested article is translated and `force` is off
    AlreadyTranslated(String),
}

/// Drives translation of a project's articles
#[derive(Debug, Clone)]
pub struct TranslationRun {
    store: ArticleStore,
    translator: ArticleTranslator,
    options: RunOptions,
}

impl TranslationRun {
    pub fn new(root: impl AsRef<Path>, translator: ArticleTranslator, options: RunOptions) -> Self {
        Self {
            store: ArticleStore::new(root),
            translator,
            options,
        }
    }

    /// Articles this run will translate
    pub fn select(&self) -> Result<Selection> {
        if let Some(slug) = &self.options.article {
            let path = self
                .store
                .find(SOURCE_LOCALE, slug)
                .ok_or_else(|| ToolError::ArticleNotFound {
                    locale: SOURCE_LOCALE.to_string(),
                    slug: slug.clone(),
                })?;
            let article = self.store.load(&path)?;
            if self.store.existing_translation(&article).is_some() && !self.options.force {
                return Ok(Selection::AlreadyTranslated(slug.clone()));
            }
            return Ok(Selection::Articles(vec![article]));
        }

        let scan = self.store.scan(SOURCE_LOCALE)?;
        for invalid in &scan.invalid {
            warn!("Cannot translate {}: {}", invalid.path.display(), invalid.message);
        }

        let articles: Vec<Article> = scan
            .articles
            .into_iter()
            .filter(|a| self.options.force || self.store.existing_translation(a).is_none())
            .collect();

        if articles.is_empty() {
            Ok(Selection::AllTranslated)
        } else {
            Ok(Selection::Articles(articles))
        }
    }

    /// Translate, save and link one article
    pub async fn translate_one(&self, article: &Article) -> Result<String> {
        let existing = self.store.existing_translation(article);
        let translated = self
            .translator
            .translate_article(article, existing.as_deref())
            .await?;

        if existing.is_none() {
            if let Some(path) = self.store.find(TARGET_LOCALE, &translated.slug) {
                return Err(ToolError::FileError {
                    path: path.display().to_string(),
                    message: format!(
                        "Slug '{}' is already used by another {} article",
                        translated.slug, TARGET_LOCALE
                    ),
                });
            }
        }

        self.store.save_translation(
            &translated.slug,
            article.extension(),
            &translated.document,
            self.options.dry_run,
        )?;
        self.store
            .link_translation(article, &translated.slug, self.options.dry_run)?;

        Ok(translated.slug)
    }

    /// Translate every article, calling `on_progress` after each one
    pub async fn run<F>(&self, articles: &[Article], mut on_progress: F) -> RunStats
    where
        F: FnMut(&Article, &Result<String>),
    {
        let mut stats = RunStats {
            total: articles.len(),
            ..Default::default()
        };

        for article in articles {
            let outcome = self.translate_one(article).await;
            match &outcome {
                Ok(_) => stats.translated += 1,
                Err(e) => {
                    error!("Failed to translate {}: {}", article.slug, e);
                    stats.failed += 1;
                }
            }
            on_progress(article, &outcome);
        }

        stats
    }

    /// English articles that already have a translation
    pub fn count_translated(&self) -> Result<usize> {
        let scan = self.store.scan(SOURCE_LOCALE)?;
        Ok(scan
            .articles
            .iter()
            .filter(|a| self.store.existing_translation(a).is_some())
            .count())
    }
}
