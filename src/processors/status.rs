//! Translation status of English articles

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::core::errors::Result;
use crate::processors::article_store::{
    Article, ArticleStore, LocaleScan, SOURCE_LOCALE, TARGET_LOCALE,
};

/// Kind of problem found while comparing locales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// English article points at a Spanish slug with no file
    MissingFile,
    /// Spanish article nobody links to
    OrphanedTranslation,
    /// Spanish article links back to a different English slug
    BrokenCrossReference,
    /// `publishedAt` differs between the pair
    DateMismatch,
    /// Slug present more than once in one locale directory
    DuplicateSlug,
    /// File could not be parsed
    InvalidFile,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::MissingFile => "missing_file",
            IssueKind::OrphanedTranslation => "orphaned_translation",
            IssueKind::BrokenCrossReference => "broken_cross_reference",
            IssueKind::DateMismatch => "date_mismatch",
            IssueKind::DuplicateSlug => "duplicate_slug",
            IssueKind::InvalidFile => "invalid_file",
        }
    }
}

/// One itemized problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es_slug: Option<String>,
    pub message: String,
}

/// An English article with an existing Spanish counterpart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslatedPair {
    pub en_slug: String,
    pub es_slug: String,
    pub en_title: String,
    pub es_title: String,
    pub category_en: String,
    pub category_es: String,
}

/// Report printed by `status`
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    pub total_en: usize,
    pub total_es: usize,
    pub translated_count: usize,
    pub missing_count: usize,
    pub missing_slugs: Vec<String>,
    pub translated: Vec<TranslatedPair>,
    pub issues: Vec<StatusIssue>,
}

impl StatusReport {
    /// Nothing missing and nothing wrong
    pub fn is_complete(&self) -> bool {
        self.missing_count == 0 && self.issues.is_empty()
    }
}

/// Compares the English and Spanish article directories
#[derive(Debug, Clone)]
pub struct StatusAnalyzer {
    store: ArticleStore,
}

fn by_slug(scan: &LocaleScan) -> BTreeMap<&str, &Article> {
    let mut map = BTreeMap::new();
    for article in &scan.articles {
        map.entry(article.slug.as_str()).or_insert(article);
    }
    map
}

fn invalid_and_duplicate_issues(locale: &str, scan: &LocaleScan) -> Vec<StatusIssue> {
    let slug_fields = |slug: String| {
        if locale == SOURCE_LOCALE {
            (Some(slug), None)
        } else {
            (None, Some(slug))
        }
    };

    let mut issues = Vec::new();
    for slug in scan.duplicate_slugs() {
        let message = format!("Slug '{}' appears more than once in {}/", slug, locale);
        let (en_slug, es_slug) = slug_fields(slug);
        issues.push(StatusIssue {
            kind: IssueKind::DuplicateSlug,
            en_slug,
            es_slug,
            message,
        });
    }
    for invalid in &scan.invalid {
        issues.push(StatusIssue {
            kind: IssueKind::InvalidFile,
            en_slug: None,
            es_slug: None,
            message: invalid.message.clone(),
        });
    }
    issues
}

impl StatusAnalyzer {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            store: ArticleStore::new(root),
        }
    }

    /// Build the status report; `validate` also checks translated pairs
    pub fn analyze(&self, validate: bool) -> Result<StatusReport> {
        let en_scan = self.store.scan(SOURCE_LOCALE)?;
        let es_scan = self.store.scan(TARGET_LOCALE)?;
        let en_articles = by_slug(&en_scan);
        let es_articles = by_slug(&es_scan);

        let mut report = StatusReport {
            total_en: en_articles.len(),
            total_es: es_articles.len(),
            ..Default::default()
        };
        report
            .issues
            .extend(invalid_and_duplicate_issues(SOURCE_LOCALE, &en_scan));
        report
            .issues
            .extend(invalid_and_duplicate_issues(TARGET_LOCALE, &es_scan));

        let mut missing = Vec::new();
        for (en_slug, en) in &en_articles {
            let Some(es_slug) = en.document.alternate_locale(TARGET_LOCALE) else {
                missing.push(en_slug.to_string());
                continue;
            };

            match es_articles.get(es_slug) {
                Some(es) => {
                    report.translated.push(TranslatedPair {
                        en_slug: en_slug.to_string(),
                        es_slug: es_slug.to_string(),
                        en_title: en.document.title().unwrap_or_default().to_string(),
                        es_title: es.document.title().unwrap_or_default().to_string(),
                        category_en: en.document.category().unwrap_or_default().to_string(),
                        category_es: es.document.category().unwrap_or_default().to_string(),
                    });
                    if validate {
                        report.issues.extend(validate_pair(en, es));
                    }
                }
                None => {
                    report.issues.push(StatusIssue {
                        kind: IssueKind::MissingFile,
                        en_slug: Some(en_slug.to_string()),
                        es_slug: Some(es_slug.to_string()),
                        message: format!(
                            "English article references '{}' but Spanish file doesn't exist",
                            es_slug
                        ),
                    });
                    missing.push(en_slug.to_string());
                }
            }
        }

        let referenced: HashSet<&str> = report.translated.iter().map(|t| t.es_slug.as_str()).collect();
        for es_slug in es_articles.keys() {
            if !referenced.contains(es_slug) {
                report.issues.push(StatusIssue {
                    kind: IssueKind::OrphanedTranslation,
                    en_slug: None,
                    es_slug: Some(es_slug.to_string()),
                    message: format!("Spanish article '{}' has no English reference", es_slug),
                });
            }
        }

        missing.sort();
        report.translated_count = report.translated.len();
        report.missing_count = missing.len();
        report.missing_slugs = missing;

        debug!(
            "Status: {} en, {} es, {} missing, {} issues",
            report.total_en,
            report.total_es,
            report.missing_count,
            report.issues.len()
        );
        Ok(report)
    }
}

/// Cross-reference and date checks for a translated pair
fn validate_pair(en: &Article, es: &Article) -> Vec<StatusIssue> {
    let mut issues = Vec::new();

    let back_reference = es.document.alternate_locale(SOURCE_LOCALE);
    if back_reference != Some(en.slug.as_str()) {
        issues.push(StatusIssue {
            kind: IssueKind::BrokenCrossReference,
            en_slug: Some(en.slug.clone()),
            es_slug: Some(es.slug.clone()),
            message: format!(
                "Spanish article doesn't reference '{}' (references '{}')",
                en.slug,
                back_reference.unwrap_or("None")
            ),
        });
    }

    if en.document.published_at() != es.document.published_at() {
        issues.push(StatusIssue {
            kind: IssueKind::DateMismatch,
            en_slug: Some(en.slug.clone()),
            es_slug: Some(es.slug.clone()),
            message: "publishedAt dates don't match".to_string(),
        });
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::article_store::tests::write_article;
    use assert_json_diff::assert_json_eq;

    fn fixture() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let r = root.path();
        write_article(
            r,
            "en",
            "hello-world.mdx",
            "---\ntitle: Hello World\ncategory: craft\npublishedAt: '2024-01-01'\nalternateLocales:\n  es: hola-mundo\n---\nHi",
        );
        write_article(
            r,
            "es",
            "hola-mundo.mdx",
            "---\ntitle: Hola Mundo\ncategory: craft\npublishedAt: '2024-01-02'\nalternateLocales:\n  en: hello\n---\nHola",
        );
        write_article(r, "en", "untranslated.mdx", "---\ntitle: Nope\n---\nx");
        write_article(
            r,
            "en",
            "dangling.mdx",
            "---\ntitle: Dangling\nalternateLocales:\n  es: gone\n---\nx",
        );
        write_article(r, "es", "huerfano.mdx", "---\ntitle: Solo\n---\nx");
        root
    }

    #[test]
    fn test_analyze_without_validation() {
        let root = fixture();
        let report = StatusAnalyzer::new(root.path()).analyze(false).unwrap();

        let expected = serde_json::json!({
            "total_en": 3,
            "total_es": 2,
            "translated_count": 1,
            "missing_count": 2,
            "missing_slugs": ["dangling", "untranslated"],
            "translated": [{
                "en_slug": "hello-world",
                "es_slug": "hola-mundo",
                "en_title": "Hello World",
                "es_title": "Hola Mundo",
                "category_en": "craft",
                "category_es": "craft"
            }],
            "issues": [
                {
                    "type": "missing_file",
                    "en_slug": "dangling",
                    "es_slug": "gone",
                    "message": "English article references 'gone' but Spanish file doesn't exist"
                },
                {
                    "type": "orphaned_translation",
                    "es_slug": "huerfano",
                    "message": "Spanish article 'huerfano' has no English reference"
                }
            ]
        });
        assert_json_eq!(serde_json::to_value(&report).unwrap(), expected);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_validate_flags_pair_problems() {
        let root = fixture();
        let report = StatusAnalyzer::new(root.path()).analyze(true).unwrap();

        let kinds: Vec<IssueKind> = report.issues.iter().map(|i| i.kind).collect();
        assert!(kinds.contains(&IssueKind::BrokenCrossReference));
        assert!(kinds.contains(&IssueKind::DateMismatch));

        let broken = report
            .issues
            .iter()
            .find(|i| i.kind == IssueKind::BrokenCrossReference)
            .unwrap();
        assert_eq!(
            broken.message,
            "Spanish article doesn't reference 'hello-world' (references 'hello')"
        );
    }

    #[test]
    fn test_complete_project() {
        let root = tempfile::tempdir().unwrap();
        write_article(
            root.path(),
            "en",
            "a.mdx",
            "---\npublishedAt: 2024-05-05\nalternateLocales:\n  es: a-es\n---\n",
        );
        write_article(
            root.path(),
            "es",
            "a-es.mdx",
            "---\npublishedAt: 2024-05-05\nalternateLocales:\n  en: a\n---\n",
        );

        let report = StatusAnalyzer::new(root.path()).analyze(true).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.translated[0].en_title, "");
    }

    #[test]
    fn test_empty_project() {
        let root = tempfile::tempdir().unwrap();
        let report = StatusAnalyzer::new(root.path()).analyze(true).unwrap();
        assert_eq!(report.total_en, 0);
        assert!(report.is_complete());
    }
}
