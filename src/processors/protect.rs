//! Placeholder substitution for content the translation API must not touch

use regex::Regex;

use crate::core::errors::{Result, ToolError};

/// Compiled patterns for code, MDX components, URLs and fixed terms
#[derive(Debug, Clone)]
pub struct ContentProtector {
    patterns: Vec<Regex>,
}

/// Text with protected spans swapped for placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedText {
    pub text: String,
    /// `(placeholder, original)` in creation order
    pub placeholders: Vec<(String, String)>,
}

impl ContentProtector {
    /// Compile patterns; terms match case-insensitively on word boundaries
    pub fn new(non_translatable_terms: &[String]) -> Result<Self> {
        let mut sources = vec![
            // fenced code first so inline code inside it is left alone
            r"```[\s\S]*?```".to_string(),
            r"`[^`]+`".to_string(),
            r"(?s)<[A-Z][^>]*>.*?</[A-Z][^>]*>".to_string(),
            r"https?://[^\s\)]+".to_string(),
        ];

        let terms: Vec<String> = non_translatable_terms
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| regex::escape(t))
            .collect();
        if !terms.is_empty() {
            sources.push(format!(r"(?i)\b({})\b", terms.join("|")));
        }

        let patterns = sources
            .iter()
            .map(|s| Regex::new(s))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ToolError::ConfigError {
                message: format!("invalid protection pattern: {}", e),
            })?;

        Ok(Self { patterns })
    }

    /// Replace protected spans with `__PROTECTED_<n>__`
    pub fn protect(&self, text: &str) -> ProtectedText {
        let mut placeholders: Vec<(String, String)> = Vec::new();
        let mut current = text.to_string();

        for pattern in &self.patterns {
            current = pattern
                .replace_all(&current, |caps: &regex::Captures| {
                    let placeholder = format!("__PROTECTED_{}__", placeholders.len());
                    placeholders.push((placeholder.clone(), caps[0].to_string()));
                    placeholder
                })
                .into_owned();
        }

        ProtectedText {
            text: current,
            placeholders,
        }
    }
}

impl ProtectedText {
    /// Put the original spans back into `translated`.
    ///
    /// Later placeholders may wrap earlier ones, so they are restored first.
    pub fn restore(&self, translated: &str) -> Result<String> {
        let mut restored = translated.to_string();
        for (placeholder, original) in self.placeholders.iter().rev() {
            if !restored.contains(placeholder.as_str()) {
                return Err(ToolError::PlaceholderLost {
                    placeholder: placeholder.clone(),
                });
            }
            restored = restored.replace(placeholder.as_str(), original);
        }
        Ok(restored)
    }

    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }
}
