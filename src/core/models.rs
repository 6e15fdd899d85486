//! Core data models for translation

use serde::{Deserialize, Serialize};
use std::fmt;

/// DeepL formality preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formality {
    /// Let the API decide
    #[default]
    Default,
    More,
    Less,
    PreferMore,
    PreferLess,
}

impl Formality {
    /// Value sent to the API, `None` for the API default
    pub fn as_api_value(&self) -> Option<&'static str> {
        match self {
            Formality::Default => None,
            Formality::More => Some("more"),
            Formality::Less => Some("less"),
            Formality::PreferMore => Some("prefer_more"),
            Formality::PreferLess => Some("prefer_less"),
        }
    }
}

impl fmt::Display for Formality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_api_value().unwrap_or("default"))
    }
}

/// Translation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: Option<String>,
    pub target_lang: String,
    pub formality: Formality,
    pub preserve_formatting: bool,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_lang: None,
            target_lang: target_lang.into(),
            formality: Formality::Default,
            preserve_formatting: true,
        }
    }

    pub fn with_source_lang(mut self, source_lang: impl Into<String>) -> Self {
        self.source_lang = Some(source_lang.into());
        self
    }

    pub fn with_formality(mut self, formality: Formality) -> Self {
        self.formality = formality;
        self
    }

    pub fn with_preserve_formatting(mut self, preserve: bool) -> Self {
        self.preserve_formatting = preserve;
        self
    }

    /// Characters billed for this request
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Translation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub translation: String,
    pub detected_source_lang: Option<String>,
    pub billed_characters: usize,
}

/// Character usage for the current run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterUsage {
    pub limit: Option<usize>,
    pub used: usize,
}

impl CharacterUsage {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            used: 0,
        }
    }

    pub fn remaining(&self) -> Option<usize> {
        self.limit.map(|limit| limit.saturating_sub(self.used))
    }

    pub fn can_use(&self, chars: usize) -> bool {
        self.remaining().map_or(true, |remaining| remaining >= chars)
    }

    pub fn record(&mut self, chars: usize) -> anyhow::Result<()> {
        if !self.can_use(chars) {
            return Err(anyhow::anyhow!("Character quota exceeded"));
        }
        self.used += chars;
        Ok(())
    }
}

/// Account usage as reported by `GET /v2/usage`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUsage {
    pub character_count: u64,
    pub character_limit: u64,
}

impl AccountUsage {
    pub fn remaining(&self) -> u64 {
        self.character_limit.saturating_sub(self.character_count)
    }
}
