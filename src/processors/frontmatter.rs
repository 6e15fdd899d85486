//! Article documents: YAML frontmatter plus MDX body

use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::OnceLock;

use crate::core::errors::{Result, ToolError};

/// Frontmatter key holding the locale -> slug cross references
pub const ALTERNATE_LOCALES: &str = "alternateLocales";

const DELIMITER: &str = "---";

/// Plain scalars a YAML 1.1 loader reads as booleans. Lowercase `true` and
/// `false` are left alone: serde_yaml already quotes them when they are strings.
const YAML11_BOOLS: &[&str] = &[
    "y", "Y", "yes", "Yes", "YES", "n", "N", "no", "No", "NO", "on", "On", "ON", "off", "Off",
    "OFF", "True", "TRUE", "False", "FALSE",
];

fn yaml11_timestamp() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\d{4}-\d{1,2}-\d{1,2}(?:(?:[Tt]|[ \t]+)\d{1,2}:\d{2}:\d{2}(?:\.\d*)?(?:[ \t]*(?:Z|[-+]\d{1,2}(?::\d{2})?))?)?$",
        )
        .expect("static regex")
    })
}

/// A parsed article file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleDocument {
    /// Frontmatter in file order
    pub frontmatter: Mapping,
    /// Body text without surrounding blank lines
    pub body: String,
}

impl ArticleDocument {
    /// Create a document from parts
    pub fn new(frontmatter: Mapping, body: impl Into<String>) -> Self {
        Self {
            frontmatter,
            body: body.into(),
        }
    }

    /// Split `text` into frontmatter and body.
    ///
    /// Text that does not open with a `---` line, or never closes the block,
    /// is all body.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut lines = text.split_inclusive('\n');

        let opening = match lines.next() {
            Some(line) if line.trim_end() == DELIMITER => line,
            _ => return Ok(Self::new(Mapping::new(), clean_body(text))),
        };

        let mut offset = opening.len();
        for line in lines {
            if line.trim_end() == DELIMITER {
                let yaml = &text[opening.len()..offset];
                let body = &text[offset + line.len()..];
                return Ok(Self::new(parse_mapping(yaml)?, clean_body(body)));
            }
            offset += line.len();
        }

        Ok(Self::new(Mapping::new(), clean_body(text)))
    }

    /// Serialize back to file text
    pub fn render(&self) -> Result<String> {
        if self.frontmatter.is_empty() {
            return Ok(format!("{}\n", self.body));
        }
        let yaml = quote_loader_ambiguous(&serde_yaml::to_string(&self.frontmatter)?);
        Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n\n{}\n", self.body))
    }

    /// String value of a frontmatter key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.frontmatter.get(key).and_then(Value::as_str)
    }

    /// Scalar frontmatter value rendered as text
    pub fn scalar_text(&self, key: &str) -> Option<String> {
        match self.frontmatter.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.get_str("title")
    }

    pub fn category(&self) -> Option<&str> {
        self.get_str("category")
    }

    pub fn published_at(&self) -> Option<String> {
        self.scalar_text("publishedAt")
    }

    /// Slug of this article in another locale
    pub fn alternate_locale(&self, locale: &str) -> Option<&str> {
        self.frontmatter
            .get(ALTERNATE_LOCALES)
            .and_then(Value::as_mapping)
            .and_then(|m| m.get(locale))
            .and_then(Value::as_str)
    }

    /// Point this article at its counterpart in `locale`
    pub fn set_alternate_locale(&mut self, locale: &str, slug: &str) {
        let key = Value::from(ALTERNATE_LOCALES);
        if !matches!(self.frontmatter.get(&key), Some(Value::Mapping(_))) {
            self.frontmatter.insert(key.clone(), Value::Mapping(Mapping::new()));
        }
        if let Some(Value::Mapping(locales)) = self.frontmatter.get_mut(&key) {
            locales.insert(Value::from(locale), Value::from(slug));
        }
    }
}

/// Set `alternateLocales.<locale>` in article text.
///
/// Only the affected line is added or replaced, so quoting, comments and key
/// order written by hand survive. Text the line edit cannot handle is parsed
/// and rendered instead.
pub fn with_alternate_locale(text: &str, locale: &str, slug: &str) -> Result<String> {
    let value = quote_loader_ambiguous(serde_yaml::to_string(slug)?.trim_end());
    let edited = insert_alternate_locale(text, locale, &value)
        .filter(|edited| {
            ArticleDocument::parse(edited)
                .is_ok_and(|doc| doc.alternate_locale(locale) == Some(slug))
        });

    match edited {
        Some(edited) => Ok(edited),
        None => {
            let mut document = ArticleDocument::parse(text)?;
            document.set_alternate_locale(locale, slug);
            document.render()
        }
    }
}

fn insert_alternate_locale(text: &str, locale: &str, value: &str) -> Option<String> {
    let (bom, text) = match text.strip_prefix('\u{feff}') {
        Some(rest) => ("\u{feff}", rest),
        None => ("", text),
    };
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let newline = match lines.first() {
        Some(line) if line.ends_with("\r\n") => "\r\n",
        _ => "\n",
    };

    let closing = match lines.first() {
        Some(line) if line.trim_end() == DELIMITER => lines
            .iter()
            .skip(1)
            .position(|line| line.trim_end() == DELIMITER)
            .map(|i| i + 1),
        _ => None,
    };
    let Some(closing) = closing else {
        return Some(format!(
            "{bom}{DELIMITER}{newline}{ALTERNATE_LOCALES}:{newline}  {locale}: {value}{newline}{DELIMITER}{newline}{newline}{text}"
        ));
    };

    let key = format!("{ALTERNATE_LOCALES}:");
    let header = (1..closing).find(|&i| lines[i].starts_with(&key));
    // inline flow mappings and comments are left to the full render
    if header.is_some_and(|i| lines[i].trim_end() != key) {
        return None;
    }

    let mut out: Vec<String> = lines.iter().map(|line| line.to_string()).collect();

    match header {
        Some(header) => {
            let mut indent: Option<&str> = None;
            for i in header + 1..closing {
                let line = lines[i];
                let trimmed = line.trim_start();
                if trimmed.trim().is_empty() {
                    continue;
                }
                let pad = &line[..line.len() - trimmed.len()];
                if pad.is_empty() {
                    break;
                }
                let indent = *indent.get_or_insert(pad);
                let is_locale = trimmed
                    .strip_prefix(locale)
                    .is_some_and(|rest| rest.starts_with(':'));
                if pad == indent && is_locale {
                    let ending = &line[line.trim_end_matches(['\r', '\n']).len()..];
                    out[i] = format!("{pad}{locale}: {value}{ending}");
                    return Some(format!("{bom}{}", out.concat()));
                }
            }
            let indent = indent.unwrap_or("  ");
            out.insert(header + 1, format!("{indent}{locale}: {value}{newline}"));
        }
        None => out.insert(
            closing,
            format!("{ALTERNATE_LOCALES}:{newline}  {locale}: {value}{newline}"),
        ),
    }

    Some(format!("{bom}{}", out.concat()))
}

/// Single-quote plain string scalars that a YAML 1.1 loader would turn into
/// a date or a boolean. Block scalar content is left as is.
fn quote_loader_ambiguous(yaml: &str) -> String {
    let mut out = String::with_capacity(yaml.len());
    let mut block_parent: Option<usize> = None;

    for line in yaml.split_inclusive('\n') {
        let content = line.trim_end_matches(['\r', '\n']);
        let indent = content.len() - content.trim_start().len();

        if let Some(parent) = block_parent {
            if content.trim().is_empty() || indent > parent {
                out.push_str(line);
                continue;
            }
            block_parent = None;
        }

        let (prefix, value) = split_scalar(content);
        if value.starts_with('|') || value.starts_with('>') {
            block_parent = Some(indent);
        }

        if YAML11_BOOLS.contains(&value) || yaml11_timestamp().is_match(value) {
            out.push_str(prefix);
            out.push('\'');
            out.push_str(&value.replace('\'', "''"));
            out.push('\'');
            out.push_str(&line[content.len()..]);
        } else {
            out.push_str(line);
        }
    }
    out
}

/// Split an emitted line into its key or sequence prefix and the scalar
fn split_scalar(line: &str) -> (&str, &str) {
    let mut start = line.len() - line.trim_start().len();
    while line[start..].starts_with("- ") {
        start += 2;
    }
    if let Some(pos) = line[start..].find(": ") {
        start += pos + 2;
    }
    line.split_at(start)
}

fn parse_mapping(yaml: &str) -> Result<Mapping> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let value: Value = serde_yaml::from_str(yaml).map_err(|e| ToolError::InvalidFormat {
        format: format!("invalid frontmatter YAML: {}", e),
    })?;
    match value {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        other => Err(ToolError::InvalidFormat {
            format: format!("frontmatter must be a mapping, found {:?}", other),
        }),
    }
}

fn clean_body(body: &str) -> String {
    body.trim_start_matches(['\n', '\r']).trim_end().to_string()
}
