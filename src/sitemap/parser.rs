//! Sitemap and sitemap index parsing

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, ToolError};

/// `changefreq` values allowed by the sitemap protocol
pub const CHANGE_FREQUENCIES: &[&str] = &[
    "always", "hourly", "daily", "weekly", "monthly", "yearly", "never",
];

/// An `<xhtml:link rel="alternate">` of a sitemap entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternate {
    pub hreflang: String,
    pub href: String,
}

/// One `<url>` of a sitemap
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: Option<String>,
    pub priority: Option<f32>,
    pub alternates: Vec<Alternate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Loc,
    LastMod,
    ChangeFreq,
    Priority,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"loc" => Some(Field::Loc),
            b"lastmod" => Some(Field::LastMod),
            b"changefreq" => Some(Field::ChangeFreq),
            b"priority" => Some(Field::Priority),
            _ => None,
        }
    }
}

fn xml_error(e: impl std::fmt::Display) -> ToolError {
    ToolError::XmlError {
        message: e.to_string(),
    }
}

/// Read the `rel`, `hreflang` and `href` attributes of a `<link>`
fn parse_alternate(element: &BytesStart<'_>) -> Result<Option<Alternate>> {
    let mut rel = None;
    let mut hreflang = String::new();
    let mut href = String::new();

    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        let value = attr.unescape_value().map_err(xml_error)?.to_string();
        match attr.key.local_name().as_ref() {
            b"rel" => rel = Some(value),
            b"hreflang" => hreflang = value,
            b"href" => href = value,
            _ => {}
        }
    }

    if rel.as_deref() == Some("alternate") {
        Ok(Some(Alternate { hreflang, href }))
    } else {
        Ok(None)
    }
}

/// Parse a `<urlset>` document; `<url>`s without a `<loc>` are skipped
pub fn parse_sitemap(xml: &str) -> Result<Vec<SitemapEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<SitemapEntry> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name();
                if name.as_ref() == b"url" {
                    current = Some(SitemapEntry::default());
                } else if current.is_some() {
                    if let Some(f) = Field::from_local_name(name.as_ref()) {
                        field = Some(f);
                        text.clear();
                    } else if name.as_ref() == b"link" {
                        if let (Some(entry), Some(alt)) = (current.as_mut(), parse_alternate(&e)?) {
                            entry.alternates.push(alt);
                        }
                    }
                }
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"link" {
                    if let (Some(entry), Some(alt)) = (current.as_mut(), parse_alternate(&e)?) {
                        entry.alternates.push(alt);
                    }
                }
            }
            Event::Text(e) => {
                if field.is_some() {
                    text.push_str(&e.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(e) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(e) => {
                let name = e.local_name();
                if name.as_ref() == b"url" {
                    if let Some(entry) = current.take() {
                        if !entry.loc.is_empty() {
                            entries.push(entry);
                        }
                    }
                } else if let (Some(f), Some(entry)) = (field, current.as_mut()) {
                    if Field::from_local_name(name.as_ref()) == Some(f) {
                        assign_field(entry, f, text.trim())?;
                        field = None;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn assign_field(entry: &mut SitemapEntry, field: Field, value: &str) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    match field {
        Field::Loc => entry.loc = value.to_string(),
        Field::LastMod => entry.lastmod = Some(value.to_string()),
        Field::ChangeFreq => entry.changefreq = Some(value.to_string()),
        Field::Priority => {
            let priority = value.parse::<f32>().map_err(|_| ToolError::XmlError {
                message: format!("Invalid priority '{}' for {}", value, entry.loc),
            })?;
            entry.priority = Some(priority);
        }
    }
    Ok(())
}

/// Parse a `<sitemapindex>` document into the listed sitemap URLs
pub fn parse_sitemap_index(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut locations = Vec::new();
    let mut in_sitemap = false;
    let mut in_loc = false;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sitemap" => in_sitemap = true,
                b"loc" if in_sitemap => {
                    in_loc = true;
                    text.clear();
                }
                _ => {}
            },
            Event::Text(e) if in_loc => {
                text.push_str(&e.unescape().map_err(xml_error)?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"sitemap" => in_sitemap = false,
                b"loc" if in_loc => {
                    in_loc = false;
                    let loc = text.trim();
                    if !loc.is_empty() {
                        locations.push(loc.to_string());
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(locations)
}

/// Segment name of a sitemap URL, `https://x/sitemap-works.xml` -> `works`
pub fn segment_name(sitemap_url: &str) -> String {
    let file = sitemap_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(sitemap_url);
    let stem = file.strip_suffix(".xml").unwrap_or(file);
    stem.strip_prefix("sitemap-").unwrap_or(stem).to_string()
}

fn is_w3c_datetime(value: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(value).is_ok()
        || chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

impl SitemapEntry {
    /// Static problems with this entry
    pub fn lint(&self, base_url: &str) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.loc.starts_with(base_url) {
            issues.push(format!("{}: outside base URL {}", self.loc, base_url));
        }

        if let Some(priority) = self.priority {
            if !(0.0..=1.0).contains(&priority) {
                issues.push(format!("{}: priority {} outside 0.0-1.0", self.loc, priority));
            }
        }

        if let Some(freq) = &self.changefreq {
            if !CHANGE_FREQUENCIES.contains(&freq.as_str()) {
                issues.push(format!("{}: unknown changefreq '{}'", self.loc, freq));
            }
        }

        if let Some(lastmod) = &self.lastmod {
            if !is_w3c_datetime(lastmod) {
                issues.push(format!("{}: lastmod '{}' is not a W3C datetime", self.loc, lastmod));
            }
        }

        for alt in &self.alternates {
            if alt.href.is_empty() || alt.hreflang.is_empty() {
                issues.push(format!(
                    "{}: alternate link with empty hreflang or href",
                    self.loc
                ));
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:xhtml="http://www.w3.org/1999/xhtml">
  <url>
    <loc>https://example.com/articles/hola?a=1&amp;b=2</loc>
    <lastmod>2024-05-01T10:00:00+00:00</lastmod>
    <changefreq>weekly</changefreq>
    <priority>0.8</priority>
    <xhtml:link rel="alternate" hreflang="es" href="https://example.com/articles/hola"/>
    <xhtml:link rel="alternate" hreflang="en" href="https://example.com/en/articles/hello"/>
    <xhtml:link rel="alternate" hreflang="x-default" href="https://example.com/articles/hola"/>
    <xhtml:link rel="canonical" href="https://example.com/ignored"/>
  </url>
  <url>
    <loc><![CDATA[https://example.com/about]]></loc>
  </url>
  <url>
    <lastmod>2024-01-01</lastmod>
  </url>
</urlset>"#;

    #[test]
    fn test_parse_sitemap() {
        let entries = parse_sitemap(SITEMAP).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.loc, "https://example.com/articles/hola?a=1&b=2");
        assert_eq!(first.lastmod.as_deref(), Some("2024-05-01T10:00:00+00:00"));
        assert_eq!(first.changefreq.as_deref(), Some("weekly"));
        assert_eq!(first.priority, Some(0.8));
        assert_eq!(first.alternates.len(), 3);
        assert_eq!(first.alternates[1].hreflang, "en");

        assert_eq!(entries[1].loc, "https://example.com/about");
        assert!(entries[1].alternates.is_empty());
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(parse_sitemap("<urlset><url><loc>x</url></urlset>").is_err());
        assert!(parse_sitemap(
            "<urlset><url><loc>https://e.com</loc><priority>high</priority></url></urlset>"
        )
        .is_err());
    }

    #[test]
    fn test_parse_sitemap_index() {
        let xml = r#"<?xml version="1.0"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/sitemap-pages.xml</loc></sitemap>
  <sitemap><loc>https://example.com/sitemap-works.xml</loc><lastmod>2024-01-01</lastmod></sitemap>
</sitemapindex>"#;

        assert_eq!(
            parse_sitemap_index(xml).unwrap(),
            vec![
                "https://example.com/sitemap-pages.xml",
                "https://example.com/sitemap-works.xml"
            ]
        );
    }

    #[test]
    fn test_segment_name() {
        assert_eq!(segment_name("https://e.com/sitemap-works.xml"), "works");
        assert_eq!(segment_name("https://e.com/feeds/main.xml"), "main");
    }

    #[test]
    fn test_lint() {
        let entry = SitemapEntry {
            loc: "https://other.com/page".to_string(),
            lastmod: Some("yesterday".to_string()),
            changefreq: Some("sometimes".to_string()),
            priority: Some(1.5),
            alternates: vec![Alternate {
                hreflang: String::new(),
                href: "https://other.com/en/page".to_string(),
            }],
        };
        assert_eq!(entry.lint("https://example.com").len(), 5);

        let clean = SitemapEntry {
            loc: "https://example.com/page".to_string(),
            lastmod: Some("2024-01-01".to_string()),
            changefreq: Some("monthly".to_string()),
            priority: Some(0.5),
            alternates: Vec::new(),
        };
        assert!(clean.lint("https://example.com").is_empty());
    }
}
