//! Spanish slug generation

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

/// Common English slug words and their Spanish counterparts
const COMMON_TRANSLATIONS: &[(&str, &str)] = &[
    ("and", "y"),
    ("or", "o"),
    ("the", "el"),
    ("to", "a"),
    ("from", "de"),
    ("in", "en"),
    ("on", "en"),
    ("at", "en"),
    ("for", "para"),
    ("with", "con"),
    ("as", "como"),
    ("by", "por"),
    ("when", "cuando"),
    ("what", "que"),
    ("how", "como"),
    ("why", "por-que"),
    ("building", "construyendo"),
    ("creating", "creando"),
    ("learning", "aprendiendo"),
    ("teaching", "ensenando"),
    ("exploring", "explorando"),
    ("understanding", "entendiendo"),
    ("thinking", "pensamiento"),
    ("working", "trabajando"),
    ("creative", "creativo"),
    ("technology", "tecnologia"),
    ("community", "comunidad"),
    ("systems", "sistemas"),
    ("tools", "herramientas"),
    ("practices", "practicas"),
    ("principles", "principios"),
    ("frameworks", "marcos"),
    ("career", "carrera"),
    ("work", "trabajo"),
    ("philosophy", "filosofia"),
    ("data", "datos"),
    ("failure", "fracaso"),
    ("stage", "escenario"),
    ("screen", "pantalla"),
    ("real-time", "tiempo-real"),
];

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s_]+").expect("static regex"))
}

fn disallowed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9-]").expect("static regex"))
}

fn repeated_hyphens() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-+").expect("static regex"))
}

/// Lowercase, unaccented, hyphen-separated `[a-z0-9-]` form of `text`
pub fn normalize_slug(text: &str) -> String {
    // NFKD splits base letters from their marks, then anything non-ASCII is dropped
    let folded: String = text.to_lowercase().nfkd().filter(char::is_ascii).collect();
    let hyphenated = separators().replace_all(&folded, "-");
    let cleaned = disallowed().replace_all(&hyphenated, "");
    let collapsed = repeated_hyphens().replace_all(&cleaned, "-");
    collapsed.trim_matches('-').to_string()
}

/// Word-by-word dictionary translation of an English slug
pub fn slug_from_english(english_slug: &str) -> String {
    english_slug
        .split('-')
        .map(|part| {
            COMMON_TRANSLATIONS
                .iter()
                .find(|(en, _)| *en == part)
                .map(|(_, es)| *es)
                .unwrap_or(part)
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Pick the slug for a translated article.
///
/// The title-derived slug wins unless it is much shorter than the
/// dictionary translation of the English slug.
pub fn spanish_slug(english_slug: &str, spanish_title: &str) -> String {
    let from_english = slug_from_english(english_slug);
    let from_title = normalize_slug(spanish_title);

    if !from_title.is_empty() && from_title.len() as f64 > from_english.len() as f64 * 0.8 {
        from_title
    } else {
        from_english
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_slug() {
        assert_eq!(normalize_slug("¿Por qué Diseñar?"), "por-que-disenar");
        assert_eq!(normalize_slug("  Hello__World  "), "hello-world");
        assert_eq!(normalize_slug("A -- B"), "a-b");
        assert_eq!(normalize_slug("Árbol & Raíz: 2024"), "arbol-raiz-2024");
        assert_eq!(normalize_slug("---"), "");
    }

    #[test]
    fn test_normalize_slug_decomposes_compatibility_forms() {
        assert_eq!(normalize_slug("1ª edición"), "1a-edicion");
        assert_eq!(normalize_slug("Łódź and Škoda"), "odz-and-skoda");
        assert_eq!(normalize_slug("ﬁnal Ŝtep"), "final-step");
    }

    #[test]
    fn test_slug_from_english() {
        assert_eq!(
            slug_from_english("building-creative-tools"),
            "construyendo-creativo-herramientas"
        );
        assert_eq!(slug_from_english("thinking-about-data"), "pensamiento-about-datos");
        assert_eq!(slug_from_english("why-it-works"), "por-que-it-works");
    }

    #[test]
    fn test_spanish_slug_prefers_descriptive_title() {
        assert_eq!(
            spanish_slug("hello-world", "Hola mundo, una introducción"),
            "hola-mundo-una-introduccion"
        );
    }

    #[test]
    fn test_spanish_slug_falls_back_to_dictionary() {
        assert_eq!(
            spanish_slug("building-creative-tools", "Herramientas"),
            "construyendo-creativo-herramientas"
        );
        assert_eq!(spanish_slug("data", "¿?"), "datos");
    }
}
