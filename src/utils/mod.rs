//! Console helpers shared by the command handlers

use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// Progress bar in the house style, drawn on stderr
pub fn progress_bar(len: u64) -> ProgressBar {
    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    let bar = ProgressBar::new(len);
    bar.set_style(style);
    bar
}

/// First `limit` items plus the number left out
pub fn head<T>(items: &[T], limit: usize) -> (&[T], usize) {
    let shown = items.len().min(limit);
    (&items[..shown], items.len() - shown)
}

/// `... and N more` line, empty when nothing was left out
pub fn more_line(hidden: usize, indent: &str) -> Option<String> {
    (hidden > 0).then(|| format!("{}... and {} more", indent, hidden))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head() {
        let items = [1, 2, 3, 4, 5];
        assert_eq!(head(&items, 3), (&items[..3], 2));
        assert_eq!(head(&items, 10), (&items[..], 0));
    }

    #[test]
    fn test_more_line() {
        assert_eq!(more_line(0, "  "), None);
        assert_eq!(more_line(4, "  ").as_deref(), Some("  ... and 4 more"));
    }
}
