//! Console rendering of reports

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use std::fmt::Write;

use crate::processors::article::RunStats;
use crate::processors::status::StatusReport;
use crate::sitemap::report::ValidationReport;
use crate::utils::{head, more_line};

const MISSING_SHOWN: usize = 10;
const ISSUES_SHOWN: usize = 5;
const SITEMAP_ITEMS_SHOWN: usize = 10;

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn count_cell(count: usize, bad: bool) -> Cell {
    let cell = Cell::new(count);
    match (count, bad) {
        (0, _) => cell,
        (_, true) => cell.fg(Color::Red),
        (_, false) => cell.fg(Color::Green),
    }
}

/// Human readable status report
pub fn status(report: &StatusReport) -> String {
    let mut summary = table(&["Metric", "Count"]);
    summary.add_row(vec![Cell::new("English articles"), Cell::new(report.total_en)]);
    summary.add_row(vec![Cell::new("Spanish articles"), Cell::new(report.total_es)]);
    summary.add_row(vec![
        Cell::new("Translated"),
        count_cell(report.translated_count, false),
    ]);
    summary.add_row(vec![Cell::new("Missing"), count_cell(report.missing_count, true)]);
    summary.add_row(vec![Cell::new("Issues"), count_cell(report.issues.len(), true)]);

    let mut out = format!("Translation status\n{}\n", summary);

    if report.is_complete() {
        out.push_str("\n✅ All articles have Spanish translations!\n");
    }
    if !report.missing_slugs.is_empty() {
        out.push_str("\nMissing translations:\n");
        let (shown, hidden) = head(&report.missing_slugs, MISSING_SHOWN);
        for slug in shown {
            let _ = writeln!(out, "  - {}", slug);
        }
        if let Some(line) = more_line(hidden, "  ") {
            let _ = writeln!(out, "{}", line);
        }
    }

    if !report.issues.is_empty() {
        out.push_str("\nIssues:\n");
        let (shown, hidden) = head(&report.issues, ISSUES_SHOWN);
        for issue in shown {
            let _ = writeln!(out, "  [{}] {}", issue.kind.as_str(), issue.message);
        }
        if let Some(line) = more_line(hidden, "  ") {
            let _ = writeln!(out, "{}", line);
        }
    }

    out
}

/// Outcome of one article in a translation run
#[derive(Debug, Clone)]
pub struct ArticleOutcome {
    pub slug: String,
    pub result: std::result::Result<String, String>,
}

/// Per-article results followed by the run totals
pub fn translation_results(outcomes: &[ArticleOutcome], stats: &RunStats, dry_run: bool) -> String {
    let mut out = String::new();

    if !outcomes.is_empty() {
        let mut articles = table(&["Article", "Spanish slug", "Result"]);
        for outcome in outcomes {
            match &outcome.result {
                Ok(es_slug) => articles.add_row(vec![
                    Cell::new(&outcome.slug),
                    Cell::new(es_slug),
                    Cell::new("translated").fg(Color::Green),
                ]),
                Err(e) => articles.add_row(vec![
                    Cell::new(&outcome.slug),
                    Cell::new("-"),
                    Cell::new(e).fg(Color::Red),
                ]),
            };
        }
        let _ = writeln!(out, "{}", articles);
    }

    let mut totals = table(&["Total", "Translated", "Skipped", "Failed"]);
    totals.add_row(vec![
        Cell::new(stats.total),
        count_cell(stats.translated, false),
        Cell::new(stats.skipped),
        count_cell(stats.failed, true),
    ]);
    let _ = writeln!(out, "{}", totals);

    if dry_run {
        out.push_str("(dry run: no files were written)\n");
    }
    out
}

fn section(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{} ({}):", title, items.len());
    let (shown, hidden) = head(items, SITEMAP_ITEMS_SHOWN);
    for item in shown {
        let _ = writeln!(out, "  - {}", item);
    }
    if let Some(line) = more_line(hidden, "  ") {
        let _ = writeln!(out, "{}", line);
    }
}

/// Summary, per-segment breakdown, problems and the final verdict
pub fn sitemap(report: &ValidationReport) -> String {
    let mut summary = table(&["Metric", "Value"]);
    summary.add_row(vec![Cell::new("Base URL"), Cell::new(&report.base_url)]);
    summary.add_row(vec![Cell::new("Total URLs"), Cell::new(report.total_urls)]);
    summary.add_row(vec![Cell::new("Valid"), count_cell(report.valid_urls, false)]);
    summary.add_row(vec![Cell::new("Failed"), count_cell(report.failed_urls, true)]);
    summary.add_row(vec![Cell::new("Redirects"), Cell::new(report.redirect_urls)]);
    summary.add_row(vec![
        Cell::new("Success rate"),
        Cell::new(format!("{:.1}%", report.success_rate())),
    ]);
    summary.add_row(vec![
        Cell::new("Hreflang coverage"),
        Cell::new(format!(
            "{}/{} entries ({:.1}%)",
            report.hreflang_coverage.entries_with_alternates,
            report.hreflang_coverage.total_entries,
            report.hreflang_coverage.percent()
        )),
    ]);
    summary.add_row(vec![
        Cell::new("Execution time"),
        Cell::new(format!("{:.2}s", report.execution_time)),
    ]);

    let mut segments = table(&["Segment", "Total", "Valid", "Failed", "Redirects", "Errors"]);
    for segment in &report.sitemap_results {
        segments.add_row(vec![
            Cell::new(&segment.segment),
            Cell::new(segment.total_urls),
            count_cell(segment.valid_urls, false),
            count_cell(segment.failed_urls, true),
            Cell::new(segment.redirect_urls),
            Cell::new(segment.errors.join("; ")),
        ]);
    }

    let mut out = format!("Sitemap validation\n{}\n{}\n", summary, segments);

    for segment in &report.sitemap_results {
        let failures: Vec<String> = segment
            .failures()
            .map(|r| format!("{}: {}", r.url, r.error.as_deref().unwrap_or("unknown error")))
            .collect();
        section(&mut out, &format!("Failed URLs in {}", segment.segment), &failures);
    }

    let warnings: Vec<String> = report
        .sitemap_results
        .iter()
        .flat_map(|s| s.warnings())
        .map(|(url, warning)| format!("{}: {}", url, warning))
        .collect();
    section(&mut out, "Warnings", &warnings);
    section(&mut out, "Hreflang issues", &report.hreflang_issues);
    section(&mut out, "Redirect issues", &report.redirect_loops);
    section(&mut out, "Duplicate URLs", &report.duplicate_urls);
    section(&mut out, "Entry issues", &report.entry_issues);

    if report.passed() {
        out.push_str("\n✅ All sitemap URLs are valid\n");
    } else {
        let _ = writeln!(
            out,
            "\n❌ Validation failed: {} failed URLs, {} unreadable sitemaps",
            report.failed_urls,
            report.unreadable_segments()
        );
    }
    out
}
