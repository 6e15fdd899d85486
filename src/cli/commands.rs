//! CLI command definitions and handlers

use clap::{Subcommand, ValueEnum};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};

use crate::cli::render::{self, ArticleOutcome};
use crate::core::client::AsyncTranslator;
use crate::core::config::{SitemapConfig, TranslationSettings};
use crate::processors::article::{ArticleTranslator, RunOptions, Selection, TranslationRun};
use crate::processors::status::StatusAnalyzer;
use crate::sitemap::checker::UrlResult;
use crate::sitemap::report::SegmentResult;
use crate::sitemap::validator::{SitemapValidator, ValidationObserver};
use crate::utils::progress_bar;

/// Output format of the status report
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFormat {
    Json,
    Table,
}

/// Commands for the site translation tools
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report which English articles have Spanish translations
    Status {
        /// Project root containing src/content/articles
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = StatusFormat::Json)]
        format: StatusFormat,

        /// Print only the slugs missing a translation, one per line
        #[arg(long)]
        missing_only: bool,

        /// Check cross references and dates of translated pairs
        #[arg(long)]
        validate: bool,
    },

    /// Translate English articles to Spanish with DeepL
    Translate {
        /// Project root containing src/content/articles
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Call the API but write nothing
        #[arg(long)]
        dry_run: bool,

        /// Translate only this English slug
        #[arg(short, long)]
        article: Option<String>,

        /// Re-translate articles that already have a translation
        #[arg(long)]
        force: bool,
    },

    /// Check that every URL in the site's sitemaps resolves
    ValidateSitemap {
        /// Site base URL
        #[arg(short, long, env = "SITE_URL", default_value = "http://localhost:3000")]
        url: String,

        /// Write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum concurrent requests
        #[arg(short, long, default_value_t = SitemapConfig::DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Validate only these segments (repeatable)
        #[arg(long = "segment", value_name = "NAME")]
        segments: Vec<String>,

        /// Discover segments from the sitemap index
        #[arg(long)]
        from_index: bool,

        /// Do not request alternate-language URLs
        #[arg(long)]
        skip_alternates: bool,
    },
}

/// Handle the status command
pub fn handle_status(
    root: PathBuf,
    format: StatusFormat,
    missing_only: bool,
    validate: bool,
) -> anyhow::Result<ExitCode> {
    info!("Analyzing translation status in {}", root.display());
    let report = StatusAnalyzer::new(&root).analyze(validate)?;

    if missing_only {
        for slug in &report.missing_slugs {
            println!("{}", slug);
        }
    } else {
        match format {
            StatusFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            StatusFormat::Table => print!("{}", render::status(&report)),
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Handle the translate command
pub async fn handle_translate(
    root: PathBuf,
    dry_run: bool,
    article: Option<String>,
    force: bool,
) -> anyhow::Result<ExitCode> {
    let start_time = Instant::now();

    let settings = TranslationSettings::load(&root)?;
    let translator = AsyncTranslator::from_env()?;
    let article_translator = ArticleTranslator::new(translator.clone(), settings)?;
    let options = RunOptions {
        dry_run,
        force,
        article,
    };
    let single = options.article.is_some();
    let run = TranslationRun::new(&root, article_translator, options);

    let articles = match run.select()? {
        Selection::Articles(articles) => articles,
        Selection::AllTranslated => {
            println!("✅ All articles already have Spanish translations");
            return Ok(ExitCode::SUCCESS);
        }
        Selection::AlreadyTranslated(slug) => {
            warn!("'{}' is already translated", slug);
            println!(
                "⚠️  '{}' already has a Spanish translation. Use --force to re-translate it.",
                slug
            );
            return Ok(ExitCode::SUCCESS);
        }
    };

    info!("Translating {} article(s)", articles.len());
    if dry_run {
        info!("Dry run: translations will not be written");
    }

    let skipped = if single || force {
        0
    } else {
        run.count_translated()?
    };

    let pb = progress_bar(articles.len() as u64);
    let mut outcomes = Vec::with_capacity(articles.len());
    let mut stats = run
        .run(&articles, |article, outcome| {
            pb.inc(1);
            pb.set_message(article.slug.clone());
            outcomes.push(ArticleOutcome {
                slug: article.slug.clone(),
                result: outcome.as_ref().cloned().map_err(|e| e.to_string()),
            });
        })
        .await;
    pb.finish_with_message("Completed");

    stats.skipped = skipped;

    print!("{}", render::translation_results(&outcomes, &stats, dry_run));

    let sent = translator.get_usage().await;
    info!(
        "Sent {} characters in {:.1?}",
        sent.used,
        start_time.elapsed()
    );
    match translator.usage().await {
        Ok(account) => info!(
            "Account usage: {}/{} characters ({} remaining)",
            account.character_count,
            account.character_limit,
            account.remaining()
        ),
        Err(e) => warn!("Could not fetch account usage: {}", e),
    }
    if translator.is_quota_low().await {
        warn!("Less than 10% of the per-run character limit remains");
    }

    Ok(if stats.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Progress bar per segment while its URLs are checked
struct SegmentProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl ValidationObserver for SegmentProgress {
    fn segment_started(&self, segment: &str, urls: usize) {
        let bar = progress_bar(urls as u64);
        bar.set_message(segment.to_string());
        if let Ok(mut current) = self.bar.lock() {
            *current = Some(bar);
        }
    }

    fn url_checked(&self, _result: &UrlResult) {
        if let Ok(current) = self.bar.lock() {
            if let Some(bar) = current.as_ref() {
                bar.inc(1);
            }
        }
    }

    fn segment_finished(&self, _result: &SegmentResult) {
        if let Ok(mut current) = self.bar.lock() {
            if let Some(bar) = current.take() {
                bar.finish_and_clear();
            }
        }
    }
}

/// Handle the validate-sitemap command
pub async fn handle_validate_sitemap(
    url: String,
    output: Option<PathBuf>,
    concurrency: usize,
    segments: Vec<String>,
    from_index: bool,
    skip_alternates: bool,
) -> anyhow::Result<ExitCode> {
    let mut config = SitemapConfig::new(&url);
    config.concurrency = concurrency;
    config.from_index = from_index;
    config.check_alternates = !skip_alternates;
    if !segments.is_empty() {
        config.segments = segments;
    }

    info!(
        "Validating sitemaps of {} with {} concurrent requests",
        config.base_url, config.concurrency
    );

    let validator = SitemapValidator::new(config)?;
    let observer = SegmentProgress {
        bar: Mutex::new(None),
    };
    let report = validator.run(&observer).await?;

    print!("{}", render::sitemap(&report));

    if let Some(path) = output {
        report.save(&path)?;
        println!("\n📝 Report saved to: {}", path.display());
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
