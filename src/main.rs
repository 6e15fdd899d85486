//! Main entry point for the site i18n CLI

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use site_i18n_tools::cli::commands::{self, Commands};

/// Translation and sitemap tooling for a bilingual site
#[derive(Parser, Debug)]
#[command(name = "site-i18n", version, about, long_about = None)]
struct Args {
    /// DeepL API key (optional, defaults to DEEPL_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    let directives = format!("site_i18n_tools={0},site_i18n={0}", log_level);
    let filter = if args.verbose {
        tracing_subscriber::EnvFilter::new(directives)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| directives.into())
    };

    // Logs go to stderr so reports on stdout stay machine-readable
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Override config with CLI args if provided
    if let Some(api_key) = args.api_key {
        std::env::set_var("DEEPL_API_KEY", api_key);
    }

    match args.command {
        Commands::Status {
            root,
            format,
            missing_only,
            validate,
        } => commands::handle_status(root, format, missing_only, validate),
        Commands::Translate {
            root,
            dry_run,
            article,
            force,
        } => commands::handle_translate(root, dry_run, article, force).await,
        Commands::ValidateSitemap {
            url,
            output,
            concurrency,
            segments,
            from_index,
            skip_alternates,
        } => {
            commands::handle_validate_sitemap(
                url,
                output,
                concurrency,
                segments,
                from_index,
                skip_alternates,
            )
            .await
        }
    }
}
