//! # News Relay
//!
//! An incremental news pipeline: scrape articles from a configured source
//! (RSS feed or HTML index pages), translate them best-effort, download
//! their images, and relay the result to a Telegram channel — without
//! re-doing work for unchanged articles or re-posting delivered ones.
//!
//! ## Usage
//!
//! ```sh
//! news_relay scrape -n 10 -l ru
//! news_relay publish
//! ```
//!
//! ## Architecture
//!
//! Two short-lived batch runs share on-disk state:
//! 1. **Scrape**: discover article descriptors, run each through the
//!    pipeline (fetch → extract → hash → translate → persist), and update
//!    the catalog used for change detection
//! 2. **Publish**: deliver articles not yet in the posted-state ledger,
//!    then append the delivered ids to the ledger (capacity-bounded)
//!
//! The final stdout line of a scrape run is
//! `NEW_ARTICLES_STATUS:true|false`, consumed by external automation.

use clap::Parser;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod catalog;
mod cli;
mod client;
mod config;
mod discover;
mod extract;
mod feed;
mod format;
mod images;
mod ledger;
mod models;
mod pipeline;
mod publisher;
mod retry;
mod telegram;
mod translate;
mod utils;
mod watermark;

use catalog::Catalog;
use cli::{Cli, Command, PublishArgs, ScrapeArgs};
use client::HttpClient;
use config::AppConfig;
use extract::SelectorExtractor;
use ledger::{DEFAULT_CAP, Ledger};
use pipeline::Pipeline;
use publisher::Publisher;
use retry::RetryPolicy;
use telegram::TelegramClient;
use translate::HttpTranslator;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();

    let result = match args.command {
        Command::Scrape(scrape) => run_scrape(scrape).await,
        Command::Publish(publish) => run_publish(publish).await,
    };

    let elapsed = start_time.elapsed();
    match &result {
        Ok(()) => info!(?elapsed, "Execution complete"),
        Err(e) => error!(?elapsed, error = %e, "Fatal error"),
    }
    result
}

/// Run the article pipeline against the configured source.
#[instrument(level = "info", skip_all)]
async fn run_scrape(args: ScrapeArgs) -> Result<(), Box<dyn Error>> {
    info!("scrape starting up");
    debug!(?args.output_dir, ?args.lang, ?args.limit, "Parsed CLI arguments");

    ensure_writable_dir(&args.output_dir).await?;

    let app_config = AppConfig::load(args.config.as_deref())?;
    let mut profile = app_config.source.clone();
    if args.rss_url.is_some() {
        profile.rss_url = args.rss_url.clone();
    }
    if let Some(base_url) = &args.base_url {
        profile.base_url = base_url.clone();
    }

    let policy = RetryPolicy::default();
    let client = HttpClient::new(policy.clone())?;

    // Pre-seeded exclusions: ids the publisher side already delivered.
    let posted = Ledger::new(&args.posted_state_file, DEFAULT_CAP).load();
    info!(
        count = posted.len(),
        path = %args.posted_state_file,
        "Loaded posted ids"
    );

    let descriptors = discover::discover_articles(&client, &profile, args.limit).await?;
    info!(count = descriptors.len(), "Articles discovered");

    let catalog = Catalog::new(Path::new(&args.output_dir).join("catalog.json"));
    let mut entries = catalog.load();

    let extractor = SelectorExtractor::from_profile(&profile)?;
    let translator = HttpTranslator::new(reqwest::Client::new());
    let pipeline = Pipeline::new(&client, &extractor, &translator, &args.output_dir, &args.lang)
        .with_retry_policy(policy);

    let outcome = pipeline
        .process_batch(&descriptors, &posted, &mut entries)
        .await;

    if outcome.catalog_dirty() {
        catalog.save(&entries)?;
    }

    info!(
        new = outcome.new_articles,
        updated = outcome.updated_articles,
        skipped = outcome.skipped,
        total_in_catalog = entries.len(),
        "Scrape run finished"
    );
    // Terminal status line consumed by external automation.
    println!(
        "NEW_ARTICLES_STATUS:{}",
        if outcome.new_articles > 0 { "true" } else { "false" }
    );

    Ok(())
}

/// Deliver pending articles and update the ledger.
#[instrument(level = "info", skip_all)]
async fn run_publish(args: PublishArgs) -> Result<(), Box<dyn Error>> {
    info!("publish starting up");

    let token = args
        .telegram_token
        .ok_or("TELEGRAM_TOKEN must be set (env or --telegram-token)")?;
    let chat_id = args
        .telegram_channel
        .ok_or("TELEGRAM_CHANNEL must be set (env or --telegram-channel)")?;

    let app_config = AppConfig::load(args.config.as_deref())?;
    let publish_config = app_config.publish;

    let parsed_dir = PathBuf::from(&args.parsed_dir);
    if !parsed_dir.is_dir() {
        return Err(format!("articles directory {} does not exist", parsed_dir.display()).into());
    }

    let ledger = Ledger::new(&args.state_file, DEFAULT_CAP);
    let policy = RetryPolicy::default();
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .build()?;
    let transport = TelegramClient::new(http, token, chat_id, policy);

    let publisher = Publisher::new(
        &transport,
        Duration::from_secs_f64(args.post_delay.max(0.0)),
        args.limit,
        publish_config.watermark.map(PathBuf::from),
        publish_config.buttons,
        publish_config.chunk_size,
    );

    let sent = publisher.run(&parsed_dir, &ledger).await?;
    info!(sent, "Publish run finished");

    Ok(())
}
