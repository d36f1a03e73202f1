//! Command-line interface definitions.
//!
//! Two subcommands cover the two halves of the system: `scrape` runs the
//! article pipeline, `publish` delivers pending articles to the channel.
//! Publisher credentials come from the environment.

use clap::{Args, Parser, Subcommand};

/// Command-line arguments for news_relay.
///
/// # Examples
///
/// ```sh
/// # Fetch up to 10 articles, translating to Russian
/// news_relay scrape -n 10 -l ru
///
/// # Deliver pending articles (token and channel from the environment)
/// news_relay publish --parsed-dir articles
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, translate, and store new articles from the configured source
    Scrape(ScrapeArgs),
    /// Deliver stored articles to the Telegram channel
    Publish(PublishArgs),
}

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// Base site URL used to resolve relative links (overrides the profile)
    #[arg(long)]
    pub base_url: Option<String>,

    /// RSS feed URL (overrides the configured source profile)
    #[arg(long)]
    pub rss_url: Option<String>,

    /// Max articles to process this run
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Translate to this language code; empty means no translation
    #[arg(short = 'l', long, default_value = "")]
    pub lang: String,

    /// Directory for article output and the catalog
    #[arg(short, long, default_value = "articles")]
    pub output_dir: String,

    /// Posted-state file with already-published ids (read-only for scrape)
    #[arg(long, default_value = "articles/posted.json")]
    pub posted_state_file: String,

    /// Optional path to a YAML config with the source profile
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Directory with processed articles
    #[arg(long, default_value = "articles")]
    pub parsed_dir: String,

    /// Posted-state file tracking delivered ids
    #[arg(long, default_value = "articles/posted.json")]
    pub state_file: String,

    /// Max articles to send this run
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Bot token for the delivery transport
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: Option<String>,

    /// Destination channel id
    #[arg(long, env = "TELEGRAM_CHANNEL")]
    pub telegram_channel: Option<String>,

    /// Seconds to sleep between articles
    #[arg(long, env = "POST_DELAY", default_value_t = 10.0)]
    pub post_delay: f64,

    /// Optional path to a YAML config with publish settings
    #[arg(short, long)]
    pub config: Option<String>,
}
