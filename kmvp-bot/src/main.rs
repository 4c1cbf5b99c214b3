mod admin;
mod config;
mod context;
mod cookies;
mod fetchers;
mod logging;
mod tagging;
mod telegram;

use anyhow::{Context, Result};
use clap::Parser;
use common::conversation::Conversation;
use common::executor::FetchAndTag;
use common::session::SessionStore;
use context::AppContext;
use cookies::CookieSync;
use fetchers::musicbrainz::MusicBrainzClient;
use fetchers::ytdlp::YtDlp;
use logging::LogControl;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tagging::LoftyTagger;
use teloxide::Bot;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

static EXAMPLES: &str = r"EXAMPLES:
    Run with settings from ~/.config/kmvp/config.toml and the environment:
    TELEGRAM_BOT_TOKEN=123:abc kmvp-bot

    Use a specific config file:
    kmvp-bot --config /etc/kmvp/config.toml

    Write finished tracks somewhere else with verbose logs:
    kmvp-bot --output-dir ~/Music/incoming --log-level DEBUG";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    after_help = EXAMPLES
)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "KMVP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory finished tracks are moved into
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Initial log level (DEBUG, INFO, WARNING, ERROR)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = config::load_config(args.config.as_deref()).await?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    let log = LogControl::init(&config.log_level)?;

    let token = config
        .bot_token
        .clone()
        .context("TELEGRAM_BOT_TOKEN is not set")?;

    let search = MusicBrainzClient::new().context("Failed to init MusicBrainz client")?;
    let executor = FetchAndTag::new(
        Arc::new(YtDlp::new(config.ytdlp_bin.clone())),
        Arc::new(LoftyTagger),
        config.output_dir.clone(),
    )
    .with_cookies(Some(config.cookies_file.clone()));
    let conversation = Conversation::new(
        Arc::new(search),
        executor,
        SessionStore::new(config.session_ttl()),
    )
    .with_link_policy(config.link_policy);

    let cookie_sync = Arc::new(CookieSync::new(
        config.drive.clone(),
        config.cookies_file.clone(),
    ));
    if config.drive.is_configured() {
        cookie_sync.clone().spawn_periodic();
    } else {
        tracing::warn!("Google Drive not configured, cookies.txt will not be refreshed");
    }

    let ctx = Arc::new(AppContext {
        conversation,
        operators: admin::Operators::new(config.admin_ids.iter().copied()),
        log,
        cookies_file: config.cookies_file.clone(),
        cookie_sync,
        started: Instant::now(),
    });

    let sweep_ctx = ctx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let purged = sweep_ctx.conversation.sessions().purge_expired();
            if purged > 0 {
                tracing::debug!("Dropped {} idle sessions", purged);
            }
        }
    });

    tracing::info!(
        "Starting bot, saving tracks to {}",
        config.output_dir.display()
    );
    telegram::run(Bot::new(token), ctx).await
}
