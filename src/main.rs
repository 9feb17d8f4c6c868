use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dota_replays::api::{MatchService, OpenDota};
use dota_replays::cli::Cli;
use dota_replays::download::HttpReplayFetcher;
use dota_replays::engine::{DetailMode, SyncEngine};
use dota_replays::session::{Session, SessionStore};
use dota_replays::throttle::FixedDelay;

/// Spacing between outbound calls, per OpenDota's free-tier rate limit.
const REQUEST_INTERVAL_MS: u64 = 800;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let api = OpenDota::new();
    let exists = api
        .player_exists(cli.player_id)
        .context("player lookup failed")?;
    if !exists {
        bail!("player {} not found", cli.player_id);
    }

    let store = SessionStore::new(&cli.data_dir);
    let mut session = match store.load(cli.player_id) {
        Some(session) => {
            info!(
                player_id = cli.player_id,
                cached = session.cache.len(),
                "resuming saved session"
            );
            session
        }
        None => {
            info!(player_id = cli.player_id, "starting fresh session");
            Session::new(cli.player_id)
        }
    };

    let throttle = Box::new(FixedDelay::from_millis(REQUEST_INTERVAL_MS));
    let mut engine = SyncEngine::new(api, HttpReplayFetcher, throttle, &cli.data_dir);

    engine.refresh_matches(&mut session)?;

    let mode = if cli.refresh {
        DetailMode::Force(cli.recent_matches)
    } else {
        DetailMode::Incremental
    };
    let details = engine.refresh_details(&mut session, mode);
    let downloads = engine.refresh_downloads(&mut session)?;

    store.save(&session).context("failed to save session")?;
    info!(
        details_fetched = details.fetched,
        details_failed = details.failed.len(),
        parse_failures = details.parse_failures.len(),
        downloaded = downloads.downloaded,
        download_failures = downloads.failures.len(),
        "sync complete"
    );
    Ok(())
}
