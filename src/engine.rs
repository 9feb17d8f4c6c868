use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::api::MatchService;
use crate::download::{ReplayFetcher, url_basename};
use crate::session::{MatchSummary, Session};
use crate::throttle::Throttle;

/// Which matches `refresh_details` targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailMode {
    /// Only matches missing from the detail cache.
    Incremental,
    /// The n most recent matches, re-fetched unconditionally; -1 means all.
    Force(i64),
}

#[derive(Debug, Default)]
pub struct DetailReport {
    pub fetched: usize,
    pub parse_failures: Vec<ParseFailure>,
    pub failed: Vec<u64>,
}

/// A parse request that did not come back 2xx. `status` is `None` when the
/// request never got a response at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub match_id: u64,
    pub status: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadFailure {
    DetailsNotFound,
    ReplayUrlNotFound,
    TransferFailed(String),
}

#[derive(Debug, Default)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub failures: Vec<(u64, DownloadFailure)>,
}

/// Reconciles a `Session` against the remote service and the replay
/// directory on disk. One instance owns the session for the whole run;
/// execution is fully sequential and every outbound call goes through the
/// throttle first.
pub struct SyncEngine<S, F> {
    api: S,
    fetcher: F,
    throttle: Box<dyn Throttle>,
    data_dir: PathBuf,
}

impl<S: MatchService, F: ReplayFetcher> SyncEngine<S, F> {
    pub fn new(
        api: S,
        fetcher: F,
        throttle: Box<dyn Throttle>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            api,
            fetcher,
            throttle,
            data_dir: data_dir.into(),
        }
    }

    /// Replaces the session's match listing wholesale. A listing failure is
    /// fatal: the error bubbles up and nothing later in the run executes.
    /// Matches that dropped out of the new listing keep their cache and
    /// downloaded entries.
    pub fn refresh_matches(&mut self, session: &mut Session) -> Result<()> {
        self.throttle.wait();
        let matches = self
            .api
            .list_matches(session.player_id)
            .context("failed to fetch match listing")?;
        info!(count = matches.len(), "fetched match listing");
        session.matches = matches;
        Ok(())
    }

    /// Fetches details for the target set, requesting a server-side parse
    /// first for matches inside the recency window. Per-match failures are
    /// collected in the report; nothing aborts the batch.
    pub fn refresh_details(&mut self, session: &mut Session, mode: DetailMode) -> DetailReport {
        let now = Utc::now().timestamp();
        let targets: Vec<MatchSummary> = match mode {
            DetailMode::Force(n) => {
                let take = if n < 0 {
                    session.matches.len()
                } else {
                    (n as usize).min(session.matches.len())
                };
                session.matches[..take].to_vec()
            }
            DetailMode::Incremental => session
                .matches
                .iter()
                .filter(|m| !session.cache.contains_key(&m.match_id))
                .cloned()
                .collect(),
        };
        info!(targets = targets.len(), "resolving match details");

        let mut report = DetailReport::default();
        for summary in targets {
            // Parsing is only worth requesting while Valve still has the
            // replay; outside the window the server rejects it anyway.
            if summary.is_recent(now) {
                self.throttle.wait();
                match self.api.request_parse(summary.match_id) {
                    Ok(status) if (200..300).contains(&status) => {}
                    Ok(status) => {
                        warn!(match_id = summary.match_id, status, "parse request rejected");
                        report.parse_failures.push(ParseFailure {
                            match_id: summary.match_id,
                            status: Some(status),
                        });
                    }
                    Err(err) => {
                        warn!(match_id = summary.match_id, error = %err, "parse request failed");
                        report.parse_failures.push(ParseFailure {
                            match_id: summary.match_id,
                            status: None,
                        });
                    }
                }
            }

            self.throttle.wait();
            match self.api.fetch_detail(summary.match_id) {
                Ok(detail) => {
                    session.cache.insert(summary.match_id, detail);
                    report.fetched += 1;
                }
                Err(err) => {
                    warn!(match_id = summary.match_id, error = %err, "detail fetch failed");
                    report.failed.push(summary.match_id);
                }
            }
        }
        report
    }

    /// Downloads replays for listed matches inside the recency window that
    /// are not already on disk. Per-match failures are collected in the
    /// report; only a failure to create the replay directory is fatal.
    pub fn refresh_downloads(&mut self, session: &mut Session) -> Result<DownloadReport> {
        let dir = self.replay_dir(session.player_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create replay dir {}", dir.display()))?;

        let existing = scan_existing(&dir, session)?;
        info!(existing = existing.len(), "found existing replay downloads");

        let now = Utc::now().timestamp();
        let mut report = DownloadReport::default();
        let matches = session.matches.clone();
        for summary in matches {
            if !summary.is_recent(now) {
                continue;
            }
            let Some(detail) = session.cache.get(&summary.match_id) else {
                report
                    .failures
                    .push((summary.match_id, DownloadFailure::DetailsNotFound));
                continue;
            };
            let Some(url) = detail.replay_url.clone() else {
                report
                    .failures
                    .push((summary.match_id, DownloadFailure::ReplayUrlNotFound));
                continue;
            };
            if existing.contains(url_basename(&url)) {
                continue;
            }

            self.throttle.wait();
            match self.fetcher.fetch(&url, &dir) {
                Ok(path) => {
                    info!(match_id = summary.match_id, path = %path.display(), "replay downloaded");
                    session.downloaded.insert(summary.match_id);
                    report.downloaded += 1;
                }
                Err(err) => {
                    warn!(match_id = summary.match_id, error = %err, "replay download failed");
                    report.failures.push((
                        summary.match_id,
                        DownloadFailure::TransferFailed(err.to_string()),
                    ));
                }
            }
        }
        info!(
            downloaded = report.downloaded,
            failed = report.failures.len(),
            "download pass complete"
        );
        Ok(report)
    }

    pub fn replay_dir(&self, player_id: u64) -> PathBuf {
        self.data_dir.join(format!("replays-{player_id}"))
    }
}

/// Filenames already on disk that look like `<match_id>_*.dem.bz2` for a
/// match we hold details for. Anything else in the directory is ignored.
fn scan_existing(dir: &Path, session: &Session) -> Result<BTreeSet<String>> {
    let mut existing = BTreeSet::new();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read replay dir {}", dir.display()))?;
    for entry in entries {
        let entry = entry.context("failed to read replay dir entry")?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.ends_with(".dem.bz2") {
            continue;
        }
        let parsed = name.split('_').next().and_then(|p| p.parse::<u64>().ok());
        let Some(match_id) = parsed else {
            continue;
        };
        if session.cache.contains_key(&match_id) {
            existing.insert(name.to_string());
        }
    }
    Ok(existing)
}
