use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const SESSION_VERSION: u32 = 1;

/// 14 days. Matches older than this are never parse-requested or downloaded.
pub const RECENCY_WINDOW_SECS: i64 = 14 * 24 * 60 * 60;

/// Minimal per-match record from the listing endpoint. Extra fields in the
/// response are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    pub match_id: u64,
    pub start_time: i64,
}

impl MatchSummary {
    pub fn is_recent(&self, now: i64) -> bool {
        now - self.start_time < RECENCY_WINDOW_SECS
    }
}

/// Full detail record. The whole response body is kept in `raw`; the fields
/// the sync engine reads are lifted out on construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDetail {
    pub match_id: u64,
    pub replay_url: Option<String>,
    pub raw: Value,
}

impl MatchDetail {
    pub fn from_value(match_id: u64, raw: Value) -> Self {
        let replay_url = raw
            .get("replay_url")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self {
            match_id,
            replay_url,
            raw,
        }
    }
}

/// Per-player sync state. Loaded at the start of a run, mutated in place by
/// each phase, saved once at normal completion.
///
/// `cache` and `downloaded` are additive across runs: matches that drop out
/// of the latest listing keep their entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub version: u32,
    pub player_id: u64,
    #[serde(default)]
    pub matches: Vec<MatchSummary>,
    #[serde(default)]
    pub cache: BTreeMap<u64, MatchDetail>,
    #[serde(default)]
    pub downloaded: BTreeSet<u64>,
}

impl Session {
    pub fn new(player_id: u64) -> Self {
        Self {
            version: SESSION_VERSION,
            player_id,
            matches: Vec::new(),
            cache: BTreeMap::new(),
            downloaded: BTreeSet::new(),
        }
    }
}

/// One JSON file per player under `dir`, written atomically via tmp+rename.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, player_id: u64) -> PathBuf {
        self.dir.join(format!("dr-{player_id}.json"))
    }

    /// A missing, unreadable, corrupt, or version-mismatched file loads as
    /// `None`; the caller starts a fresh session instead.
    pub fn load(&self, player_id: u64) -> Option<Session> {
        let raw = fs::read_to_string(self.path(player_id)).ok()?;
        let session = serde_json::from_str::<Session>(&raw).ok()?;
        if session.version != SESSION_VERSION || session.player_id != player_id {
            return None;
        }
        Some(session)
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create data dir {}", self.dir.display()))?;
        let path = self.path(session.player_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string(session).context("serialize session")?;
        fs::write(&tmp, json).context("write session")?;
        fs::rename(&tmp, &path).context("swap session")?;
        Ok(())
    }
}
