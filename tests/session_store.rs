use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde_json::{Value, json};
use tempfile::tempdir;

use dota_replays::api::MatchService;
use dota_replays::download::ReplayFetcher;
use dota_replays::engine::SyncEngine;
use dota_replays::session::{MatchDetail, MatchSummary, Session, SessionStore};
use dota_replays::throttle::NoThrottle;

#[test]
fn save_then_load_roundtrips() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path());

    let mut session = Session::new(42);
    session.matches = vec![MatchSummary {
        match_id: 1,
        start_time: 1_700_000_000,
    }];
    session.cache.insert(
        1,
        MatchDetail::from_value(1, json!({ "replay_url": "http://x/1_0.dem.bz2", "duration": 2400 })),
    );
    session.downloaded.insert(1);
    store.save(&session).unwrap();

    let loaded = store.load(42).expect("session should load");
    assert_eq!(loaded.player_id, 42);
    assert_eq!(loaded.matches.len(), 1);
    assert_eq!(loaded.matches[0].match_id, 1);
    assert_eq!(
        loaded.cache[&1].replay_url.as_deref(),
        Some("http://x/1_0.dem.bz2")
    );
    assert_eq!(loaded.cache[&1].raw["duration"], json!(2400));
    assert!(loaded.downloaded.contains(&1));
}

#[test]
fn missing_file_loads_as_none() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    assert!(store.load(42).is_none());
}

#[test]
fn corrupt_file_loads_as_none() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    fs::write(store.path(42), "not json {").unwrap();
    assert!(store.load(42).is_none());
}

#[test]
fn version_mismatch_loads_as_none() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    store.save(&Session::new(42)).unwrap();

    let raw = fs::read_to_string(store.path(42)).unwrap();
    let mut value: Value = serde_json::from_str(&raw).unwrap();
    value["version"] = json!(999);
    fs::write(store.path(42), value.to_string()).unwrap();

    assert!(store.load(42).is_none());
}

#[test]
fn file_for_another_player_loads_as_none() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    let session = Session::new(42);
    let json = serde_json::to_string(&session).unwrap();
    fs::write(store.path(99), json).unwrap();
    assert!(store.load(99).is_none());
}

struct FailingApi;

impl MatchService for FailingApi {
    fn player_exists(&self, _player_id: u64) -> Result<bool> {
        Ok(true)
    }

    fn list_matches(&self, _player_id: u64) -> Result<Vec<MatchSummary>> {
        bail!("http 503 fetching match listing");
    }

    fn request_parse(&self, _match_id: u64) -> Result<u16> {
        unreachable!();
    }

    fn fetch_detail(&self, _match_id: u64) -> Result<MatchDetail> {
        unreachable!();
    }
}

struct NoFetch;

impl ReplayFetcher for NoFetch {
    fn fetch(&self, _url: &str, _dir: &Path) -> Result<PathBuf> {
        unreachable!();
    }
}

#[test]
fn fatal_listing_failure_leaves_saved_file_untouched() {
    let dir = tempdir().unwrap();
    let store = SessionStore::new(dir.path());

    let mut session = Session::new(42);
    session.matches = vec![MatchSummary {
        match_id: 1,
        start_time: 1_700_000_000,
    }];
    store.save(&session).unwrap();
    let before = fs::read(store.path(42)).unwrap();

    let mut engine = SyncEngine::new(FailingApi, NoFetch, Box::new(NoThrottle), dir.path());
    let mut loaded = store.load(42).unwrap();
    assert!(engine.refresh_matches(&mut loaded).is_err());

    // Save only happens at normal completion, so the file is unchanged.
    let after = fs::read(store.path(42)).unwrap();
    assert_eq!(before, after);
}
