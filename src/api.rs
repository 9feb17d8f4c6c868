use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::http_client::http_client;
use crate::session::{MatchDetail, MatchSummary};

const API_BASE: &str = "https://api.opendota.com/api";

/// The remote stats service as seen by the sync engine.
pub trait MatchService {
    /// Whether the player lookup returned a profile marker.
    fn player_exists(&self, player_id: u64) -> Result<bool>;

    /// Full match listing, most recent first. Non-success is an `Err` and
    /// aborts the run.
    fn list_matches(&self, player_id: u64) -> Result<Vec<MatchSummary>>;

    /// Ask the server to parse a match. Returns the response status code;
    /// the outcome is never awaited.
    fn request_parse(&self, match_id: u64) -> Result<u16>;

    fn fetch_detail(&self, match_id: u64) -> Result<MatchDetail>;
}

pub struct OpenDota {
    base: String,
    api_key: Option<String>,
}

impl OpenDota {
    pub fn new() -> Self {
        Self::with_base(API_BASE)
    }

    pub fn with_base(base: impl Into<String>) -> Self {
        let api_key = std::env::var("OPENDOTA_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self {
            base: base.into(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        match &self.api_key {
            Some(key) => format!("{}{}?api_key={}", self.base, path, key),
            None => format!("{}{}", self.base, path),
        }
    }
}

impl Default for OpenDota {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchService for OpenDota {
    fn player_exists(&self, player_id: u64) -> Result<bool> {
        let resp = http_client()?
            .get(self.url(&format!("/players/{player_id}")))
            .send()
            .context("player lookup request failed")?;
        if !resp.status().is_success() {
            return Ok(false);
        }
        let body: Value = resp.json().context("invalid player json")?;
        Ok(body.get("profile").is_some_and(|p| !p.is_null()))
    }

    fn list_matches(&self, player_id: u64) -> Result<Vec<MatchSummary>> {
        let resp = http_client()?
            .get(self.url(&format!("/players/{player_id}/matches")))
            .send()
            .context("match listing request failed")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("http {status} fetching match listing for player {player_id}");
        }
        resp.json().context("invalid match listing json")
    }

    fn request_parse(&self, match_id: u64) -> Result<u16> {
        let resp = http_client()?
            .post(self.url(&format!("/request/{match_id}")))
            .send()
            .context("parse request failed")?;
        Ok(resp.status().as_u16())
    }

    fn fetch_detail(&self, match_id: u64) -> Result<MatchDetail> {
        let resp = http_client()?
            .get(self.url(&format!("/matches/{match_id}")))
            .send()
            .context("match detail request failed")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("http {status} fetching match {match_id}");
        }
        let raw: Value = resp.json().context("invalid match detail json")?;
        Ok(MatchDetail::from_value(match_id, raw))
    }
}
