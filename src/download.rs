use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Streams a replay file from a URL into a directory.
pub trait ReplayFetcher {
    /// Returns the path of the written file. The filename is the last
    /// segment of the URL.
    fn fetch(&self, url: &str, dir: &Path) -> Result<PathBuf>;
}

pub fn url_basename(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

pub struct HttpReplayFetcher;

// Replays run to tens of megabytes, so this client has a connect timeout
// only, no whole-request timeout.
static CLIENT: OnceCell<Client> = OnceCell::new();

fn download_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .context("failed to build download client")
    })
}

impl ReplayFetcher for HttpReplayFetcher {
    fn fetch(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let name = url_basename(url);
        if name.is_empty() {
            bail!("replay url has no filename: {url}");
        }
        let mut resp = download_client()?
            .get(url)
            .send()
            .with_context(|| format!("replay request failed for {url}"))?;
        if !resp.status().is_success() {
            bail!("http {} fetching {url}", resp.status());
        }

        // Written under a .part name so an interrupted transfer never looks
        // like a finished download to the reconciliation scan.
        let tmp = dir.join(format!("{name}.part"));
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("failed to create {}", tmp.display()))?;
        resp.copy_to(&mut file)
            .with_context(|| format!("transfer failed for {url}"))?;
        let dest = dir.join(name);
        fs::rename(&tmp, &dest)
            .with_context(|| format!("failed to move replay to {}", dest.display()))?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_is_last_url_segment() {
        assert_eq!(
            url_basename("http://replay100.valve.net/570/111_0.dem.bz2"),
            "111_0.dem.bz2"
        );
        assert_eq!(url_basename("plainname.dem.bz2"), "plainname.dem.bz2");
    }
}
