use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::download::{ensure_https, fetch};
use super::error::{Result, UpdateError};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_OWNER: &str = "naodEthiop";
pub const DEFAULT_REPO: &str = "lalibela-cli";

const UA: &str = "lalibela-updater";

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

/// Where releases come from.
///
/// The pipeline only talks to this trait; [`GithubSource`] is the real
/// implementation.
pub trait ReleaseSource {
    /// Metadata for the newest published release.
    fn latest_release(&self) -> Result<Release>;

    /// Store the contents of `asset` at `dest`.
    fn download(&self, asset: &Asset, dest: &Path) -> Result<()>;
}

/// GitHub releases API plus HTTPS asset downloads.
pub struct GithubSource {
    client: Client,
    api_base: String,
    owner: String,
    repo: String,
}

impl GithubSource {
    pub fn new(
        api_base: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_base = api_base.into();
        ensure_https(&api_base)?;
        Ok(Self {
            client: gh_client(timeout)?,
            api_base,
            owner: owner.into(),
            repo: repo.into(),
        })
    }
}

impl ReleaseSource for GithubSource {
    fn latest_release(&self) -> Result<Release> {
        fetch_latest_release(&self.client, &self.api_base, &self.owner, &self.repo)
    }

    fn download(&self, asset: &Asset, dest: &Path) -> Result<()> {
        let bytes = fetch(&self.client, &asset.browser_download_url, dest)?;
        debug!(asset = %asset.name, bytes, "downloaded");
        Ok(())
    }
}

/// Blocking client with GitHub headers and a bounded per-request timeout.
///
/// Only https requests are sent, redirect targets included.
/// `GITHUB_TOKEN`, when set, is sent as a bearer token to lift the
/// anonymous rate limit.
pub fn gh_client(timeout: Duration) -> Result<Client> {
    build_client(timeout, true)
}

pub(crate) fn build_client(timeout: Duration, https_only: bool) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(UA));
    if let Ok(tok) = env::var("GITHUB_TOKEN")
        && !tok.trim().is_empty()
    {
        let value = HeaderValue::from_str(&format!("Bearer {}", tok.trim()))
            .map_err(|e| UpdateError::network("GITHUB_TOKEN", e))?;
        headers.insert(AUTHORIZATION, value);
    }
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .https_only(https_only)
        .build()
        .map_err(|e| UpdateError::network("http client", e))
}

pub fn fetch_latest_release(
    client: &Client,
    api_base: &str,
    owner: &str,
    repo: &str,
) -> Result<Release> {
    let url = format!(
        "{}/repos/{}/{}/releases/latest",
        api_base.trim_end_matches('/'),
        owner,
        repo
    );
    info!(%url, "fetching latest release");

    let resp = client
        .get(&url)
        .send()
        .map_err(|e| UpdateError::network(&url, e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(UpdateError::HttpStatus {
            url,
            status: status.as_u16(),
        });
    }

    let rel: Release = resp.json().map_err(|e| {
        if e.is_decode() {
            UpdateError::MalformedResponse(e.to_string())
        } else {
            UpdateError::network(&url, e)
        }
    })?;
    if rel.tag_name.trim().is_empty() {
        return Err(UpdateError::EmptyTag);
    }
    debug!(tag = %rel.tag_name, assets = rel.assets.len(), "latest release");
    Ok(rel)
}
