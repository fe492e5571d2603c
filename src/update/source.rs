//! Release source for `QuickLaunch`
//!
//! Fetches the latest published release from the GitHub Releases API and
//! streams release assets. Prereleases and drafts are never offered.

use crate::error::{QuickLaunchError, Result, StringError};
use crate::update::task::CancelToken;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use semver::Version;
use serde::Deserialize;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connect timeout shared by every request
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Total timeout of the "latest release" request and checksum downloads
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(30);
/// Total timeout of an artifact download
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

const DEFAULT_API_BASE: &str = "https://api.github.com";
const CHUNK_SIZE: usize = 64 * 1024;

/// A downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    /// File name
    pub name: String,
    /// Direct download URL
    pub download_url: String,
    /// Advertised size in bytes
    pub size: u64,
}

/// A published release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Version parsed from the tag
    pub version: Version,
    /// Release page URL
    pub html_url: String,
    /// Release notes (markdown)
    pub notes: String,
    /// Attached files
    pub assets: Vec<ReleaseAsset>,
}

/// Where releases and their artifacts come from
pub trait ReleaseSource: Send + Sync {
    /// The latest stable release, or `None` when nothing is published
    fn latest_release(&self) -> Result<Option<Release>>;

    /// Small text asset such as a checksum list
    fn fetch_text(&self, url: &str) -> Result<String>;

    /// Stream `url` into `sink`, returning the number of bytes written
    fn download(&self, url: &str, sink: &mut dyn Write, cancel: &CancelToken) -> Result<u64>;
}

/// GitHub API response for a release
#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
    size: u64,
}

/// Parse a "latest release" API response
///
/// Prereleases and drafts yield `None`. A leading `v` on the tag is ignored.
pub fn parse_release(json: &str) -> Result<Option<Release>> {
    let release: GitHubRelease = serde_json::from_str(json)?;

    if release.prerelease || release.draft {
        info!("Latest release {} is a prerelease or draft, skipping", release.tag_name);
        return Ok(None);
    }

    let tag = release.tag_name.trim();
    let version = Version::parse(tag.strip_prefix('v').unwrap_or(tag)).map_err(|e| {
        warn!("Failed to parse version from tag '{}': {}", tag, e);
        QuickLaunchError::VersionParse(e)
    })?;

    Ok(Some(Release {
        version,
        html_url: release.html_url,
        notes: release.body.unwrap_or_default(),
        assets: release
            .assets
            .into_iter()
            .map(|asset| ReleaseAsset {
                name: asset.name,
                download_url: asset.browser_download_url,
                size: asset.size,
            })
            .collect(),
    }))
}

/// [`ReleaseSource`] backed by GitHub Releases
pub struct GitHubReleaseSource {
    api_base: String,
    repo_owner: String,
    repo_name: String,
    check_client: Client,
    download_client: Client,
}

impl GitHubReleaseSource {
    /// Create a source for `repo_owner/repo_name`
    pub fn new(repo_owner: impl Into<String>, repo_name: impl Into<String>) -> Result<Self> {
        let user_agent = format!("QuickLaunch/{}", env!("CARGO_PKG_VERSION"));
        let build = |timeout: Duration| {
            Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(timeout)
                .user_agent(user_agent.clone())
                .build()
                .map_err(|e| {
                    warn!("Failed to create HTTP client: {}", e);
                    QuickLaunchError::network(None, e)
                })
        };

        Ok(Self {
            api_base: DEFAULT_API_BASE.to_string(),
            repo_owner: repo_owner.into(),
            repo_name: repo_name.into(),
            check_client: build(CHECK_TIMEOUT)?,
            download_client: build(DOWNLOAD_TIMEOUT)?,
        })
    }

    /// Point the source at a different API host (GitHub Enterprise, mirrors)
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// URL of the repository's releases page
    pub fn releases_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/releases",
            self.repo_owner, self.repo_name
        )
    }
}

impl ReleaseSource for GitHubReleaseSource {
    fn latest_release(&self) -> Result<Option<Release>> {
        let api_url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base, self.repo_owner, self.repo_name
        );
        debug!("Fetching latest release from: {}", api_url);

        let response = self
            .check_client
            .get(&api_url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            info!("Repository has no published releases");
            return Ok(None);
        }
        let response = ensure_success(response)?;
        let body = response.text().map_err(transport_error)?;
        parse_release(&body)
    }

    fn fetch_text(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);
        let response = self
            .check_client
            .get(url)
            .send()
            .map_err(transport_error)?;
        ensure_success(response)?
            .text()
            .map_err(transport_error)
    }

    fn download(&self, url: &str, sink: &mut dyn Write, cancel: &CancelToken) -> Result<u64> {
        info!("Downloading {}", url);
        let mut response = self
            .download_client
            .get(url)
            .send()
            .map_err(transport_error)?;
        response = ensure_success(response)?;

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            if cancel.is_cancelled() {
                info!("Download cancelled after {} bytes", written);
                return Err(QuickLaunchError::Cancelled);
            }
            let read = response
                .read(&mut buffer)
                .map_err(|e| QuickLaunchError::network(None, e))?;
            if read == 0 {
                break;
            }
            sink.write_all(&buffer[..read])?;
            written += read as u64;
        }

        debug!("Downloaded {} bytes", written);
        Ok(written)
    }
}

fn transport_error(error: reqwest::Error) -> QuickLaunchError {
    warn!("HTTP request failed: {}", error);
    QuickLaunchError::network(error.status().map(|s| s.as_u16()), error)
}

/// Turn a non-success status into a `Network` error
///
/// GitHub signals an exhausted rate limit with 403 and
/// `x-ratelimit-remaining: 0`; that case is reported as 429.
fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.trim() == "0"));

    warn!("GitHub returned error status: {}", status);
    let code = if rate_limited {
        StatusCode::TOO_MANY_REQUESTS.as_u16()
    } else {
        status.as_u16()
    };
    Err(QuickLaunchError::network(
        Some(code),
        StringError::new(format!("GitHub returned error status: {status}")),
    ))
}
