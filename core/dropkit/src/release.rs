//! GitHub release resolution.
//!
//! Turns a repository reference and a version into a [`Release`], then picks
//! the asset matching a [`Platform`] and, when published, its checksum file.
//!
//! ## Data Source
//!
//! Releases come from the GitHub REST API:
//!
//! - `GET {api}/repos/{owner}/{repo}/releases/latest`
//! - `GET {api}/repos/{owner}/{repo}/releases/tags/{tag}`
//!
//! The API base defaults to `https://api.github.com` and can be changed in
//! the configuration (`github_api`, `DKIT_GITHUB_API`), which is how tests
//! point the client at a local server. `GITHUB_TOKEN`, when set, is sent as a
//! bearer token to lift the anonymous rate limit.
//!
//! ## Asset selection
//!
//! Each supported platform has a keyword list. An asset scores one point per
//! keyword found in its lowercased name, one more for `.zip` / `.tar.gz`, and
//! loses ten for `source` / `src`. The highest strictly positive score wins;
//! on a tie the earlier asset is kept.

use std::fmt;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::download::http_client;
use crate::error::{Error, Result};
use crate::platform::Platform;

/// Environment variable holding an optional GitHub token.
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Version string selecting the newest release.
pub const LATEST: &str = "latest";

const PLATFORM_KEYWORDS: &[(&str, &[&str])] = &[
    ("windows-amd64", &["windows", "win64", "amd64", "x86_64"]),
    ("windows-386", &["windows", "win32", "386", "i386"]),
    ("darwin-amd64", &["darwin", "macos", "osx", "amd64", "x86_64"]),
    ("darwin-arm64", &["darwin", "macos", "osx", "arm64", "aarch64"]),
    ("linux-amd64", &["linux", "amd64", "x86_64"]),
    ("linux-386", &["linux", "386", "i386"]),
    ("linux-arm64", &["linux", "arm64", "aarch64"]),
    ("linux-arm", &["linux", "arm", "armv7"]),
];

/// An `owner/repo` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    /// Account or organisation.
    pub owner: String,
    /// Repository name.
    pub repo: String,
}

impl RepoRef {
    /// Parses `owner/repo`, `github:owner/repo` or a `github.com` URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRepository`] unless exactly two non-empty
    /// segments remain.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || Error::InvalidRepository {
            input: input.to_string(),
        };

        let mut rest = input.trim();
        rest = rest.strip_prefix("github:").unwrap_or(rest);
        if let Some((_, after)) = rest.split_once("github.com/") {
            rest = after;
        }
        let rest = rest.trim_matches('/');
        let rest = rest.strip_suffix(".git").unwrap_or(rest);

        match rest.split('/').collect::<Vec<_>>().as_slice() {
            [owner, repo] if !owner.is_empty() && !repo.is_empty() => Ok(Self {
                owner: (*owner).to_string(),
                repo: (*repo).to_string(),
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// File name.
    pub name: String,
    /// Direct download URL.
    pub browser_download_url: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
}

impl Asset {
    /// The asset name, checked to be usable as a single file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAssetName`] if the name is empty, `.` or `..`,
    /// or contains a path separator.
    pub fn file_name(&self) -> Result<&str> {
        let name = self.name.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(Error::InvalidAssetName {
                name: self.name.clone(),
            });
        }
        Ok(name)
    }
}

/// A published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Git tag, e.g. `v1.2.0`.
    pub tag_name: String,
    /// Display name; GitHub sends `null` when unset.
    #[serde(default)]
    pub name: Option<String>,
    /// Attached files.
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Release {
    /// Picks the asset that best matches `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] for platforms without a keyword
    /// list and [`Error::NoMatchingAsset`] when no asset scores above zero.
    pub fn asset_for_platform(&self, platform: &Platform) -> Result<&Asset> {
        let id = platform.to_string();
        let keywords = PLATFORM_KEYWORDS
            .iter()
            .find(|(name, _)| *name == id)
            .map(|(_, keywords)| *keywords)
            .ok_or_else(|| Error::UnsupportedPlatform {
                platform: id.clone(),
            })?;

        let mut best: Option<(&Asset, i32)> = None;
        for asset in &self.assets {
            let score = score_asset(&asset.name, keywords);
            debug!(asset = %asset.name, score, "Scored release asset");
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((asset, score));
            }
        }

        best.map(|(asset, _)| asset)
            .ok_or(Error::NoMatchingAsset { platform: id })
    }

    /// Finds the checksum or signature file published for `asset_name`.
    #[must_use]
    pub fn signature_asset(&self, asset_name: &str) -> Option<&Asset> {
        let stem = asset_name
            .rsplit_once('.')
            .map_or(asset_name, |(stem, _)| stem);
        let patterns = [
            format!("{asset_name}.sha256"),
            format!("{asset_name}.sha256sum"),
            format!("{asset_name}.sig"),
            format!("{stem}.sha256"),
            format!("{stem}.sha256sum"),
            "checksums.txt".to_string(),
            "CHECKSUMS".to_string(),
            "SHA256SUMS".to_string(),
        ];

        patterns.iter().find_map(|pattern| {
            self.assets
                .iter()
                .find(|asset| asset.name.eq_ignore_ascii_case(pattern))
        })
    }
}

fn score_asset(name: &str, keywords: &[&str]) -> i32 {
    let name = name.to_lowercase();
    let mut score = 0;
    for keyword in keywords {
        if name.contains(keyword) {
            score += 1;
        }
    }
    if name.ends_with(".zip") || name.ends_with(".tar.gz") {
        score += 1;
    }
    if name.contains("source") || name.contains("src") {
        score -= 10;
    }
    score
}

/// Client for the GitHub releases API.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ReleaseClient {
    /// Creates a client against `base_url` without authentication.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Creates a client from configuration, picking up `GITHUB_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = std::env::var(GITHUB_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty());
        Ok(Self::new(http_client()?, &config.github_api).with_token(token))
    }

    /// Sets or clears the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Fetches `version` of `repo`; `"latest"` selects the newest release.
    ///
    /// # Errors
    ///
    /// See [`ReleaseClient::latest`].
    pub async fn release(&self, repo: &RepoRef, version: &str) -> Result<Release> {
        if version.eq_ignore_ascii_case(LATEST) {
            self.latest(repo).await
        } else {
            self.by_tag(repo, version).await
        }
    }

    /// Fetches the newest non-prerelease release.
    ///
    /// # Errors
    ///
    /// Returns transport errors, [`Error::Status`] for non-success answers
    /// (404 for unknown repositories or tags) and [`Error::Decode`] for
    /// malformed JSON.
    pub async fn latest(&self, repo: &RepoRef) -> Result<Release> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.base_url, repo.owner, repo.repo
        );
        self.get_release(&url).await
    }

    /// Fetches the release tagged `tag`.
    ///
    /// # Errors
    ///
    /// See [`ReleaseClient::latest`].
    pub async fn by_tag(&self, repo: &RepoRef, tag: &str) -> Result<Release> {
        let url = format!(
            "{}/repos/{}/{}/releases/tags/{tag}",
            self.base_url, repo.owner, repo.repo
        );
        self.get_release(&url).await
    }

    async fn get_release(&self, url: &str) -> Result<Release> {
        debug!(url, "Fetching release");
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(|e| Error::http(url, e))?;
        if !response.status().is_success() {
            return Err(Error::status(url, response.status().as_u16()));
        }

        let body = response.text().await.map_err(|e| Error::http(url, e))?;
        serde_json::from_str(&body).map_err(|source| Error::Decode {
            url: url.to_string(),
            source,
        })
    }
}
