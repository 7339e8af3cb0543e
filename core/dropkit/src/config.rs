//! Runtime configuration for dropkit.
//!
//! Settings are layered, later sources overriding earlier ones:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file: `DKIT_CONFIG` if set, else `<config dir>/dkit/config.toml`
//! 3. Environment variables (`DKIT_CHUNK_SIZE`, `DKIT_PARALLELISM`,
//!    `DKIT_TIMEOUT`, `DKIT_GITHUB_API`)
//!
//! Command-line flags are applied on top by the binary.
//!
//! ## Example file
//!
//! ```toml
//! chunk_size = 4194304
//! parallelism = 8
//! timeout_secs = 600
//! default_chmod = "rwxr-xr-x"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::install::parse_mode;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "DKIT_CONFIG";

const CHUNK_SIZE_ENV: &str = "DKIT_CHUNK_SIZE";
const PARALLELISM_ENV: &str = "DKIT_PARALLELISM";
const TIMEOUT_ENV: &str = "DKIT_TIMEOUT";
const GITHUB_API_ENV: &str = "DKIT_GITHUB_API";

/// Default size of one byte-range chunk (1 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Default number of concurrent chunk workers.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Default overall download timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default GitHub REST API base URL.
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// Tunables shared by the downloader, the installer and the release client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Size of each byte-range chunk in bytes.
    pub chunk_size: u64,
    /// Maximum number of chunks fetched concurrently.
    pub parallelism: usize,
    /// Whole-download timeout in seconds.
    pub timeout_secs: u64,
    /// Mode applied to installed files, octal (`755`) or symbolic (`rwxr-xr-x`).
    pub default_chmod: String,
    /// Base URL of the GitHub REST API.
    pub github_api: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallelism: DEFAULT_PARALLELISM,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_chmod: "755".to_string(),
            github_api: DEFAULT_GITHUB_API.to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from the default file location and the process
    /// environment, then validates it.
    ///
    /// A missing config file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, if an
    /// environment override is malformed, or if validation fails.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .or_else(default_config_path);

        let file_contents = match path {
            Some(path) if path.is_file() => Some(read_config_file(&path)?),
            _ => None,
        };

        Self::from_sources(file_contents.as_deref(), |key| std::env::var(key).ok())
    }

    /// Builds a configuration from optional TOML text and an environment lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed, an override does not parse,
    /// or the result fails [`Config::validate`].
    pub fn from_sources(
        file_contents: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match file_contents {
            Some(text) => Self::from_toml_str(text)?,
            None => Self::default(),
        };

        if let Some(value) = env(CHUNK_SIZE_ENV) {
            config.chunk_size = parse_env(CHUNK_SIZE_ENV, &value)?;
        }
        if let Some(value) = env(PARALLELISM_ENV) {
            config.parallelism = parse_env(PARALLELISM_ENV, &value)?;
        }
        if let Some(value) = env(TIMEOUT_ENV) {
            config.timeout_secs = parse_env(TIMEOUT_ENV, &value)?;
        }
        if let Some(value) = env(GITHUB_API_ENV)
            && !value.trim().is_empty()
        {
            config.github_api = value.trim().trim_end_matches('/').to_string();
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses a configuration from TOML text. Unset keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this structure.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(e.to_string()))
    }

    /// Checks that every tunable is usable.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be positive"));
        }
        if self.parallelism == 0 {
            return Err(Error::config("parallelism must be positive"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("timeout_secs must be positive"));
        }
        if self.github_api.is_empty() {
            return Err(Error::config("github_api cannot be empty"));
        }
        parse_mode(&self.default_chmod)
            .map_err(|_| Error::config(format!("default_chmod is invalid: {}", self.default_chmod)))?;
        Ok(())
    }

    /// Returns the download timeout as a [`Duration`].
    #[must_use = "returns the timeout without side effects"]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Returns `<config dir>/dkit/config.toml`, if the platform has a config dir.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dkit").join("config.toml"))
}

fn read_config_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::io(format!("Failed to read config file: {}", path.display()), e))
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("{key} must be a positive integer, got '{value}'")))
}
