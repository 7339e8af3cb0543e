//! Command modules for the dkit CLI.
//!
//! - [`download`] - Fetch a URL, optionally verify and extract it
//! - [`install`] - Install a GitHub release asset for this platform
//! - [`path`] - Show where executables would be installed
//!
//! Commands share the downloader setup in this module so that progress
//! display and Ctrl-C handling behave the same everywhere.

pub mod download;
pub mod install;
pub mod path;

use std::path::Path;

use anyhow::{Context, Result};
use dropkit::{ChunkedDownloader, Config, DownloadOutcome, DownloadStrategy, DownloadTask};
use tokio_util::sync::CancellationToken;

use crate::errors::DkitError;
use crate::progress::{format_bytes, terminal_progress};

/// Downloads `url` to `dest` with terminal progress, honouring `cancel`.
///
/// # Errors
///
/// Returns the downloader's error with the URL as context.
pub async fn fetch(
    url: &str,
    dest: &Path,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<DownloadOutcome> {
    let downloader = ChunkedDownloader::new()
        .context("Failed to create HTTP client")?
        .on_progress(terminal_progress())
        .with_cancellation(cancel.clone());

    let task = DownloadTask::from_config(url, dest, config);
    let outcome = downloader
        .download(&task)
        .await
        .with_context(|| format!("Failed to download {url}"))?;

    let how = match outcome.strategy {
        DownloadStrategy::Chunked { chunks } => format!("{chunks} chunks"),
        DownloadStrategy::Single => "single request".to_string(),
    };
    println!(
        "Downloaded {} to {} ({how})",
        format_bytes(outcome.bytes),
        dest.display()
    );
    Ok(outcome)
}

/// Stops a command between steps once Ctrl-C has been pressed.
///
/// # Errors
///
/// Returns [`DkitError::Interrupted`] if `cancel` has fired.
pub fn ensure_not_interrupted(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(DkitError::Interrupted.into());
    }
    Ok(())
}
