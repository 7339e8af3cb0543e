#![warn(clippy::pedantic)]
//! Installer core for the `dkit` command-line tool.
//!
//! This crate provides the building blocks for fetching a release artifact and
//! putting its contents somewhere the user can run them:
//!
//! ```text
//! release lookup → chunked download → checksum → extraction → install dir
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dropkit::{ChunkedDownloader, DownloadTask, FlattenMode, PathResolver, extract_archive};
//!
//! async fn fetch(url: &str) -> dropkit::Result<()> {
//!     let dir = PathResolver::from_process().resolve()?;
//!     let archive = dir.join("tool.tar.gz");
//!
//!     ChunkedDownloader::new()?
//!         .download(&DownloadTask::new(url, &archive))
//!         .await?;
//!     extract_archive(&archive, &dir, FlattenMode::AutoIfSingleTopDir)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - [`download`] - Parallel byte-range downloads with single-request fallback
//! - [`extract`] - Zip, tar, tar.gz and gzip extraction with path containment
//! - [`paths`] - Install directory discovery from `PATH`
//! - [`verify`] - SHA-256 checksum verification
//! - [`release`] - GitHub release and asset selection
//! - [`install`] - File modes, executable discovery and PATH hints
//! - [`config`] - Layered configuration
//! - [`platform`] - Host OS and `os-arch` identifiers
//! - [`error`] - The crate-wide error type

pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod install;
pub mod paths;
pub mod platform;
pub mod release;
pub mod verify;

pub use config::Config;
pub use download::{
    ChunkedDownloader, DownloadOutcome, DownloadStrategy, DownloadTask, ProgressCallback,
    ProgressEvent,
};
pub use error::{Error, Result};
pub use extract::{ExtractionPlan, ExtractionReport, FlattenMode, extract_archive};
pub use paths::{CandidatePath, Environment, PathResolver, PriorityClass};
pub use platform::{Os, Platform};
pub use release::{Asset, Release, ReleaseClient, RepoRef};
