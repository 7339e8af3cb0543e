//! Download command for the dkit CLI.
//!
//! Fetches a URL into a directory, then optionally verifies, extracts and
//! sets permissions on the result.
//!
//! ## Usage
//!
//! ```bash
//! dkit download https://example.com/tool.tar.gz -o ~/tools -x
//! dkit download https://example.com/tool -s https://example.com/tool.sha256
//! dkit download https://example.com/tool.zip -x --no-flatten -r
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use dropkit::install::{apply_mode, parse_mode};
use dropkit::verify::{verify_with_str, verify_with_url};
use dropkit::{Config, ExtractionPlan, FlattenMode, PathResolver};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ensure_not_interrupted, fetch};
use crate::errors::DkitError;

/// File name used when the URL path has no last segment.
const FALLBACK_FILE_NAME: &str = "download";

/// Arguments for the download command.
#[derive(Args)]
pub struct DownloadArgs {
    /// URL to download.
    pub url: String,

    /// Output directory.
    #[clap(short = 'o', long = "output", default_value = ".")]
    pub output: PathBuf,

    /// Verify the download against --signature.
    #[clap(short = 'v', long = "verify", action = clap::ArgAction::SetTrue)]
    pub verify: bool,

    /// Checksum URL or a literal SHA-256 digest. Implies --verify.
    #[clap(short = 's', long = "signature")]
    pub signature: Option<String>,

    /// Extract the downloaded archive into the output directory.
    #[clap(short = 'x', long = "extract", action = clap::ArgAction::SetTrue)]
    pub extract: bool,

    /// Always strip the top-level directory when extracting.
    #[clap(short = 'f', long = "flatten", action = clap::ArgAction::SetTrue, conflicts_with = "no_flatten")]
    pub flatten: bool,

    /// Never strip the top-level directory when extracting.
    #[clap(long = "no-flatten", action = clap::ArgAction::SetTrue)]
    pub no_flatten: bool,

    /// Remove the archive after a successful extraction.
    #[clap(short = 'r', long = "remove-archive", action = clap::ArgAction::SetTrue)]
    pub remove_archive: bool,

    /// Permissions for the downloaded file when not extracting (e.g. 755 or rwxr-xr-x).
    #[clap(long = "chmod")]
    pub chmod: Option<String>,

    /// Chunk size in bytes for parallel downloads.
    #[clap(long = "chunk-size")]
    pub chunk_size: Option<u64>,

    /// Maximum number of chunks fetched at once.
    #[clap(long = "parallelism")]
    pub parallelism: Option<usize>,

    /// Overall download timeout in seconds.
    #[clap(long = "timeout")]
    pub timeout: Option<u64>,
}

impl DownloadArgs {
    /// Layers the command-line tunables over the loaded configuration.
    fn apply_to(&self, mut config: Config) -> Result<Config> {
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(parallelism) = self.parallelism {
            config.parallelism = parallelism;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(chmod) = &self.chmod {
            config.default_chmod.clone_from(chmod);
        }
        config.validate().context("Invalid download options")?;
        Ok(config)
    }
}

/// Executes the download command.
///
/// # Process
///
/// 1. Create the output directory, falling back to a writable PATH directory
/// 2. Download the URL in parallel chunks where possible
/// 3. Verify against the signature, if one was given
/// 4. Extract (and optionally remove) the archive, or set the file mode
///
/// # Errors
///
/// Returns an error if:
/// - The options are invalid
/// - No output directory can be created
/// - The download, verification or extraction fails
/// - The run is interrupted
pub async fn execute(args: &DownloadArgs, cancel: &CancellationToken) -> Result<()> {
    if args.verify && args.signature.is_none() {
        return Err(DkitError::invalid_arguments("--verify requires --signature").into());
    }

    let config = args.apply_to(Config::load().context("Failed to load configuration")?)?;
    let mode = parse_mode(&config.default_chmod)?;

    let output = prepare_output_dir(&args.output)?;
    let dest = output.join(file_name_from_url(&args.url));

    println!("Downloading {}...", args.url);
    fetch(&args.url, &dest, &config, cancel).await?;
    ensure_not_interrupted(cancel)?;

    if let Some(signature) = &args.signature {
        println!("Verifying checksum...");
        let digest = if is_url(signature) {
            let client = dropkit::download::http_client()?;
            verify_with_url(&client, &dest, signature).await
        } else {
            verify_with_str(&dest, signature)
        }
        .with_context(|| format!("Verification failed for {}", dest.display()))?;
        println!("Checksum OK (sha256 {digest})");
    }

    if args.extract {
        ensure_not_interrupted(cancel)?;
        println!("Extracting archive...");
        let report = ExtractionPlan::new(&dest, &output)
            .flatten(FlattenMode::from_flags(args.flatten, args.no_flatten))
            .extract()
            .with_context(|| format!("Failed to extract {}", dest.display()))?;
        println!(
            "Extracted {} files into {}{}",
            report.files.len(),
            output.display(),
            if report.flattened {
                " (top-level directory removed)"
            } else {
                ""
            }
        );

        if args.remove_archive {
            println!("Removing archive: {}", dest.display());
            if let Err(e) = std::fs::remove_file(&dest) {
                eprintln!("Warning: failed to remove archive: {e}");
            }
        }
    } else {
        apply_mode(&dest, mode)?;
        debug!(path = %dest.display(), mode = format_args!("{mode:o}"), "Applied file mode");
    }

    Ok(())
}

/// Creates `requested`, or falls back to the resolved install directory when
/// it cannot be created.
fn prepare_output_dir(requested: &Path) -> Result<PathBuf> {
    match std::fs::create_dir_all(requested) {
        Ok(()) => Ok(requested.to_path_buf()),
        Err(e) => {
            let fallback = PathResolver::from_process().resolve().with_context(|| {
                format!("Failed to create output directory: {}", requested.display())
            })?;
            println!(
                "Note: cannot use {} ({e}), using writable directory: {}",
                requested.display(),
                fallback.display()
            );
            Ok(fallback)
        }
    }
}

fn is_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://")
}

/// Returns the last path segment of `url`, or `download` when there is none.
fn file_name_from_url(url: &str) -> String {
    let name = reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_else(|| {
            let path = url.split(['?', '#']).next().unwrap_or_default();
            path.rsplit('/').next().unwrap_or_default().to_string()
        });

    if name.is_empty() || name == "." || name == ".." {
        FALLBACK_FILE_NAME.to_string()
    } else {
        name
    }
}
