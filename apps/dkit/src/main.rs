#![warn(clippy::pedantic)]

//! # dkit
//!
//! Cross-platform installer for release binaries. Downloads in parallel
//! byte-range chunks, verifies SHA-256 checksums, extracts archives safely
//! and places executables in a writable directory on PATH.
//!
//! ## Subcommands
//!
//! - `download` - Fetch a URL, optionally verify and extract it
//! - `install` - Install a GitHub release asset for this platform
//! - `path` - Show where executables would be installed
//!
//! ## Examples
//!
//! ```bash
//! dkit download https://example.com/tool.tar.gz -x -r
//! dkit install cli/cli
//! dkit path --all
//! ```
//!
//! ## Logging
//!
//! Diagnostics go to stderr through `tracing`. `--verbose` enables debug
//! output for dkit; `DKIT_LOG` takes a full `EnvFilter` directive and wins
//! over `--verbose`.

mod commands;
mod errors;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{download, install, path};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "DKIT_LOG";

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("DKIT_GIT_COMMIT"),
    ")"
);

/// Cross-platform installer for release binaries.
#[derive(Parser)]
#[command(
    name = "dkit",
    author,
    version,
    long_version = LONG_VERSION,
    about = "Download, verify, extract and install release binaries",
    after_help = "\
ENVIRONMENT VARIABLES:
    DKIT_CONFIG             Path to the config file
    DKIT_CHUNK_SIZE         Chunk size in bytes (default: 1048576)
    DKIT_PARALLELISM        Concurrent chunk requests (default: 4)
    DKIT_TIMEOUT            Download timeout in seconds (default: 300)
    DKIT_GITHUB_API         GitHub API base URL (default: https://api.github.com)
    GITHUB_TOKEN            Token for GitHub API requests
    DKIT_LOG                Log filter, e.g. 'dropkit=debug'"
)]
pub struct Cli {
    /// Print debug diagnostics to stderr.
    #[clap(long = "verbose", global = true, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the dkit CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Download a file, optionally verifying and extracting it.
    ///
    /// Uses parallel byte-range requests when the server supports them.
    /// The file name is taken from the last segment of the URL.
    Download(download::DownloadArgs),

    /// Install a GitHub release asset for this platform.
    ///
    /// Picks the asset matching the platform, verifies it against a
    /// published checksum file and extracts it into a directory on PATH.
    Install(install::InstallArgs),

    /// Show the installation directory.
    ///
    /// Prints the first writable directory from PATH (or a per-user
    /// fallback). With --all, lists every candidate with its priority.
    Path(path::PathArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Prints an error and returns the appropriate exit code.
fn handle_error(e: &anyhow::Error) -> i32 {
    let code = errors::exit_code(e);
    if code == errors::EXIT_INTERRUPTED {
        eprintln!();
        eprintln!("Interrupted");
    } else {
        eprintln!("Error: {e:?}");
    }
    code
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Download(args) => download::execute(&args, &cancel).await,
        Commands::Install(args) => install::execute(&args, &cancel).await,
        Commands::Path(args) => path::execute(&args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "dkit=debug,dropkit=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}
