//! Install command for the dkit CLI.
//!
//! Installs the release asset of a GitHub repository that matches this
//! platform into a directory on PATH.
//!
//! ## Usage
//!
//! ```bash
//! dkit install cli/cli                       # latest release
//! dkit install github:BurntSushi/ripgrep --version 14.1.0
//! dkit install https://github.com/sharkdp/fd -o ~/bin
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use dropkit::extract::ArchiveFormat;
use dropkit::install::{
    apply_mode, find_shadowing, format_shadowing_warning, is_executable, parse_mode, path_hint,
};
use dropkit::release::LATEST;
use dropkit::verify::verify_with_url;
use dropkit::{
    Config, Environment, Error, ExtractionPlan, FlattenMode, PathResolver, Platform, Release,
    ReleaseClient, RepoRef,
};
use tokio_util::sync::CancellationToken;

use super::{ensure_not_interrupted, fetch};

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Repository as owner/repo, github:owner/repo or a github.com URL.
    pub repo: String,

    /// Release tag to install, or "latest".
    #[clap(long = "version", default_value = LATEST)]
    pub version: String,

    /// Target platform as os-arch (e.g. linux-amd64). Detected when omitted.
    #[clap(long = "platform")]
    pub platform: Option<String>,

    /// Installation directory. A writable PATH directory is chosen when omitted.
    #[clap(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

/// Executes the install command.
///
/// # Process
///
/// 1. Resolve the repository, platform and installation directory
/// 2. Fetch the release and pick the platform asset
/// 3. Download the asset
/// 4. Verify it against a published checksum file, when there is one
/// 5. Extract archives (auto-flatten) and remove the archive
/// 6. Apply the configured mode to the installed files
/// 7. Warn about PATH shadowing and print a PATH hint
///
/// # Errors
///
/// Returns an error if:
/// - The repository or platform cannot be parsed
/// - No installation directory is writable
/// - The release or a matching asset cannot be found
/// - The download or extraction fails
/// - The checksum does not match
/// - The run is interrupted
pub async fn execute(args: &InstallArgs, cancel: &CancellationToken) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let mode = parse_mode(&config.default_chmod)?;
    let repo = RepoRef::parse(&args.repo)?;
    let platform = match &args.platform {
        Some(text) => Platform::parse(text)?,
        None => Platform::detect(),
    };

    let output = install_dir(args.output.as_deref())?;

    println!("Installing {repo} ({}) for {platform}...", args.version);
    let client = ReleaseClient::from_config(&config)?;
    let release = client
        .release(&repo, &args.version)
        .await
        .with_context(|| format!("Failed to get release {} of {repo}", args.version))?;
    println!("Found release: {}", release.tag_name);

    let asset = release.asset_for_platform(&platform)?;
    println!("Found asset: {} ({} bytes)", asset.name, asset.size);

    let downloaded = output.join(asset.file_name()?);
    fetch(&asset.browser_download_url, &downloaded, &config, cancel).await?;
    ensure_not_interrupted(cancel)?;

    verify_asset(&release, &asset.name, &downloaded).await?;
    ensure_not_interrupted(cancel)?;

    let produced = unpack(&downloaded, &output)?;
    for path in &produced {
        apply_mode(path, mode)?;
    }

    let installed: Vec<PathBuf> = produced.into_iter().filter(|p| is_executable(p)).collect();
    for path in &installed {
        println!("Installed {}", path.display());
    }
    println!("Installation completed to: {}", output.display());

    let shadowed = find_shadowing(&installed);
    if !shadowed.is_empty() {
        eprintln!();
        eprintln!("{}", format_shadowing_warning(&shadowed));
    }
    if let Some(hint) = path_hint(&output, &Environment::capture()) {
        println!();
        println!("{hint}");
    }

    Ok(())
}

fn install_dir(requested: Option<&Path>) -> Result<PathBuf> {
    let dir = match requested {
        Some(dir) => dir.to_path_buf(),
        None => {
            let dir = PathResolver::from_process()
                .resolve()
                .context("Failed to find an installation directory")?;
            println!("Using writable directory: {}", dir.display());
            dir
        }
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    Ok(dir)
}

/// Verifies `file` against the release's checksum asset.
///
/// A mismatch is fatal and removes the file. A missing or unverifiable
/// signature only prints a note.
async fn verify_asset(release: &Release, asset_name: &str, file: &Path) -> Result<()> {
    let Some(signature) = release.signature_asset(asset_name) else {
        println!("No signature file found, skipping verification");
        return Ok(());
    };

    println!("Verifying with {}...", signature.name);
    let client = dropkit::download::http_client()?;
    match verify_with_url(&client, file, &signature.browser_download_url).await {
        Ok(digest) => {
            println!("Checksum OK (sha256 {digest})");
            Ok(())
        }
        Err(e @ Error::ChecksumMismatch { .. }) => {
            std::fs::remove_file(file).ok();
            Err(e).context("Refusing to install a file that failed verification")
        }
        Err(e) => {
            eprintln!("Warning: could not verify {}: {e}", signature.name);
            Ok(())
        }
    }
}

/// Extracts `downloaded` into `output` when it is an archive, returning the
/// produced files. Anything else is installed as-is.
fn unpack(downloaded: &Path, output: &Path) -> Result<Vec<PathBuf>> {
    if ArchiveFormat::detect(downloaded).is_none() {
        return Ok(vec![downloaded.to_path_buf()]);
    }

    println!("Extracting...");
    let report = ExtractionPlan::new(downloaded, output)
        .flatten(FlattenMode::AutoIfSingleTopDir)
        .extract()
        .with_context(|| format!("Failed to extract {}", downloaded.display()))?;

    std::fs::remove_file(downloaded)
        .with_context(|| format!("Failed to remove archive: {}", downloaded.display()))?;
    Ok(report.files)
}
