//! Path command for the dkit CLI.
//!
//! Shows the directory `dkit install` would use, or every candidate with its
//! priority class.

use anyhow::{Context, Result};
use clap::Args;
use dropkit::PathResolver;
use dropkit::paths::is_writable;

/// Arguments for the path command.
#[derive(Args)]
pub struct PathArgs {
    /// List every candidate directory instead of the chosen one.
    #[clap(short = 'a', long = "all", action = clap::ArgAction::SetTrue)]
    pub all: bool,
}

/// Executes the path command.
///
/// # Errors
///
/// Returns an error if no directory is writable (without `--all`).
pub fn execute(args: &PathArgs) -> Result<()> {
    let resolver = PathResolver::from_process();

    if !args.all {
        let dir = resolver
            .resolve()
            .context("Failed to find an installation directory")?;
        println!("{}", dir.display());
        return Ok(());
    }

    for candidate in resolver.candidates() {
        println!(
            "{:<7} {:<9} {}",
            candidate.priority.to_string(),
            writable_label(&candidate.path),
            candidate.path.display()
        );
    }
    for dir in resolver.fallbacks() {
        println!("{:<7} {:<9} {}", "fallback", writable_label(&dir), dir.display());
    }
    Ok(())
}

fn writable_label(dir: &std::path::Path) -> &'static str {
    if is_writable(dir) { "writable" } else { "read-only" }
}
