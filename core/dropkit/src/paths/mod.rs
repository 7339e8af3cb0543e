//! Install directory resolution.
//!
//! [`PathResolver`] picks a directory to place executables in. It prefers
//! directories already on `PATH`, skips system locations and the private
//! `bin` directories of language toolchains, and falls back to per-user
//! locations such as `~/.local/bin`.
//!
//! ## Module Structure
//!
//! - `classify` - Deny-list and [`PriorityClass`] heuristics
//!
//! ## Resolution order
//!
//! ```text
//! PATH entries ─┬─ drop empty, relative and "." entries, duplicates
//!               ├─ drop denied system directories
//!               └─ sort stably: High, Normal, Low
//!                    └─ first entry passing the write probe
//! fallbacks ──────── created if missing, same probe
//! ```
//!
//! Process state is read only by [`Environment::capture`]; everything else
//! works on the injected snapshot.

mod classify;

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::extract::guard::lexical_clean;
use crate::platform::Os;

pub use classify::PriorityClass;

const PROBE_PREFIX: &str = ".dkit-probe-";

/// Snapshot of the process state the resolver depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// `PATH` entries in order.
    pub path_entries: Vec<PathBuf>,
    /// The user's home directory.
    pub home: Option<PathBuf>,
    /// The operating system family.
    pub os: Os,
    /// The login shell (`SHELL`), used for PATH hints.
    pub shell: Option<String>,
}

impl Environment {
    /// Captures `PATH`, the home directory and `SHELL` from the running process.
    #[must_use]
    pub fn capture() -> Self {
        let path_entries = std::env::var_os("PATH")
            .map(|path| std::env::split_paths(&path).collect())
            .unwrap_or_default();
        Self {
            path_entries,
            home: dirs::home_dir(),
            os: Os::current(),
            shell: std::env::var("SHELL").ok(),
        }
    }

    /// Creates a snapshot from explicit values.
    #[must_use]
    pub fn new(path_entries: Vec<PathBuf>, home: Option<PathBuf>, os: Os) -> Self {
        Self {
            path_entries,
            home,
            os,
            shell: None,
        }
    }

    /// Sets the login shell.
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    /// Returns `true` if `dir` is one of the `PATH` entries.
    ///
    /// Comparison is lexical and, on Windows, case-insensitive.
    #[must_use = "returns the check result without side effects"]
    pub fn is_on_path(&self, dir: &Path) -> bool {
        let wanted = self.key(&lexical_clean(dir));
        self.path_entries
            .iter()
            .any(|entry| self.key(&lexical_clean(entry)) == wanted)
    }

    fn key(&self, path: &Path) -> String {
        if self.os.is_windows() {
            classify::normalize(path)
        } else {
            path.to_string_lossy().into_owned()
        }
    }
}

/// A directory considered for installation, with its priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePath {
    /// The cleaned directory path.
    pub path: PathBuf,
    /// Ordering bucket.
    pub priority: PriorityClass,
}

/// Finds a writable directory for installed executables.
#[derive(Debug, Clone)]
pub struct PathResolver {
    env: Environment,
}

impl PathResolver {
    /// Creates a resolver over an environment snapshot.
    #[must_use]
    pub const fn new(env: Environment) -> Self {
        Self { env }
    }

    /// Creates a resolver over the current process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self::new(Environment::capture())
    }

    /// The snapshot this resolver works on.
    #[must_use]
    pub const fn environment(&self) -> &Environment {
        &self.env
    }

    /// `PATH` entries that survive filtering, ordered High, Normal, Low with
    /// discovery order preserved inside each class.
    #[must_use]
    pub fn candidates(&self) -> Vec<CandidatePath> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for entry in &self.env.path_entries {
            if !looks_absolute(entry.as_os_str()) {
                continue;
            }
            let path = lexical_clean(entry);
            if !seen.insert(self.env.key(&path)) {
                continue;
            }
            if classify::is_denied(&path, self.env.os) {
                debug!(path = %path.display(), "Skipping system directory");
                continue;
            }
            let priority = classify::classify(&path, self.env.home.as_deref());
            debug!(path = %path.display(), %priority, "Classified PATH entry");
            candidates.push(CandidatePath { path, priority });
        }

        candidates.sort_by_key(|candidate| candidate.priority);
        candidates
    }

    /// Per-user locations tried when no `PATH` entry is writable.
    #[must_use]
    pub fn fallbacks(&self) -> Vec<PathBuf> {
        let Some(home) = &self.env.home else {
            return Vec::new();
        };
        if self.env.os.is_windows() {
            vec![
                home.join("AppData").join("Local").join("bin"),
                home.join("bin"),
            ]
        } else {
            vec![home.join(".local").join("bin"), home.join("bin")]
        }
    }

    /// Returns the first candidate, then the first fallback, that accepts a
    /// write probe. Fallback directories are created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoWritableDirectory`] if nothing is writable.
    pub fn resolve(&self) -> Result<PathBuf> {
        let candidates = self.candidates();
        let fallbacks = self.fallbacks();

        for candidate in &candidates {
            if is_writable(&candidate.path) {
                debug!(
                    path = %candidate.path.display(),
                    priority = %candidate.priority,
                    "Selected PATH entry"
                );
                return Ok(candidate.path.clone());
            }
        }

        for dir in &fallbacks {
            if let Err(e) = std::fs::create_dir_all(dir) {
                debug!(path = %dir.display(), error = %e, "Cannot create fallback directory");
                continue;
            }
            if is_writable(dir) {
                debug!(path = %dir.display(), "Selected fallback directory");
                return Ok(dir.clone());
            }
        }

        Err(Error::NoWritableDirectory {
            searched: candidates.len() + fallbacks.len(),
        })
    }
}

/// Probes `dir` by creating and removing a uniquely named file in it.
#[must_use]
pub fn is_writable(dir: &Path) -> bool {
    dir.is_dir()
        && tempfile::Builder::new()
            .prefix(PROBE_PREFIX)
            .tempfile_in(dir)
            .is_ok()
}

/// Absolute in either Unix or Windows form, independent of the host.
fn looks_absolute(entry: &OsStr) -> bool {
    let text = entry.to_string_lossy();
    let bytes = text.as_bytes();
    text.starts_with('/')
        || text.starts_with('\\')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}
