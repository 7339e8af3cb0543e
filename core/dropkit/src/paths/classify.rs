//! Deny-list and priority heuristics for PATH directories.
//!
//! All matching works on a normalised string form of the path (lowercase,
//! forward slashes), so Windows paths can be classified on any host.

use std::path::Path;

use crate::platform::Os;

/// Ordering bucket for an install candidate. Sorts `High` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityClass {
    /// User-owned or OS-preferred tool directory.
    High,
    /// Any other directory.
    Normal,
    /// Private area of a language runtime or package manager.
    Low,
}

impl std::fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        };
        f.write_str(name)
    }
}

const UNIX_DENIED_EXACT: &[&str] = &["/bin", "/sbin", "/usr/bin", "/usr/sbin"];
const UNIX_DENIED_PREFIX: &[&str] = &["/system", "/usr/libexec", "/snap"];
const WINDOWS_DENIED_PREFIX: &[&str] = &["c:/windows", "c:/program files"];

/// Substrings marking runtime or package-manager directories. Matched against
/// the normalised path with a trailing `/` appended.
const LOW_MARKERS: &[&str] = &[
    // python
    "/site-packages/",
    "/dist-packages/",
    "/anaconda",
    "/miniconda",
    "/conda/",
    "/.conda/",
    "/.pyenv/",
    "/venv/",
    "/.venv/",
    "/virtualenvs/",
    "/pipx/",
    // node
    "/node_modules/",
    "/.npm-global/",
    "/npm/",
    "/.nvm/",
    "/.volta/",
    "/.fnm/",
    "/pnpm/",
    // ruby
    "/gems/",
    "/.gem/",
    "/.rbenv/",
    "/.rvm/",
    // rust
    "/.cargo/",
    "/.rustup/",
    // jvm, dotnet, deno, bun, php, lua, haskell, ocaml, perl
    "/.sdkman/",
    "/.dotnet/tools/",
    "/.deno/",
    "/.bun/",
    "/.composer/",
    "/vendor/bin/",
    "/.luarocks/",
    "/.ghcup/",
    "/.cabal/",
    "/.opam/",
    "/perl5/",
];

const SYSTEM_GO_ROOTS: &[&str] = &["/usr/local/go/", "/usr/lib/go/"];

const HIGH_DIRS: &[&str] = &[
    "/usr/local/bin",
    "/opt/homebrew/bin",
    "/opt/local/bin",
    "/home/linuxbrew/.linuxbrew/bin",
    "c:/tools",
    "c:/programdata/chocolatey/bin",
];

/// Lowercase, forward-slash form of a path without a trailing slash.
pub(crate) fn normalize(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/").to_lowercase();
    match text.trim_end_matches('/') {
        "" if text.starts_with('/') => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

fn has_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Whether `path` is a system directory that must never be offered.
pub(crate) fn is_denied(path: &Path, os: Os) -> bool {
    let norm = normalize(path);
    if os.is_windows() {
        WINDOWS_DENIED_PREFIX.iter().any(|p| norm.starts_with(p))
    } else {
        UNIX_DENIED_EXACT.contains(&norm.as_str())
            || UNIX_DENIED_PREFIX.iter().any(|p| has_prefix(&norm, p))
    }
}

/// Whether `path` belongs to a language runtime or package manager.
pub(crate) fn is_language_specific(path: &Path) -> bool {
    let norm = normalize(path);
    let padded = format!("{norm}/");

    if LOW_MARKERS.iter().any(|marker| padded.contains(marker)) {
        return true;
    }

    // Python on Windows installs console scripts into `...\Python312\Scripts`.
    let segments: Vec<&str> = norm.split('/').collect();
    if segments
        .windows(2)
        .any(|pair| pair[0].starts_with("python") && pair[1] == "scripts")
    {
        return true;
    }

    // `~/go/bin` is the per-user GOPATH; the toolchain's own bin is not.
    norm.ends_with("/go/bin") && !SYSTEM_GO_ROOTS.iter().any(|root| padded.starts_with(root))
}

/// Assigns a priority class. Language-specific directories are `Low` even
/// when they live under the home directory.
pub(crate) fn classify(path: &Path, home: Option<&Path>) -> PriorityClass {
    if is_language_specific(path) {
        return PriorityClass::Low;
    }

    let norm = normalize(path);
    let under_home = home.is_some_and(|home| has_prefix(&norm, &normalize(home)));
    if under_home || HIGH_DIRS.contains(&norm.as_str()) {
        PriorityClass::High
    } else {
        PriorityClass::Normal
    }
}
