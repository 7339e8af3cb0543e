//! Post-download installation helpers.
//!
//! After a download lands (and is optionally extracted), the installer:
//!
//! - applies a permission mode given as octal (`755`) or symbolic
//!   (`rwxr-xr-x`) text, see [`parse_mode`] and [`apply_mode`]
//! - lists the executables that were produced, see [`find_executables`]
//! - detects other copies of those executables that win on PATH, see
//!   [`find_shadowing`]
//! - tells the user how to put the install directory on PATH, see
//!   [`path_hint`]
//!
//! ## Usage
//!
//! ```ignore
//! use dropkit::install::{find_executables, find_shadowing, format_shadowing_warning};
//!
//! let installed = find_executables(&dir)?;
//! let shadowed = find_shadowing(&installed);
//! if !shadowed.is_empty() {
//!     eprintln!("{}", format_shadowing_warning(&shadowed));
//! }
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::paths::Environment;

#[cfg(any(not(unix), test))]
const WINDOWS_EXECUTABLE_EXTENSIONS: &[&str] = &["exe", "bat", "cmd", "ps1"];

/// Parses a permission mode.
///
/// Accepts exactly three octal digits (`"755"`) or a nine-character
/// `rwx` string (`"rwxr-xr-x"`) where each position is its letter or `-`.
///
/// # Errors
///
/// Returns [`Error::InvalidMode`] for anything else.
pub fn parse_mode(text: &str) -> Result<u32> {
    let invalid = || Error::InvalidMode {
        value: text.to_string(),
    };

    match text.len() {
        3 => text.chars().try_fold(0u32, |mode, c| {
            c.to_digit(8).map(|digit| mode << 3 | digit).ok_or_else(invalid)
        }),
        9 => text
            .chars()
            .zip("rwxrwxrwx".chars())
            .try_fold(0u32, |mode, (c, letter)| match c {
                '-' => Ok(mode << 1),
                c if c == letter => Ok(mode << 1 | 1),
                _ => Err(invalid()),
            }),
        _ => Err(invalid()),
    }
}

/// Sets the permission bits of `path`. Does nothing on non-Unix platforms.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
#[cfg(unix)]
pub fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    debug!(path = %path.display(), mode = format_args!("{mode:o}"), "Setting file mode");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| Error::io(format!("Failed to set permissions: {}", path.display()), e))
}

/// Sets the permission bits of `path`. Does nothing on non-Unix platforms.
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(unix))]
pub fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    debug!(path = %path.display(), mode = format_args!("{mode:o}"), "Ignoring file mode on this platform");
    Ok(())
}

/// Recursively lists executable files under `dir`, sorted by path.
///
/// A single file is checked directly. See [`is_executable`].
///
/// # Errors
///
/// Returns an error if the tree cannot be walked.
pub fn find_executables(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            Error::io(
                format!("Failed to scan directory: {}", path.display()),
                e.into(),
            )
        })?;
        if entry.file_type().is_file() && is_executable(entry.path()) {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Whether `path` is an executable regular file.
///
/// On Windows this goes by extension (`.exe`, `.bat`, `.cmd`, `.ps1`);
/// elsewhere by any execute bit. Unreadable paths are not executable.
#[cfg(unix)]
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

/// Whether `path` is an executable regular file.
///
/// On Windows this goes by extension (`.exe`, `.bat`, `.cmd`, `.ps1`);
/// elsewhere by any execute bit. Unreadable paths are not executable.
#[cfg(not(unix))]
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    path.is_file() && has_windows_executable_extension(path)
}

#[cfg(any(not(unix), test))]
fn has_windows_executable_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            WINDOWS_EXECUTABLE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// An installed executable hidden behind another file of the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shadowing {
    /// File name that was looked up.
    pub binary: String,
    /// What PATH resolves the name to.
    pub found: PathBuf,
    /// What was just installed.
    pub installed: PathBuf,
}

/// Reports installed executables that resolve elsewhere on the process PATH.
#[must_use]
pub fn find_shadowing(installed: &[PathBuf]) -> Vec<Shadowing> {
    find_shadowing_in(installed, &Environment::capture())
}

/// Reports installed executables that resolve elsewhere on `env`'s PATH.
///
/// A name that does not resolve at all is not reported; that case is covered
/// by [`path_hint`].
#[must_use]
pub fn find_shadowing_in(installed: &[PathBuf], env: &Environment) -> Vec<Shadowing> {
    let Ok(search_path) = std::env::join_paths(&env.path_entries) else {
        return Vec::new();
    };
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut shadowed = Vec::new();
    for path in installed {
        let Some(binary) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if let Ok(found) = which::which_in(binary, Some(&search_path), &cwd)
            && !same_file(&found, path)
        {
            debug!(binary, found = %found.display(), "Installed binary is shadowed");
            shadowed.push(Shadowing {
                binary: binary.to_string(),
                found,
                installed: path.clone(),
            });
        }
    }
    shadowed
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Formats a user-facing warning for shadowed executables.
#[must_use]
pub fn format_shadowing_warning(shadowed: &[Shadowing]) -> String {
    if shadowed.is_empty() {
        return String::new();
    }

    let mut lines = vec!["Warning: PATH conflict detected".to_string()];
    for entry in shadowed {
        lines.push(format!(
            "  '{}' found at: {}",
            entry.binary,
            entry.found.display()
        ));
        lines.push(format!("  Installed:       {}", entry.installed.display()));
    }

    if let Some(first) = shadowed.first()
        && let Some(parent) = first.installed.parent()
    {
        lines.push(String::new());
        lines.push(format!(
            "  Ensure {} comes before {} in your PATH",
            parent.display(),
            first
                .found
                .parent()
                .map_or_else(|| first.found.display().to_string(), |p| p.display().to_string())
        ));
    }

    lines.join("\n")
}

/// Shells with a known PATH syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    /// GNU Bash.
    Bash,
    /// Z shell.
    Zsh,
    /// Fish.
    Fish,
}

impl Shell {
    /// Parses a shell from a path string (e.g., "/bin/bash").
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let shell_name = Path::new(path).file_name()?.to_str()?;
        match shell_name {
            "bash" => Some(Self::Bash),
            "zsh" => Some(Self::Zsh),
            "fish" => Some(Self::Fish),
            _ => None,
        }
    }

    /// The command that prepends `dir` to PATH in this shell.
    ///
    /// Bash/Zsh escape `$`, backticks, `"` and `\` inside double quotes; Fish
    /// single-quotes paths containing special characters.
    #[must_use]
    pub fn path_command(self, dir: &Path) -> String {
        let text = dir.display().to_string();
        match self {
            Self::Bash | Self::Zsh => {
                let escaped = text
                    .replace('\\', "\\\\")
                    .replace('$', "\\$")
                    .replace('`', "\\`")
                    .replace('"', "\\\"");
                format!("export PATH=\"{escaped}:$PATH\"")
            }
            Self::Fish => {
                let needs_quotes = text.contains([
                    ' ', '$', '\\', '\'', '*', '?', '(', ')', '[', ']', '{', '}',
                ]);
                if needs_quotes {
                    format!("fish_add_path '{}'", text.replace('\'', "\\'"))
                } else {
                    format!("fish_add_path {text}")
                }
            }
        }
    }
}

/// Returns an instruction for adding `dir` to PATH, or `None` when it is
/// already there.
#[must_use]
pub fn path_hint(dir: &Path, env: &Environment) -> Option<String> {
    if env.is_on_path(dir) {
        return None;
    }

    if env.os.is_windows() {
        return Some(format!(
            "Add {} to your PATH manually (System Properties > Environment Variables)",
            dir.display()
        ));
    }

    let shell = env
        .shell
        .as_deref()
        .and_then(Shell::from_path)
        .unwrap_or(Shell::Bash);
    Some(format!(
        "Add {} to your PATH:\n  {}",
        dir.display(),
        shell.path_command(dir)
    ))
}
