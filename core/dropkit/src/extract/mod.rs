//! Archive extraction.
//!
//! Unpacks ZIP, TAR, gzip-compressed TAR and bare gzip files into a
//! destination directory.
//!
//! ## Module Structure
//!
//! - [`format`] - Suffix detection and one [`EntryReader`] per format
//! - `guard` - Entry-name normalisation and lexical containment checks
//!
//! Extraction reads the archive twice. The first pass only collects entry
//! names: it decides whether to flatten a wrapper directory and rejects the
//! whole archive if any entry would land outside the destination. The second
//! pass writes. Each pass reopens the file, so nothing is buffered in memory.
//!
//! Entries that are neither files nor directories (symlinks, hard links,
//! devices) are skipped.

pub mod format;
pub(crate) mod guard;

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use guard::{lexical_clean, normalize_entry_name, resolve_within, strip_top_level, top_level_segment};

pub use format::{ArchiveEntry, ArchiveFormat, EntryKind, EntryReader};

const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_DIR_MODE: u32 = 0o755;

/// How to treat a single top-level directory wrapping the archive contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlattenMode {
    /// Keep entry paths as stored.
    Never,
    /// Strip the first path segment of every entry.
    Always,
    /// Strip the first segment only when every entry lives under the same
    /// top-level directory.
    #[default]
    AutoIfSingleTopDir,
}

impl FlattenMode {
    /// Maps the `--flatten` / `--no-flatten` command-line flags to a mode.
    #[must_use]
    pub const fn from_flags(flatten: bool, no_flatten: bool) -> Self {
        match (flatten, no_flatten) {
            (_, true) => Self::Never,
            (true, false) => Self::Always,
            (false, false) => Self::AutoIfSingleTopDir,
        }
    }
}

/// What an extraction produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Regular files written, in archive order.
    pub files: Vec<PathBuf>,
    /// Directories created from directory entries.
    pub directories: Vec<PathBuf>,
    /// Entries skipped because of their type.
    pub skipped: usize,
    /// Whether the top-level segment was stripped from entry paths.
    pub flattened: bool,
}

/// An archive, a destination and a flatten mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPlan {
    archive: PathBuf,
    destination: PathBuf,
    flatten: FlattenMode,
}

impl ExtractionPlan {
    /// Creates a plan that auto-flattens.
    #[must_use]
    pub fn new(archive: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            destination: destination.into(),
            flatten: FlattenMode::default(),
        }
    }

    /// Sets the flatten mode.
    #[must_use]
    pub const fn flatten(mut self, mode: FlattenMode) -> Self {
        self.flatten = mode;
        self
    }

    /// The archive to read.
    #[must_use]
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// The destination root.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// The configured flatten mode.
    #[must_use]
    pub const fn flatten_mode(&self) -> FlattenMode {
        self.flatten
    }

    /// Runs the extraction.
    ///
    /// The destination is created if missing. Existing files at entry paths
    /// are replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file name has no supported archive suffix
    /// - The archive cannot be opened or parsed
    /// - Any entry would resolve outside the destination (nothing is written
    ///   in that case)
    /// - A directory or file cannot be created or written
    pub fn extract(&self) -> Result<ExtractionReport> {
        let format = ArchiveFormat::detect(&self.archive).ok_or_else(|| Error::UnsupportedFormat {
            path: self.archive.clone(),
        })?;

        let root = absolute_root(&self.destination)?;
        let flatten = if format.has_tree() {
            self.plan_flatten(format, &root)?
        } else {
            false
        };

        debug!(
            archive = %self.archive.display(),
            destination = %root.display(),
            ?format,
            flatten,
            "Extracting archive"
        );

        std::fs::create_dir_all(&root)
            .map_err(|e| Error::io(format!("Failed to create directory: {}", root.display()), e))?;

        let mut report = ExtractionReport {
            flattened: flatten,
            ..ExtractionReport::default()
        };
        let mut reader = format.open(&self.archive)?;
        reader.visit(&mut |entry, content| {
            write_entry(&root, flatten, entry, content, &mut report)
        })?;

        info!(
            archive = %self.archive.display(),
            files = report.files.len(),
            directories = report.directories.len(),
            skipped = report.skipped,
            "Extracted archive"
        );
        Ok(report)
    }

    /// First pass: decide on flattening and reject escaping entries before
    /// anything touches the disk.
    fn plan_flatten(&self, format: ArchiveFormat, root: &Path) -> Result<bool> {
        let mut names = Vec::new();
        let mut segments = BTreeSet::new();
        let mut wrapper_is_dir = false;

        let mut reader = format.open(&self.archive)?;
        reader.visit(&mut |entry, _| {
            let name = normalize_entry_name(&entry.path);
            if let Some(segment) = top_level_segment(&name) {
                segments.insert(segment.to_string());
            }
            if !strip_top_level(&name).is_empty()
                || (entry.kind == EntryKind::Directory && !name.is_empty())
            {
                wrapper_is_dir = true;
            }
            names.push((entry.path.clone(), name));
            Ok(())
        })?;

        let flatten = match self.flatten {
            FlattenMode::Never => false,
            FlattenMode::Always => true,
            FlattenMode::AutoIfSingleTopDir => segments.len() == 1 && wrapper_is_dir,
        };
        if self.flatten == FlattenMode::AutoIfSingleTopDir {
            debug!(
                top_level = segments.len(),
                wrapper_is_dir, flatten, "Auto-flatten decision"
            );
        }

        for (original, name) in &names {
            containment(root, flatten, original, name)?;
        }
        Ok(flatten)
    }
}

/// Extracts `archive` into `destination` with the given flatten mode.
///
/// Shorthand for [`ExtractionPlan::extract`].
///
/// # Errors
///
/// See [`ExtractionPlan::extract`].
pub fn extract_archive(
    archive: &Path,
    destination: &Path,
    flatten: FlattenMode,
) -> Result<ExtractionReport> {
    ExtractionPlan::new(archive, destination)
        .flatten(flatten)
        .extract()
}

fn absolute_root(destination: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(destination).map_err(|e| {
        Error::io(
            format!("Failed to resolve destination: {}", destination.display()),
            e,
        )
    })?;
    Ok(lexical_clean(&absolute))
}

fn is_absolute_name(name: &str) -> bool {
    name.starts_with('/') || name.as_bytes().get(1) == Some(&b':')
}

/// Maps a normalised entry name to its target under `root`.
///
/// Returns `Ok(None)` for entries that vanish after flattening.
fn containment(root: &Path, flatten: bool, original: &str, name: &str) -> Result<Option<PathBuf>> {
    if is_absolute_name(name) {
        return Err(Error::path_traversal(original));
    }
    let relative = if flatten { strip_top_level(name) } else { name };
    if relative.is_empty() {
        return Ok(None);
    }
    resolve_within(root, relative)
        .map(Some)
        .ok_or_else(|| Error::path_traversal(original))
}

fn write_entry(
    root: &Path,
    flatten: bool,
    entry: &ArchiveEntry,
    content: &mut dyn Read,
    report: &mut ExtractionReport,
) -> Result<()> {
    let name = normalize_entry_name(&entry.path);
    let Some(target) = containment(root, flatten, &entry.path, &name)? else {
        return Ok(());
    };

    match entry.kind {
        EntryKind::Directory => {
            if target == root {
                return Ok(());
            }
            std::fs::create_dir_all(&target).map_err(|e| {
                Error::io(format!("Failed to create directory: {}", target.display()), e)
            })?;
            let mode = if entry.mode == 0 {
                DEFAULT_DIR_MODE
            } else {
                (entry.mode & 0o777) | 0o700
            };
            set_mode(&target, mode)?;
            report.directories.push(target);
        }
        EntryKind::File => {
            if target == root {
                return Err(Error::path_traversal(&entry.path));
            }
            let mode = if entry.mode == 0 {
                DEFAULT_FILE_MODE
            } else {
                entry.mode & 0o777
            };
            write_file(&target, mode, content)?;
            report.files.push(target);
        }
        EntryKind::Other => {
            debug!(entry = %entry.path, "Skipping unsupported entry type");
            report.skipped += 1;
        }
    }
    Ok(())
}

fn write_file(target: &Path, mode: u32, content: &mut dyn Read) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::io(format!("Failed to create directory: {}", parent.display()), e))?;
    }

    // Never write through a symlink that already sits at the target, and
    // never replace an existing directory.
    if let Ok(meta) = std::fs::symlink_metadata(target) {
        if meta.is_dir() {
            return Err(Error::io(
                format!("Refusing to overwrite directory: {}", target.display()),
                std::io::Error::from(std::io::ErrorKind::IsADirectory),
            ));
        }
        if !meta.is_file() {
            std::fs::remove_file(target)
                .map_err(|e| Error::io(format!("Failed to replace: {}", target.display()), e))?;
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options
        .open(target)
        .map_err(|e| Error::io(format!("Failed to create file: {}", target.display()), e))?;

    if let Err(e) = std::io::copy(content, &mut file) {
        drop(file);
        let _ = std::fs::remove_file(target);
        return Err(Error::io(format!("Failed to extract: {}", target.display()), e));
    }
    drop(file);

    set_mode(target, mode)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| Error::io(format!("Failed to set permissions: {}", path.display()), e))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
