//! Entry-name handling shared by every archive format.
//!
//! Archive entry names are untrusted input. They are normalised to forward
//! slashes, optionally stripped of their first segment, and finally joined to
//! the destination root and checked lexically to stay beneath it.

use std::path::{Component, Path, PathBuf};

/// Normalises an entry name: backslashes become `/` and leading `./`
/// segments are dropped. Everything else (`..`, leading `/`) is preserved so
/// that the containment check can judge it.
#[must_use]
pub fn normalize_entry_name(name: &str) -> String {
    let mut normalized = name.replace('\\', "/");
    loop {
        if let Some(rest) = normalized.strip_prefix("./") {
            normalized = rest.to_string();
        } else if normalized == "." {
            normalized.clear();
        } else {
            return normalized;
        }
    }
}

/// Returns the first non-empty slash-delimited segment of a normalised name.
#[must_use]
pub fn top_level_segment(name: &str) -> Option<&str> {
    name.split('/').find(|segment| !segment.is_empty())
}

/// Removes the first segment of a normalised name, along with any slashes
/// that separated it from the rest.
///
/// Returns an empty string for the bare top-level marker (`app` or `app/`).
#[must_use]
pub fn strip_top_level(name: &str) -> &str {
    let trimmed = name.trim_start_matches('/');
    trimmed
        .split_once('/')
        .map_or("", |(_, rest)| rest.trim_start_matches('/'))
}

/// Resolves `.` and `..` components without touching the filesystem.
///
/// A `..` at the root of an absolute path is dropped; leading `..` of a
/// relative path are kept.
#[must_use]
pub fn lexical_clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other.as_os_str()),
        }
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

/// Joins `relative` onto the cleaned `root` and returns the result only if it
/// stays within `root`.
///
/// The returned path may equal `root` itself (for names such as `a/..`);
/// callers decide what that means for the entry kind.
#[must_use]
pub fn resolve_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let candidate = lexical_clean(&root.join(relative));
    candidate.starts_with(root).then_some(candidate)
}
