//! Archive format detection and per-format entry readers.
//!
//! Each [`ArchiveFormat`] can [`open`](ArchiveFormat::open) a fresh
//! [`EntryReader`] over an archive file. Opening twice is how the extractor
//! gets its two passes over gzip streams, which cannot be rewound.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::{Error, Result};

const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// Supported archive formats, selected by file name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.zip`
    Zip,
    /// `.tar`
    Tar,
    /// `.tar.gz` or `.tgz`
    TarGz,
    /// Any other `.gz`: a single compressed file.
    Gzip,
}

impl ArchiveFormat {
    /// Picks a format from the file name, case-insensitively.
    ///
    /// Returns `None` for anything that is not a supported archive.
    #[must_use]
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".gz") {
            Some(Self::Gzip)
        } else {
            None
        }
    }

    /// Whether the format holds a directory tree that can be flattened.
    #[must_use = "returns the capability without side effects"]
    pub const fn has_tree(self) -> bool {
        !matches!(self, Self::Gzip)
    }

    /// Opens a new reader over `path`. Every call starts from the first entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its header is invalid.
    pub fn open(self, path: &Path) -> Result<Box<dyn EntryReader>> {
        let file = File::open(path)
            .map_err(|e| Error::io(format!("Failed to open archive: {}", path.display()), e))?;
        let input = BufReader::new(file);

        Ok(match self {
            Self::Zip => {
                let archive = zip::ZipArchive::new(input)
                    .map_err(|e| Error::corrupt_archive(path, e))?;
                Box::new(ZipEntries {
                    path: path.to_path_buf(),
                    archive,
                })
            }
            Self::Tar => Box::new(TarEntries {
                path: path.to_path_buf(),
                archive: tar::Archive::new(input),
            }),
            Self::TarGz => Box::new(TarEntries {
                path: path.to_path_buf(),
                archive: tar::Archive::new(GzDecoder::new(input)),
            }),
            Self::Gzip => Box::new(GzipEntry {
                path: path.to_path_buf(),
                name: gzip_output_name(path)?,
                decoder: GzDecoder::new(input),
            }),
        })
    }
}

/// What an archive entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory marker.
    Directory,
    /// A regular file with content.
    File,
    /// Symlink, hard link, device, FIFO or metadata record.
    Other,
}

/// Metadata of one archive entry, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name as stored in the archive.
    pub path: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// Stored permission bits, 0 when the archive records none.
    pub mode: u32,
    /// Uncompressed size in bytes.
    pub size: u64,
}

/// Callback receiving each entry and a reader over its content.
pub type EntryVisitor<'a> = dyn FnMut(&ArchiveEntry, &mut dyn Read) -> Result<()> + 'a;

/// Sequential access to the entries of one opened archive.
pub trait EntryReader {
    /// Calls `visitor` for every entry in archive order. Stops at the first
    /// error returned by the archive or the visitor.
    ///
    /// # Errors
    ///
    /// Returns archive parse errors and anything the visitor returns.
    fn visit(&mut self, visitor: &mut EntryVisitor<'_>) -> Result<()>;
}

struct ZipEntries<R> {
    path: PathBuf,
    archive: zip::ZipArchive<R>,
}

impl<R: Read + std::io::Seek> EntryReader for ZipEntries<R> {
    fn visit(&mut self, visitor: &mut EntryVisitor<'_>) -> Result<()> {
        for i in 0..self.archive.len() {
            let mut file = self
                .archive
                .by_index(i)
                .map_err(|e| Error::corrupt_archive(&self.path, e))?;

            let mode = file.unix_mode().unwrap_or(0);
            let kind = if file.is_dir() {
                EntryKind::Directory
            } else if mode & S_IFMT == S_IFLNK {
                EntryKind::Other
            } else {
                EntryKind::File
            };
            let entry = ArchiveEntry {
                path: file.name().to_string(),
                kind,
                mode: mode & 0o7777,
                size: file.size(),
            };

            visitor(&entry, &mut file)?;
        }
        Ok(())
    }
}

struct TarEntries<R: Read> {
    path: PathBuf,
    archive: tar::Archive<R>,
}

impl<R: Read> EntryReader for TarEntries<R> {
    fn visit(&mut self, visitor: &mut EntryVisitor<'_>) -> Result<()> {
        let entries = self
            .archive
            .entries()
            .map_err(|e| Error::corrupt_archive(&self.path, e))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| Error::corrupt_archive(&self.path, e))?;

            let header = entry.header();
            let entry_type = header.entry_type();
            let kind = if entry_type.is_dir() {
                EntryKind::Directory
            } else if entry_type.is_file() || entry_type.is_contiguous() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            let mode = header.mode().unwrap_or(0) & 0o7777;
            let size = header.size().unwrap_or(0);
            let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

            let meta = ArchiveEntry {
                path,
                kind,
                mode,
                size,
            };
            visitor(&meta, &mut entry)?;
        }
        Ok(())
    }
}

struct GzipEntry<R: Read> {
    path: PathBuf,
    name: String,
    decoder: GzDecoder<R>,
}

impl<R: Read> EntryReader for GzipEntry<R> {
    fn visit(&mut self, visitor: &mut EntryVisitor<'_>) -> Result<()> {
        let entry = ArchiveEntry {
            path: self.name.clone(),
            kind: EntryKind::File,
            mode: 0,
            size: 0,
        };
        visitor(&entry, &mut self.decoder).map_err(|e| match e {
            Error::Io { source, .. }
                if matches!(
                    source.kind(),
                    std::io::ErrorKind::InvalidInput | std::io::ErrorKind::InvalidData
                ) =>
            {
                Error::corrupt_archive(&self.path, source)
            }
            other => other,
        })
    }
}

/// Output name for a bare `.gz` file: the archive name without `.gz`.
fn gzip_output_name(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.get(..name.len().saturating_sub(3)).unwrap_or_default();
    if stem.is_empty() || stem == "." || stem == ".." {
        return Err(Error::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }
    Ok(stem.to_string())
}
