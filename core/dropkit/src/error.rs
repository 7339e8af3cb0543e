//! Error types for the dropkit library.
//!
//! Every fallible operation in the crate returns [`Result`], whose error side is
//! the consolidated [`Error`] enum. Variants carry enough context (URL, path,
//! chunk index, entry name) to diagnose a failure without re-running it.
//!
//! Variants fall into a handful of families:
//!
//! - transport: [`Error::Http`], [`Error::Status`], [`Error::ChunkStatus`],
//!   [`Error::ShortChunk`], [`Error::Timeout`], [`Error::Cancelled`]
//! - format: [`Error::UnsupportedFormat`], [`Error::CorruptArchive`],
//!   [`Error::Decode`]
//! - security: [`Error::PathTraversal`]
//! - resource: [`Error::Io`], [`Error::ChunkIo`], [`Error::NoWritableDirectory`]
//! - verification and input: the remaining variants

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Consolidated error type for dropkit operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP client failed to send a request or read a response body.
    #[error("request to {url} failed")]
    Http {
        /// The URL being fetched.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a status the operation cannot accept.
    #[error("unexpected HTTP status {status} from {url}")]
    Status {
        /// The URL being fetched.
        url: String,
        /// The numeric status code.
        status: u16,
    },

    /// A byte-range request was not answered with 206 Partial Content.
    #[error("chunk {index} of {url}: expected 206 Partial Content, got {status}")]
    ChunkStatus {
        /// The URL being fetched.
        url: String,
        /// Index of the failing chunk.
        index: usize,
        /// The numeric status code.
        status: u16,
    },

    /// A chunk body ended before (or after) the requested range was filled.
    #[error("chunk {index}: expected {expected} bytes, received {actual}")]
    ShortChunk {
        /// Index of the failing chunk.
        index: usize,
        /// Length of the requested range.
        expected: u64,
        /// Bytes actually received.
        actual: u64,
    },

    /// A temporary chunk file could not be created, written or read.
    #[error("chunk {index}: I/O error on {}", .path.display())]
    ChunkIo {
        /// Index of the failing chunk.
        index: usize,
        /// The temporary file involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The download did not finish within the configured timeout.
    #[error("download of {url} timed out after {}s", .after.as_secs())]
    Timeout {
        /// The URL being fetched.
        url: String,
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The download was cancelled by the caller.
    #[error("download of {url} was cancelled")]
    Cancelled {
        /// The URL being fetched.
        url: String,
    },

    /// A background worker panicked or was aborted unexpectedly.
    #[error("download worker failed: {message}")]
    Worker {
        /// Description of the failure.
        message: String,
    },

    /// The file name does not map to a supported archive format.
    #[error("unsupported archive format: {}", .path.display())]
    UnsupportedFormat {
        /// The archive path.
        path: PathBuf,
    },

    /// The archive could not be parsed.
    #[error("corrupt archive {}: {message}", .path.display())]
    CorruptArchive {
        /// The archive path.
        path: PathBuf,
        /// What went wrong while reading it.
        message: String,
    },

    /// An archive entry would be written outside the destination root.
    #[error("archive entry escapes destination: {entry}")]
    PathTraversal {
        /// The entry name as stored in the archive.
        entry: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No candidate installation directory accepted a write probe.
    #[error("no writable installation directory found ({searched} candidates checked)")]
    NoWritableDirectory {
        /// Number of directories that were probed.
        searched: usize,
    },

    /// A file's digest did not match the expected value.
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        /// The verified file.
        path: PathBuf,
        /// The expected digest.
        expected: String,
        /// The computed digest.
        actual: String,
    },

    /// The signature text is of a kind this crate cannot verify.
    #[error("unsupported signature type: {kind}")]
    UnsupportedSignature {
        /// The detected kind.
        kind: String,
    },

    /// A repository reference could not be parsed.
    #[error("invalid repository: {input} (expected owner/repo)")]
    InvalidRepository {
        /// The rejected input.
        input: String,
    },

    /// No release asset matched the platform keywords.
    #[error("no asset found for platform: {platform}")]
    NoMatchingAsset {
        /// The platform identifier.
        platform: String,
    },

    /// A release asset name is not a plain file name.
    #[error("invalid asset name: {name}")]
    InvalidAssetName {
        /// The rejected name.
        name: String,
    },

    /// The platform identifier has no keyword table.
    #[error("unsupported platform: {platform}")]
    UnsupportedPlatform {
        /// The platform identifier.
        platform: String,
    },

    /// A JSON response could not be decoded.
    #[error("failed to decode response from {url}")]
    Decode {
        /// The URL whose body failed to decode.
        url: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A permission string is neither octal nor symbolic.
    #[error("invalid file mode: {value}")]
    InvalidMode {
        /// The rejected input.
        value: String,
    },

    /// Configuration failed to load or validate.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl Error {
    /// Creates a new `Http` error.
    #[must_use]
    pub fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.into(),
            source,
        }
    }

    /// Creates a new `Status` error.
    #[must_use]
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    /// Creates a new `Io` error from an I/O error with context.
    #[must_use]
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Creates a new `ChunkIo` error.
    #[must_use]
    pub fn chunk_io(index: usize, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ChunkIo {
            index,
            path: path.into(),
            source,
        }
    }

    /// Creates a new `Cancelled` error.
    #[must_use]
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates a new `CorruptArchive` error.
    #[must_use]
    pub fn corrupt_archive(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::CorruptArchive {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Creates a new `PathTraversal` error.
    #[must_use]
    pub fn path_traversal(entry: impl Into<String>) -> Self {
        Self::PathTraversal {
            entry: entry.into(),
        }
    }

    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns `true` for errors caused by caller cancellation.
    #[must_use = "returns the classification without side effects"]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
