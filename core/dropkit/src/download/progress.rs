//! Progress reporting for downloads.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Progress event emitted during downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The transfer has started.
    Started {
        /// The URL being downloaded.
        url: String,
        /// Total size in bytes, when the server reported one.
        total: Option<u64>,
        /// Number of byte-range chunks (1 for a single fetch).
        chunks: usize,
    },
    /// Bytes were written to disk.
    Progress {
        /// Bytes received so far across all workers.
        downloaded: u64,
        /// Total size in bytes, when known.
        total: Option<u64>,
    },
    /// The destination file is complete.
    Completed {
        /// Final size in bytes.
        bytes: u64,
    },
}

/// Callback type for receiving progress updates.
///
/// Wrapped in `Arc` so that every chunk worker can share it. It may be invoked
/// from several tasks concurrently.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Shared byte counter that forwards updates to an optional callback.
#[derive(Clone)]
pub(crate) struct ProgressTracker {
    downloaded: Arc<AtomicU64>,
    total: Option<u64>,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub(crate) fn new(total: Option<u64>, callback: Option<ProgressCallback>) -> Self {
        Self {
            downloaded: Arc::new(AtomicU64::new(0)),
            total,
            callback,
        }
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }

    pub(crate) fn advance(&self, bytes: u64) {
        let downloaded = self.downloaded.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.emit(ProgressEvent::Progress {
            downloaded,
            total: self.total,
        });
    }

    #[cfg(test)]
    pub(crate) fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }
}
