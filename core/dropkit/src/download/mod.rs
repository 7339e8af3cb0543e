//! Parallel byte-range downloads.
//!
//! [`ChunkedDownloader`] fetches a URL into a local file. When the server
//! advertises `Accept-Ranges: bytes` and a content length, the body is split
//! into [`ByteRangeChunk`]s fetched by a fixed-size worker pool, each chunk
//! streamed into its own temporary file; the chunk files are then concatenated
//! in index order. Otherwise the body is streamed with a single request.
//!
//! ## Guarantees
//!
//! - The destination is written through a staging file in the same directory
//!   and renamed into place only on success, so it never holds partial data.
//! - Chunk files live in a scratch directory next to the destination that is
//!   removed on success, failure, timeout and cancellation.
//! - Merge order is chunk index order, independent of completion order.
//! - At most `parallelism` chunk requests are in flight.
//! - The first chunk failure fails the download and stops the other workers.
//!   There is no retry at this layer.
//!
//! ## Module Structure
//!
//! - [`chunk`] - Range planning
//! - [`source`] - [`ChunkSource`] trait and the HTTP implementation
//! - [`progress`] - [`ProgressEvent`] and the observer callback

pub mod chunk;
pub mod progress;
pub mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use chunk::{ByteRangeChunk, plan_chunks};
pub use progress::{ProgressCallback, ProgressEvent};
pub use source::{ChunkSource, HttpSource, RangeSupport, http_client};

use crate::config::{Config, DEFAULT_CHUNK_SIZE, DEFAULT_PARALLELISM};
use crate::error::{Error, Result};
use progress::ProgressTracker;

/// Configuration for one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Source URL.
    pub url: String,
    /// Final file path.
    pub destination: PathBuf,
    /// Size of each byte-range chunk.
    pub chunk_size: u64,
    /// Maximum number of chunks fetched concurrently.
    pub parallelism: usize,
    /// Deadline for the whole transfer.
    pub timeout: Option<Duration>,
}

impl DownloadTask {
    /// Creates a task with default chunk size (1 MiB), parallelism (4) and no
    /// timeout.
    #[must_use]
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallelism: DEFAULT_PARALLELISM,
            timeout: None,
        }
    }

    /// Creates a task whose tunables come from `config`.
    #[must_use]
    pub fn from_config(
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        config: &Config,
    ) -> Self {
        Self::new(url, destination)
            .chunk_size(config.chunk_size)
            .parallelism(config.parallelism)
            .timeout(config.timeout())
    }

    /// Sets the chunk size. Zero is treated as one byte.
    #[must_use]
    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    /// Sets the worker pool size. Zero is treated as one worker.
    #[must_use]
    pub fn parallelism(mut self, workers: usize) -> Self {
        self.parallelism = workers.max(1);
        self
    }

    /// Sets the deadline for the whole transfer.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// How a download was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStrategy {
    /// Parallel byte-range requests.
    Chunked {
        /// Number of chunks fetched.
        chunks: usize,
    },
    /// One streamed request for the whole body.
    Single,
}

/// Result of a successful download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Path taken.
    pub strategy: DownloadStrategy,
    /// Size of the destination file.
    pub bytes: u64,
}

/// Downloads URLs into files, in parallel chunks when the server allows it.
pub struct ChunkedDownloader<S = HttpSource> {
    source: Arc<S>,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl ChunkedDownloader<HttpSource> {
    /// Creates a downloader over HTTP with the default client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Ok(Self::with_source(HttpSource::new()?))
    }
}

impl<S: ChunkSource + 'static> ChunkedDownloader<S> {
    /// Creates a downloader over an arbitrary [`ChunkSource`].
    #[must_use]
    pub fn with_source(source: S) -> Self {
        Self {
            source: Arc::new(source),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Registers a progress observer.
    #[must_use]
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Uses `token` to cancel downloads started by this downloader.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the token that cancels downloads started by this downloader.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Downloads `task.url` into `task.destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe or any request fails, a chunk response is
    /// not 206 Partial Content, a chunk body has the wrong length, a
    /// temporary or destination file cannot be written, the timeout elapses,
    /// or the download is cancelled. In every case no destination file is
    /// created and no temporary files remain.
    pub async fn download(&self, task: &DownloadTask) -> Result<DownloadOutcome> {
        let parent = destination_dir(&task.destination);
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| Error::io(format!("Failed to create directory: {}", parent.display()), e))?;

        let token = self.cancel.child_token();
        let deadline = task.timeout.map(|after| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                token.cancel();
            })
        });

        let result = self.run(task, &parent, &token).await;

        if let Some(timer) = deadline {
            timer.abort();
        }

        match (result, task.timeout) {
            (Err(e), Some(after)) if e.is_cancelled() && !self.cancel.is_cancelled() => {
                warn!(url = %task.url, ?after, "Download timed out");
                Err(Error::Timeout {
                    url: task.url.clone(),
                    after,
                })
            }
            (result, _) => result,
        }
    }

    async fn run(
        &self,
        task: &DownloadTask,
        parent: &Path,
        token: &CancellationToken,
    ) -> Result<DownloadOutcome> {
        let support = tokio::select! {
            biased;
            () = token.cancelled() => return Err(Error::cancelled(&task.url)),
            probe = self.source.probe(&task.url) => probe?,
        };

        match support.content_length {
            Some(length) if support.accepts_ranges && length > 0 => {
                self.fetch_chunked(task, parent, length, token).await
            }
            _ => {
                debug!(url = %task.url, ?support, "Range requests unavailable, using single fetch");
                self.fetch_single(task, parent, support.content_length, token)
                    .await
            }
        }
    }

    async fn fetch_single(
        &self,
        task: &DownloadTask,
        parent: &Path,
        total: Option<u64>,
        token: &CancellationToken,
    ) -> Result<DownloadOutcome> {
        let tracker = ProgressTracker::new(total, self.progress.clone());
        tracker.emit(ProgressEvent::Started {
            url: task.url.clone(),
            total,
            chunks: 1,
        });

        let staging = staging_file(parent)?;
        let mut out = reopen_async(&staging)?;
        let on_bytes = |n: u64| tracker.advance(n);

        let bytes = tokio::select! {
            biased;
            () = token.cancelled() => return Err(Error::cancelled(&task.url)),
            fetched = self.source.fetch_all(&task.url, &mut out, &on_bytes) => fetched?,
        };

        out.sync_all()
            .await
            .map_err(|e| Error::io(format!("Failed to sync {}", staging.path().display()), e))?;
        drop(out);
        persist(staging, &task.destination)?;

        info!(url = %task.url, bytes, "Downloaded with a single request");
        tracker.emit(ProgressEvent::Completed { bytes });
        Ok(DownloadOutcome {
            strategy: DownloadStrategy::Single,
            bytes,
        })
    }

    async fn fetch_chunked(
        &self,
        task: &DownloadTask,
        parent: &Path,
        length: u64,
        token: &CancellationToken,
    ) -> Result<DownloadOutcome> {
        let chunks: Arc<[ByteRangeChunk]> = plan_chunks(length, task.chunk_size).into();
        let workers = task.parallelism.clamp(1, chunks.len());

        let scratch = tempfile::Builder::new()
            .prefix(".dkit-chunks-")
            .tempdir_in(parent)
            .map_err(|e| {
                Error::io(format!("Failed to create chunk directory in {}", parent.display()), e)
            })?;

        let tracker = ProgressTracker::new(Some(length), self.progress.clone());
        tracker.emit(ProgressEvent::Started {
            url: task.url.clone(),
            total: Some(length),
            chunks: chunks.len(),
        });
        info!(url = %task.url, length, chunks = chunks.len(), workers, "Starting chunked download");

        // Cancelled on the first chunk failure; also fires when `token` does.
        let abort = token.child_token();
        let next = Arc::new(AtomicUsize::new(0));
        let (results_tx, mut results_rx) = mpsc::unbounded_channel();
        let mut pool = JoinSet::new();

        for _ in 0..workers {
            let worker = ChunkWorker {
                source: Arc::clone(&self.source),
                url: task.url.clone(),
                chunks: Arc::clone(&chunks),
                next: Arc::clone(&next),
                dir: scratch.path().to_path_buf(),
                tracker: tracker.clone(),
                abort: abort.clone(),
                results: results_tx.clone(),
            };
            pool.spawn(worker.run());
        }
        drop(results_tx);

        let mut parts: Vec<Option<PathBuf>> = vec![None; chunks.len()];
        let mut first_error: Option<Error> = None;

        while let Some(ChunkResult { index, outcome }) = results_rx.recv().await {
            match outcome {
                Ok(path) => {
                    debug!(index, "Chunk complete");
                    parts[index] = Some(path);
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    if first_error.is_none() {
                        warn!(index, error = %e, "Chunk failed, stopping remaining workers");
                        abort.cancel();
                        first_error = Some(e);
                    }
                }
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined
                && first_error.is_none()
            {
                abort.cancel();
                first_error = Some(Error::Worker {
                    message: e.to_string(),
                });
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if token.is_cancelled() {
            return Err(Error::cancelled(&task.url));
        }

        let bytes = tokio::select! {
            biased;
            () = token.cancelled() => return Err(Error::cancelled(&task.url)),
            merged = merge_chunks(&parts, parent, &task.destination) => merged?,
        };

        scratch
            .close()
            .map_err(|e| Error::io("Failed to remove chunk directory", e))?;

        info!(url = %task.url, bytes, "Downloaded in chunks");
        tracker.emit(ProgressEvent::Completed { bytes });
        Ok(DownloadOutcome {
            strategy: DownloadStrategy::Chunked {
                chunks: chunks.len(),
            },
            bytes,
        })
    }
}

/// Outcome of one chunk, tagged with the chunk index.
struct ChunkResult {
    index: usize,
    outcome: Result<PathBuf>,
}

/// One member of the fixed-size pool. Pulls chunk indices from a shared
/// counter until the plan is exhausted or the pool is aborted.
struct ChunkWorker<S> {
    source: Arc<S>,
    url: String,
    chunks: Arc<[ByteRangeChunk]>,
    next: Arc<AtomicUsize>,
    dir: PathBuf,
    tracker: ProgressTracker,
    abort: CancellationToken,
    results: mpsc::UnboundedSender<ChunkResult>,
}

impl<S: ChunkSource> ChunkWorker<S> {
    async fn run(self) {
        while !self.abort.is_cancelled() {
            let Some(chunk) = self.chunks.get(self.next.fetch_add(1, Ordering::Relaxed)).copied()
            else {
                break;
            };

            let outcome = tokio::select! {
                biased;
                () = self.abort.cancelled() => Err(Error::cancelled(&self.url)),
                fetched = self.fetch(chunk) => fetched,
            };

            let failed = outcome.is_err();
            let delivered = self
                .results
                .send(ChunkResult {
                    index: chunk.index,
                    outcome,
                })
                .is_ok();
            if failed || !delivered {
                break;
            }
        }
    }

    async fn fetch(&self, chunk: ByteRangeChunk) -> Result<PathBuf> {
        let path = self.dir.join(format!("chunk-{:06}", chunk.index));
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| Error::chunk_io(chunk.index, &path, e))?;

        let tracker = &self.tracker;
        let on_bytes = |n: u64| tracker.advance(n);
        let written = self
            .source
            .fetch_range(&self.url, chunk, &mut file, &on_bytes)
            .await
            .map_err(|e| match e {
                Error::Io { source, .. } => Error::chunk_io(chunk.index, &path, source),
                other => other,
            })?;

        if written != chunk.len() {
            return Err(Error::ShortChunk {
                index: chunk.index,
                expected: chunk.len(),
                actual: written,
            });
        }

        Ok(path)
    }
}

/// Concatenates chunk files in index order into a staging file, then renames
/// it to `destination`.
async fn merge_chunks(parts: &[Option<PathBuf>], parent: &Path, destination: &Path) -> Result<u64> {
    let staging = staging_file(parent)?;
    let mut out = reopen_async(&staging)?;
    let mut total = 0;

    for (index, part) in parts.iter().enumerate() {
        let path = part.as_ref().ok_or_else(|| Error::Worker {
            message: format!("chunk {index} finished without data"),
        })?;
        let mut input = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::chunk_io(index, path, e))?;
        total += tokio::io::copy(&mut input, &mut out)
            .await
            .map_err(|e| Error::chunk_io(index, path, e))?;
    }

    out.flush()
        .await
        .map_err(|e| Error::io(format!("Failed to flush {}", staging.path().display()), e))?;
    out.sync_all()
        .await
        .map_err(|e| Error::io(format!("Failed to sync {}", staging.path().display()), e))?;
    drop(out);

    persist(staging, destination)?;
    Ok(total)
}

fn destination_dir(destination: &Path) -> PathBuf {
    destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

fn staging_file(dir: &Path) -> Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(".dkit-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|e| Error::io(format!("Failed to create staging file in {}", dir.display()), e))
}

fn reopen_async(staging: &NamedTempFile) -> Result<tokio::fs::File> {
    let file = staging
        .as_file()
        .try_clone()
        .map_err(|e| Error::io(format!("Failed to open {}", staging.path().display()), e))?;
    Ok(tokio::fs::File::from_std(file))
}

fn persist(staging: NamedTempFile, destination: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(staging.path(), std::fs::Permissions::from_mode(0o644))
            .map_err(|e| {
                Error::io(format!("Failed to set permissions: {}", staging.path().display()), e)
            })?;
    }

    staging.persist(destination).map_err(|e| {
        Error::io(
            format!("Failed to move download into place: {}", destination.display()),
            e.error,
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::source::{ByteSink, OnBytes};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::io::AsyncWriteExt;

    /// In-memory source with per-chunk delays and fault injection.
    struct MemorySource {
        data: Vec<u8>,
        ranges: bool,
        delay: fn(usize) -> Duration,
        fail_chunk: Option<usize>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        completed: Mutex<Vec<usize>>,
    }

    impl MemorySource {
        fn new(data: Vec<u8>) -> Self {
            Self {
                data,
                ranges: true,
                delay: |_| Duration::ZERO,
                fail_chunk: None,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                completed: Mutex::new(Vec::new()),
            }
        }
    }

    async fn write_in_pieces(bytes: &[u8], sink: &mut ByteSink<'_>, on_bytes: &OnBytes<'_>) -> u64 {
        for piece in bytes.chunks(7) {
            sink.write_all(piece).await.unwrap();
            on_bytes(piece.len() as u64);
        }
        sink.flush().await.unwrap();
        bytes.len() as u64
    }

    #[async_trait]
    impl ChunkSource for MemorySource {
        async fn probe(&self, _url: &str) -> Result<RangeSupport> {
            Ok(RangeSupport {
                accepts_ranges: self.ranges,
                content_length: Some(self.data.len() as u64),
            })
        }

        async fn fetch_range(
            &self,
            url: &str,
            chunk: ByteRangeChunk,
            sink: &mut ByteSink<'_>,
            on_bytes: &OnBytes<'_>,
        ) -> Result<u64> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep((self.delay)(chunk.index)).await;

            if self.fail_chunk == Some(chunk.index) {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::ChunkStatus {
                    url: url.to_string(),
                    index: chunk.index,
                    status: 500,
                });
            }

            let start = usize::try_from(chunk.start).unwrap();
            let end = usize::try_from(chunk.end).unwrap();
            let written = write_in_pieces(&self.data[start..=end], sink, on_bytes).await;

            self.completed.lock().unwrap().push(chunk.index);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(written)
        }

        async fn fetch_all(
            &self,
            _url: &str,
            sink: &mut ByteSink<'_>,
            on_bytes: &OnBytes<'_>,
        ) -> Result<u64> {
            tokio::time::sleep((self.delay)(0)).await;
            Ok(write_in_pieces(&self.data, sink, on_bytes).await)
        }
    }

    fn sample_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| u8::try_from((i * 31 + i / 7) % 251).unwrap()).collect()
    }

    fn dir_is_empty_except(dir: &Path, keep: &str) -> bool {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(std::result::Result::ok)
            .all(|entry| entry.file_name() == keep)
    }

    #[tokio::test]
    async fn merge_follows_index_order_when_workers_finish_in_reverse() {
        let data = sample_bytes(10 * 64);
        let mut source = MemorySource::new(data.clone());
        // Later chunks finish first.
        source.delay = |index| Duration::from_millis(20 * (10 - index as u64));

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let downloader = ChunkedDownloader::with_source(source);
        let task = DownloadTask::new("mem://file", &dest)
            .chunk_size(64)
            .parallelism(10);

        let outcome = downloader.download(&task).await.unwrap();

        assert_eq!(outcome.strategy, DownloadStrategy::Chunked { chunks: 10 });
        assert_eq!(outcome.bytes, data.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), data);

        let completed = downloader.source.completed.lock().unwrap().clone();
        let mut sorted = completed.clone();
        sorted.sort_unstable();
        assert_ne!(completed, sorted, "workers should have completed out of order");
        assert!(dir_is_empty_except(dir.path(), "out.bin"));
    }

    #[tokio::test]
    async fn pool_never_exceeds_parallelism() {
        let data = sample_bytes(12 * 16);
        let mut source = MemorySource::new(data.clone());
        source.delay = |_| Duration::from_millis(5);

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pool.bin");
        let downloader = ChunkedDownloader::with_source(source);
        let task = DownloadTask::new("mem://pool", &dest)
            .chunk_size(16)
            .parallelism(3);

        downloader.download(&task).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), data);
        let peak = downloader.source.peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak concurrency was {peak}");
    }

    #[tokio::test]
    async fn falls_back_to_single_fetch_without_range_support() {
        let data = sample_bytes(300);
        let mut source = MemorySource::new(data.clone());
        source.ranges = false;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("single.bin");
        let downloader = ChunkedDownloader::with_source(source);

        let outcome = downloader
            .download(&DownloadTask::new("mem://single", &dest).chunk_size(16))
            .await
            .unwrap();

        assert_eq!(outcome.strategy, DownloadStrategy::Single);
        assert_eq!(std::fs::read(&dest).unwrap(), data);
    }

    #[tokio::test]
    async fn empty_resource_uses_single_fetch() {
        let source = MemorySource::new(Vec::new());
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty.bin");

        let outcome = ChunkedDownloader::with_source(source)
            .download(&DownloadTask::new("mem://empty", &dest))
            .await
            .unwrap();

        assert_eq!(outcome.strategy, DownloadStrategy::Single);
        assert_eq!(outcome.bytes, 0);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn failing_chunk_fails_download_and_cleans_up() {
        let mut source = MemorySource::new(sample_bytes(8 * 32));
        source.fail_chunk = Some(2);

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("broken.bin");
        let err = ChunkedDownloader::with_source(source)
            .download(&DownloadTask::new("mem://broken", &dest).chunk_size(32))
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::ChunkStatus { index: 2, status: 500, .. }),
            "unexpected error: {err}"
        );
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn cancellation_stops_workers_and_removes_temp_files() {
        let mut source = MemorySource::new(sample_bytes(4 * 32));
        source.delay = |_| Duration::from_secs(30);

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cancelled.bin");
        let downloader = ChunkedDownloader::with_source(source);
        let token = downloader.cancellation_token();
        let task = DownloadTask::new("mem://slow", &dest).chunk_size(32);

        let cancel_soon = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        };
        let (result, ()) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(downloader.download(&task), cancel_soon)
        })
        .await
        .expect("cancellation should stop the download promptly");

        assert!(result.unwrap_err().is_cancelled());
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn timeout_is_reported_and_cleans_up() {
        let mut source = MemorySource::new(sample_bytes(2 * 32));
        source.delay = |_| Duration::from_secs(30);

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("slow.bin");
        let task = DownloadTask::new("mem://slow", &dest)
            .chunk_size(32)
            .timeout(Duration::from_millis(50));

        let err = ChunkedDownloader::with_source(source)
            .download(&task)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }), "unexpected error: {err}");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn progress_observer_sees_every_byte() {
        let data = sample_bytes(5 * 40 + 3);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("progress.bin");
        ChunkedDownloader::with_source(MemorySource::new(data.clone()))
            .on_progress(Arc::new(move |event: ProgressEvent| sink.lock().unwrap().push(event)))
            .download(&DownloadTask::new("mem://progress", &dest).chunk_size(40))
            .await
            .unwrap();

        let events = events.lock().unwrap();
        let total = Some(data.len() as u64);
        assert_eq!(
            events.first(),
            Some(&ProgressEvent::Started {
                url: "mem://progress".to_string(),
                total,
                chunks: 6,
            })
        );
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::Completed {
                bytes: data.len() as u64
            })
        );
        let max_downloaded = events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Progress { downloaded, .. } => Some(*downloaded),
                _ => None,
            })
            .max();
        assert_eq!(max_downloaded, total);
    }

    #[test]
    fn task_builder_clamps_zero_values() {
        let task = DownloadTask::new("u", "d").chunk_size(0).parallelism(0);
        assert_eq!(task.chunk_size, 1);
        assert_eq!(task.parallelism, 1);
    }

    #[test]
    fn task_from_config_copies_tunables() {
        let config = Config {
            chunk_size: 2048,
            parallelism: 7,
            timeout_secs: 9,
            ..Config::default()
        };
        let task = DownloadTask::from_config("u", "d", &config);
        assert_eq!(task.chunk_size, 2048);
        assert_eq!(task.parallelism, 7);
        assert_eq!(task.timeout, Some(Duration::from_secs(9)));
    }

    #[test]
    fn destination_dir_defaults_to_current_directory() {
        assert_eq!(destination_dir(Path::new("file.bin")), PathBuf::from("."));
        assert_eq!(destination_dir(Path::new("a/file.bin")), PathBuf::from("a"));
    }
}
