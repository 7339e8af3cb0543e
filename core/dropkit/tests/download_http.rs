#![warn(clippy::pedantic)]

//! Downloads against a local HTTP server.
//!
//! These tests drive [`ChunkedDownloader`] over real sockets through the
//! default `reqwest` backend, covering the HEAD probe, 206 handling and the
//! cleanup guarantees that the in-memory unit tests cannot see.

mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};

use common::{RangeMode, Route, TestServer, payload};
use dropkit::{ChunkedDownloader, DownloadStrategy, DownloadTask, Error, ProgressEvent};
use tempfile::TempDir;

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Verifies that a range-capable server is fetched in parallel chunks.
///
/// **Expected behavior**: one ranged GET per chunk, bytes identical to the
/// source and only the destination left in the directory.
#[tokio::test]
async fn chunked_download_over_http() {
    let server = TestServer::start();
    let body = payload(100 * 1024 + 17);
    server.route("/tool.bin", Route::bytes(body.clone(), RangeMode::Ranged));

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("tool.bin");
    let task = DownloadTask::new(server.url("/tool.bin"), &dest)
        .chunk_size(16 * 1024)
        .parallelism(3);

    let outcome = ChunkedDownloader::new().unwrap().download(&task).await.unwrap();

    assert_eq!(outcome.strategy, DownloadStrategy::Chunked { chunks: 7 });
    assert_eq!(outcome.bytes, body.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert_eq!(server.range_requests("/tool.bin"), 7);
    assert_eq!(dir_entries(dir.path()), vec!["tool.bin".to_string()]);
}

/// Verifies the single-request fallback when ranges are not advertised.
#[tokio::test]
async fn single_fetch_without_accept_ranges() {
    let server = TestServer::start();
    let body = payload(40 * 1024);
    server.route("/plain.bin", Route::bytes(body.clone(), RangeMode::NoRanges));

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("plain.bin");
    let task = DownloadTask::new(server.url("/plain.bin"), &dest).chunk_size(4096);

    let outcome = ChunkedDownloader::new().unwrap().download(&task).await.unwrap();

    assert_eq!(outcome.strategy, DownloadStrategy::Single);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert_eq!(server.range_requests("/plain.bin"), 0);
}

/// Verifies that a rejected HEAD probe degrades to a single GET.
#[tokio::test]
async fn rejected_head_falls_back_to_single_fetch() {
    let server = TestServer::start();
    let body = payload(5000);
    server.route("/nohead", Route::bytes(body.clone(), RangeMode::RejectsHead));

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("nohead");
    let task = DownloadTask::new(server.url("/nohead"), &dest);

    let outcome = ChunkedDownloader::new().unwrap().download(&task).await.unwrap();

    assert_eq!(outcome.strategy, DownloadStrategy::Single);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

/// Verifies that a server advertising ranges but answering 200 fails the
/// download.
///
/// **Expected behavior**: `ChunkStatus` with status 200, no destination file
/// and no temporary files.
#[tokio::test]
async fn range_answered_with_200_is_an_error() {
    let server = TestServer::start();
    server.route(
        "/liar.bin",
        Route::bytes(payload(64 * 1024), RangeMode::IgnoresRange),
    );

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("liar.bin");
    let task = DownloadTask::new(server.url("/liar.bin"), &dest).chunk_size(8 * 1024);

    let err = ChunkedDownloader::new()
        .unwrap()
        .download(&task)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::ChunkStatus { status: 200, .. }),
        "unexpected error: {err}"
    );
    assert!(!dest.exists());
    assert!(dir_entries(dir.path()).is_empty());
}

/// Verifies that a truncated chunk body fails the download and cleans up.
#[tokio::test]
async fn short_chunk_is_an_error() {
    let server = TestServer::start();
    server.route(
        "/short.bin",
        Route::bytes(payload(32 * 1024), RangeMode::ShortRanges),
    );

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("short.bin");
    let task = DownloadTask::new(server.url("/short.bin"), &dest)
        .chunk_size(8 * 1024)
        .parallelism(2);

    let err = ChunkedDownloader::new()
        .unwrap()
        .download(&task)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::ShortChunk { expected: 8192, actual: 4096, .. }),
        "unexpected error: {err}"
    );
    assert!(!dest.exists());
    assert!(dir_entries(dir.path()).is_empty());
}

/// Verifies that a missing resource surfaces its HTTP status.
#[tokio::test]
async fn missing_resource_reports_status() {
    let server = TestServer::start();

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("missing");
    let task = DownloadTask::new(server.url("/missing"), &dest);

    let err = ChunkedDownloader::new()
        .unwrap()
        .download(&task)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::Status { status: 404, .. }),
        "unexpected error: {err}"
    );
    assert!(!dest.exists());
}

/// Verifies the observer sees start, every byte and completion.
#[tokio::test]
async fn progress_events_over_http() {
    let server = TestServer::start();
    let body = payload(48 * 1024);
    server.route("/p.bin", Route::bytes(body.clone(), RangeMode::Ranged));

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let downloader = ChunkedDownloader::new()
        .unwrap()
        .on_progress(Arc::new(move |event| sink.lock().unwrap().push(event)));

    let dir = TempDir::new().unwrap();
    let task = DownloadTask::new(server.url("/p.bin"), dir.path().join("p.bin"))
        .chunk_size(16 * 1024)
        .parallelism(2);
    downloader.download(&task).await.unwrap();

    let events = events.lock().unwrap();
    let total = body.len() as u64;
    assert!(matches!(
        events.first(),
        Some(ProgressEvent::Started { total: Some(t), chunks: 3, .. }) if *t == total
    ));
    assert_eq!(events.last(), Some(&ProgressEvent::Completed { bytes: total }));

    // Workers report concurrently, so only the maximum is ordered.
    let most = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress { downloaded, .. } => Some(*downloaded),
            _ => None,
        })
        .max();
    assert_eq!(most, Some(total));
}

/// Verifies that a pre-cancelled token stops the download before any bytes
/// are written.
#[tokio::test]
async fn cancelled_before_start() {
    let server = TestServer::start();
    server.route("/c.bin", Route::bytes(payload(1024), RangeMode::Ranged));

    let downloader = ChunkedDownloader::new().unwrap();
    downloader.cancellation_token().cancel();

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("c.bin");
    let err = downloader
        .download(&DownloadTask::new(server.url("/c.bin"), &dest))
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(!dest.exists());
    assert!(dir_entries(dir.path()).is_empty());
}
