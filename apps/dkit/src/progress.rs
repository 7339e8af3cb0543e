//! Terminal progress display for downloads.
//!
//! Turns [`ProgressEvent`]s into a single `\r`-rewritten status line,
//! throttled so that parallel chunk workers do not flood the terminal.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use dropkit::{ProgressCallback, ProgressEvent};

/// Minimum interval between progress updates in milliseconds.
const CLI_PROGRESS_INTERVAL_MS: u128 = 250;

struct LineState {
    start: Instant,
    last_update: Option<Instant>,
    total: Option<u64>,
}

/// Builds a progress callback that prints to stdout.
#[must_use]
pub fn terminal_progress() -> ProgressCallback {
    let state = Mutex::new(LineState {
        start: Instant::now(),
        last_update: None,
        total: None,
    });

    Arc::new(move |event| {
        let Ok(mut state) = state.lock() else {
            return;
        };
        match event {
            ProgressEvent::Started { total, chunks, .. } => {
                state.start = Instant::now();
                state.total = total;
                if chunks > 1 {
                    println!("Fetching in {chunks} parallel chunks");
                }
            }
            ProgressEvent::Progress { downloaded, .. } => {
                let now = Instant::now();
                let due = state
                    .last_update
                    .is_none_or(|last| now.duration_since(last).as_millis() >= CLI_PROGRESS_INTERVAL_MS);
                if due {
                    print_progress(
                        downloaded,
                        state.total,
                        state.start.elapsed().as_secs_f64(),
                    );
                    state.last_update = Some(now);
                }
            }
            ProgressEvent::Completed { bytes } => {
                print_progress(bytes, state.total, state.start.elapsed().as_secs_f64());
                println!();
            }
        }
    })
}

/// Prints a simple text-based progress line.
fn print_progress(downloaded: u64, total: Option<u64>, elapsed_secs: f64) {
    print!("\r{}     ", progress_line(downloaded, total, elapsed_secs));
    let _ = std::io::stdout().flush();
}

#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn progress_line(downloaded: u64, total: Option<u64>, elapsed_secs: f64) -> String {
    let speed = if elapsed_secs > 0.0 {
        downloaded as f64 / elapsed_secs
    } else {
        0.0
    };
    let speed_str = format_speed(speed);
    let downloaded_str = format_bytes(downloaded);

    match total {
        Some(total) if total > 0 => {
            let percent = (downloaded as f64 / total as f64 * 100.0).min(100.0) as u8;
            format!(
                "{downloaded_str}/{} ({percent}%) {speed_str}",
                format_bytes(total)
            )
        }
        _ => format!("{downloaded_str} {speed_str}"),
    }
}

/// Formats bytes into a human-readable string (KB, MB, GB).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Formats speed (bytes/sec) into a human-readable string.
fn format_speed(speed: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    if speed >= MB {
        format!("{:.2} MB/s", speed / MB)
    } else if speed >= KB {
        format!("{:.2} KB/s", speed / KB)
    } else {
        format!("{speed:.0} B/s")
    }
}
