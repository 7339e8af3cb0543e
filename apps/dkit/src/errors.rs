//! Error types for the dkit CLI.
//!
//! Library failures arrive as [`dropkit::Error`] wrapped in `anyhow` context.
//! [`DkitError`] covers the few conditions that only exist at the command
//! line, and [`exit_code`] maps any error chain to a process exit code.

use thiserror::Error;

/// Exit code for an interrupted run (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// Errors raised by the CLI layer itself.
#[derive(Debug, Error)]
pub enum DkitError {
    /// The user pressed Ctrl-C.
    #[error("interrupted")]
    Interrupted,

    /// Flags were individually valid but do not make sense together.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// Description of what was invalid.
        message: String,
    },
}

impl DkitError {
    /// Creates a new `InvalidArguments` error.
    #[must_use]
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }
}

/// Picks the exit code for an error chain: 130 when anything in the chain
/// is an interruption or a cancelled download, 1 otherwise.
#[must_use]
pub fn exit_code(error: &anyhow::Error) -> i32 {
    let interrupted = error.chain().any(|cause| {
        matches!(cause.downcast_ref::<DkitError>(), Some(DkitError::Interrupted))
            || cause
                .downcast_ref::<dropkit::Error>()
                .is_some_and(dropkit::Error::is_cancelled)
    });
    if interrupted { EXIT_INTERRUPTED } else { 1 }
}
