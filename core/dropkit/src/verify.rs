//! Checksum verification for downloaded files.
//!
//! A "signature" here is whatever text a release publishes next to an
//! artifact: a bare hex digest, a `sha256sum`-style line, a multi-line
//! checksum file, or an armored PGP signature. Only SHA-256 digests are
//! verified; other kinds are detected and reported as unsupported.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// What kind of signature text was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    /// 64 hex characters.
    Sha256,
    /// 128 hex characters.
    Sha512,
    /// An armored PGP block.
    Gpg,
    /// Anything else.
    Unknown,
}

impl SignatureKind {
    /// Classifies signature text by its first whitespace-separated field.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        let text = text.trim();
        if text.contains("-----BEGIN PGP") {
            return Self::Gpg;
        }
        match text.split_whitespace().next().map_or(0, str::len) {
            64 => Self::Sha256,
            128 => Self::Sha512,
            _ => Self::Unknown,
        }
    }

    /// Lowercase name used in messages.
    #[must_use = "returns the name without side effects"]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Gpg => "gpg",
            Self::Unknown => "unknown",
        }
    }
}

/// Picks the expected digest for `file_name` out of checksum text.
///
/// Lines look like `<digest>  <name>` or `<digest> *<name>`. The line naming
/// `file_name` wins; otherwise the first field of the first non-empty line
/// is used. Returns `None` for blank text.
#[must_use]
pub fn expected_digest<'a>(text: &'a str, file_name: &str) -> Option<&'a str> {
    let mut first = None;
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let Some(digest) = fields.next() else {
            continue;
        };
        if first.is_none() {
            first = Some(digest);
        }

        let named = fields
            .next()
            .map(|name| name.trim_start_matches('*'))
            .and_then(|name| name.rsplit(['/', '\\']).next());
        if named == Some(file_name) {
            return Some(digest);
        }
    }
    first
}

/// Computes the SHA-256 hash of a file as lowercase hex.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn compute_sha256(file_path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(file_path).map_err(|e| {
        Error::io(
            format!("Failed to open file for checksum: {}", file_path.display()),
            e,
        )
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| {
            Error::io(
                format!("Failed to read file for checksum: {}", file_path.display()),
                e,
            )
        })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verifies `file_path` against signature text.
///
/// Returns the computed digest on success.
///
/// # Errors
///
/// Returns an error if:
/// - The signature is not a SHA-256 digest ([`Error::UnsupportedSignature`])
/// - The file cannot be read
/// - The digests differ ([`Error::ChecksumMismatch`])
pub fn verify_with_str(file_path: &Path, signature: &str) -> Result<String> {
    let kind = SignatureKind::detect(signature);
    if kind != SignatureKind::Sha256 {
        return Err(Error::UnsupportedSignature {
            kind: kind.as_str().to_string(),
        });
    }

    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let expected = expected_digest(signature, &file_name).unwrap_or_default();
    let actual = compute_sha256(file_path)?;

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::ChecksumMismatch {
            path: file_path.to_path_buf(),
            expected: expected.to_lowercase(),
            actual,
        });
    }

    info!(file = %file_path.display(), sha256 = %actual, "Checksum verified");
    Ok(actual)
}

/// Downloads signature text from `url` and verifies `file_path` against it.
///
/// # Errors
///
/// Returns transport errors for the signature download, then anything
/// [`verify_with_str`] returns.
pub async fn verify_with_url(
    client: &reqwest::Client,
    file_path: &Path,
    url: &str,
) -> Result<String> {
    debug!(url, "Fetching signature");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::http(url, e))?;

    if !response.status().is_success() {
        return Err(Error::status(url, response.status().as_u16()));
    }

    let text = response.text().await.map_err(|e| Error::http(url, e))?;
    verify_with_str(file_path, text.trim())
}
