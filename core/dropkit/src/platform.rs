//! Host operating system and `os-arch` platform identifiers.
//!
//! [`Os`] is the coarse OS identity consumed by the path resolver and the
//! installer. [`Platform`] is the `os-arch` pair used to pick release assets,
//! spelled the way release artifacts usually are (`linux-amd64`,
//! `darwin-arm64`, `windows-386`).

use std::fmt;

use crate::error::{Error, Result};

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// Linux and other Unix-likes without special handling.
    Linux,
    /// macOS.
    Macos,
    /// Windows.
    Windows,
}

impl Os {
    /// Returns the OS this binary was compiled for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::Macos
        } else {
            Self::Linux
        }
    }

    /// Returns `true` for Windows, whose paths compare case-insensitively.
    #[must_use = "returns the classification without side effects"]
    pub const fn is_windows(self) -> bool {
        matches!(self, Self::Windows)
    }

    /// Returns the executable file extension (including dot) for this OS.
    #[must_use = "returns the extension without side effects"]
    pub const fn executable_extension(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Linux | Self::Macos => "",
        }
    }
}

/// A release platform: operating system plus CPU architecture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    /// Detects the host platform.
    ///
    /// Rust's target names are mapped to release naming: `macos` becomes
    /// `darwin`, `x86_64` becomes `amd64`, `aarch64` becomes `arm64` and `x86`
    /// becomes `386`.
    #[must_use]
    pub fn detect() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }

    /// Parses an `os-arch` identifier such as `linux-amd64`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] if the text is not two non-empty
    /// dash-separated parts.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim().to_lowercase();
        match text.split_once('-') {
            Some((os, arch)) if !os.is_empty() && !arch.is_empty() && !arch.contains('-') => {
                Ok(Self {
                    os: os.to_string(),
                    arch: arch.to_string(),
                })
            }
            _ => Err(Error::UnsupportedPlatform { platform: text }),
        }
    }

    /// Returns the operating system part (`linux`, `darwin`, `windows`).
    #[must_use = "returns the OS name without side effects"]
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Returns the architecture part (`amd64`, `arm64`, `386`, `arm`).
    #[must_use = "returns the architecture name without side effects"]
    pub fn arch(&self) -> &str {
        &self.arch
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}
