//! Document file-format versions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// File-format version as `major * 10000 + minor * 100 + patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileVersion(pub u32);

impl FileVersion {
    /// Version written by this library.
    pub const CURRENT: FileVersion = FileVersion::new(4, 8, 0);
    /// Assumed when neither the document nor the page declares a version.
    pub const DEFAULT_LEGACY: FileVersion = FileVersion::new(4, 1, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        FileVersion(major * 10000 + minor * 100 + patch)
    }

    pub fn major(&self) -> u32 {
        self.0 / 10000
    }

    pub fn minor(&self) -> u32 {
        (self.0 / 100) % 100
    }

    pub fn patch(&self) -> u32 {
        self.0 % 100
    }

    /// Parse a dotted `major[.minor[.patch]]` string. Trailing non-digit
    /// suffixes on a component (`4.4.a`) count as zero. A major number too
    /// large to encode yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('.');
        let major: u32 = parts.next()?.trim().parse().ok()?;
        let mut component = || -> u32 {
            parts
                .next()
                .map(|p| {
                    let digits: String = p.trim().chars().take_while(char::is_ascii_digit).collect();
                    digits.parse().unwrap_or(0)
                })
                .unwrap_or(0)
                .min(99)
        };
        let minor = component();
        let patch = component();
        major
            .checked_mul(10000)
            .and_then(|v| v.checked_add(minor * 100 + patch))
            .map(FileVersion)
    }

    pub fn is_current(&self) -> bool {
        *self == Self::CURRENT
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}
