//! Device class a play came from.
//!
//! Export files carry free-form platform strings such as
//! `"Android OS 9 API 28 (samsung, SM-G960F)"` or `"OS X 10.15.7 [x86 8]"`.
//! Only the leading token is meaningful for grouping, so the raw value is
//! reduced to a small set of known classes with a free-text fallback.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source device class of a play event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Android,
    Ios,
    Windows,
    MacOs,
    Linux,
    Web,
    /// A platform token that is not one of the known classes (lowercased).
    Other(String),
    /// The record carried no platform at all.
    Unknown,
}

impl Platform {
    /// Classify a raw platform string by its first whitespace-separated token.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        let Some(token) = raw.split_whitespace().next() else {
            return Self::Unknown;
        };
        let token = token.to_ascii_lowercase();
        match token.as_str() {
            "android" => Self::Android,
            "ios" | "iphone" | "ipad" => Self::Ios,
            "windows" => Self::Windows,
            "os" | "osx" | "macos" | "mac" => Self::MacOs,
            "linux" => Self::Linux,
            "web" | "web_player" | "webplayer" => Self::Web,
            "unknown" => Self::Unknown,
            _ => Self::Other(token),
        }
    }

    /// Stable lowercase label used in output and exports.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Web => "web",
            Self::Other(token) => token,
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Platform {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "unknown" | "" => Self::Unknown,
            other => Self::from_raw(other),
        })
    }
}
