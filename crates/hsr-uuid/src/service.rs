//! Short keys and bag version labels.

use crate::{UuidError, UuidResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Canonical resource identifier (32 lowercase hex characters, no hyphens).
///
/// Once constructed, the contained UUID is guaranteed to render in canonical form, so
/// path derivation and pid comparison are consistent across the workspace.
///
/// # Construction
/// - [`ShortKey::new`] allocates a fresh key for a new resource.
/// - [`ShortKey::parse`] validates an externally supplied pid (CLI argument, URL segment).
///
/// Non-canonical values (uppercase, hyphenated, wrong length, non-hex) are rejected rather
/// than normalised.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortKey(Uuid);

impl Default for ShortKey {
    fn default() -> Self {
        Self::new()
    }
}

impl ShortKey {
    /// Generates a new random (v4) short key.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a key that must already be in canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not 32 lowercase hex characters.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "short key must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("invalid short key '{}': {}", input, e)))
    }

    /// Returns the underlying `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is a canonical short key.
    ///
    /// Purely syntactic: exactly 32 bytes, each `0-9` or `a-f`.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<key>/` where `s1`/`s2` are the first two pairs of hex
    /// characters of this key.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir.join(s1).join(s2).join(&canonical)
    }
}

impl fmt::Display for ShortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ShortKey {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShortKey::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ShortKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ShortKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ShortKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Label of a bag generated from a particular state of a resource.
///
/// Format: `YYYY.MM.DD.HH.mm.ss` (UTC), derived from the resource's last-updated time.
/// Two bags of the same resource with the same label package the same resource state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BagVersion(DateTime<Utc>);

const BAG_VERSION_FORMAT: &str = "%Y.%m.%d.%H.%M.%S";

impl BagVersion {
    /// Builds a version label from a timestamp, truncated to whole seconds.
    pub fn from_timestamp(timestamp: DateTime<Utc>) -> Self {
        let seconds = timestamp.timestamp();
        let truncated = DateTime::<Utc>::from_timestamp(seconds, 0).unwrap_or(timestamp);
        Self(truncated)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }

    /// Parses a `YYYY.MM.DD.HH.mm.ss` label.
    pub fn parse(input: &str) -> UuidResult<Self> {
        let naive = NaiveDateTime::parse_from_str(input, BAG_VERSION_FORMAT).map_err(|e| {
            UuidError::InvalidInput(format!("invalid bag version '{}': {}", input, e))
        })?;
        Ok(Self(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)))
    }
}

impl fmt::Display for BagVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(BAG_VERSION_FORMAT))
    }
}

impl FromStr for BagVersion {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BagVersion::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for BagVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for BagVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BagVersion::parse(&s).map_err(serde::de::Error::custom)
    }
}
