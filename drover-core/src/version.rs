use std::cmp::Ordering;
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Dotted-integer version, most-significant segment first.
///
/// Instances come from [`Version::try_parse`] or the [`Version::EMPTY`]
/// sentinel and are immutable afterwards. Parsing accepts exactly one or
/// more digit groups separated by single dots; anything else is "not a
/// version", which is a normal outcome rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    numbers: Vec<u32>,
}

impl Version {
    /// The "no version" sentinel. It has no segments, renders as the empty
    /// string, and ranks below every non-empty version.
    pub const EMPTY: Version = Version {
        numbers: Vec::new(),
    };

    /// Parses a dotted-integer string such as `"19.5.1095"`.
    ///
    /// Returns `None` for anything outside the accepted grammar: empty
    /// input, signs, letters, whitespace, leading or trailing dots, empty
    /// segments, or segments that do not fit in a `u32`. Leading zeros are
    /// accepted (`"007"` parses to `7`).
    pub fn try_parse(text: &str) -> Option<Version> {
        let mut numbers = Vec::new();
        for segment in text.split('.') {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            numbers.push(segment.parse().ok()?);
        }
        Some(Version { numbers })
    }

    /// Scans free-form tool output for the first token that reads as a
    /// version with at least two segments.
    ///
    /// Tokens are split on whitespace and stripped of surrounding
    /// punctuation, so `"git version 2.39.2"` and `"release v1.4."` both
    /// yield a version. Bare integers such as build years do not count.
    pub fn find_in(text: &str) -> Option<Version> {
        text.split_whitespace().find_map(|token| {
            let trimmed = token
                .trim_matches(|c: char| !c.is_ascii_digit() && c != '.')
                .trim_matches('.');
            if !trimmed.contains('.') {
                return None;
            }
            Version::try_parse(trimmed)
        })
    }

    /// The most significant segment, or `0` for the empty sentinel.
    pub fn major(&self) -> u32 {
        self.segment(0)
    }

    /// Whether this is the "no version" sentinel.
    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    /// Segment access is zero-padded beyond the stored length.
    fn segment(&self, index: usize) -> u32 {
        self.numbers.get(index).copied().unwrap_or(0)
    }
}

impl Ord for Version {
    /// Compares segment-by-segment up to the shorter length; the first
    /// difference decides. When one version is a prefix of the other, the
    /// one with more segments ranks greater, so `1.2 < 1.2.0`. Most version
    /// schemes treat missing trailing segments as zero; this tie-break is
    /// deliberately kept as the integration has always behaved.
    fn cmp(&self, other: &Self) -> Ordering {
        for (mine, theirs) in self.numbers.iter().zip(other.numbers.iter()) {
            match mine.cmp(theirs) {
                Ordering::Equal => continue,
                decided => return decided,
            }
        }
        self.numbers.len().cmp(&other.numbers.len())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .numbers
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&rendered)
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct VersionVisitor;

        impl Visitor<'_> for VersionVisitor {
            type Value = Version;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a dotted-integer version string")
            }

            fn visit_str<E>(self, value: &str) -> std::result::Result<Version, E>
            where
                E: de::Error,
            {
                if value.is_empty() {
                    return Ok(Version::EMPTY);
                }
                Version::try_parse(value)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_str(VersionVisitor)
    }
}
