//! Numeric package versions used to rank registry candidates.
//!
//! Ordering is strict `major.minor[.patch[.build]]`: two to four unsigned
//! integer components, missing components read as zero. A `+metadata` suffix
//! is ignored. Anything else (prerelease labels, empty strings, wildcards) is
//! *irregular*: it ranks as `0.0.0.0` and below every regular version of the
//! same magnitude.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PackageVersion {
    raw: String,
    parts: Option<[u64; 4]>,
}

impl PackageVersion {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            parts: parse_numeric(strip_metadata(raw.trim())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn is_regular(&self) -> bool {
        self.parts.is_some()
    }

    fn sort_key(&self) -> ([u64; 4], bool) {
        (self.parts.unwrap_or([0; 4]), self.parts.is_some())
    }
}

fn strip_metadata(raw: &str) -> &str {
    raw.split_once('+').map_or(raw, |(version, _)| version)
}

fn parse_numeric(raw: &str) -> Option<[u64; 4]> {
    let pieces: Vec<&str> = raw.split('.').collect();
    if !(2..=4).contains(&pieces.len()) {
        return None;
    }
    let mut parts = [0u64; 4];
    for (slot, piece) in parts.iter_mut().zip(&pieces) {
        if piece.is_empty() || !piece.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = piece.parse().ok()?;
    }
    Some(parts)
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl From<String> for PackageVersion {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<PackageVersion> for String {
    fn from(version: PackageVersion) -> Self {
        version.raw
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Returns true when moving from `declared` to `candidate` would step back to
/// an older release line. Only the numeric cores are compared, so
/// `4.0.0-preview.1` is newer than `3.1.1` but not newer than `4.0.0`.
#[must_use]
pub fn is_downgrade(declared: &str, candidate: &str) -> bool {
    let core = |raw: &str| {
        let version = strip_metadata(raw.trim());
        parse_numeric(version.split_once('-').map_or(version, |(core, _)| core))
    };
    match (core(declared), core(candidate)) {
        (Some(declared), Some(candidate)) => declared > candidate,
        _ => false,
    }
}

/// Returns true when a declared reference version is something other than a
/// single pinned value and must not be rewritten.
#[must_use]
pub fn is_opaque_requirement(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty()
        || trimmed.starts_with('[')
        || trimmed.starts_with('(')
        || trimmed.contains('*')
        || trimmed.contains("$(")
        || trimmed.contains(',')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: &str) -> PackageVersion {
        PackageVersion::parse(raw)
    }

    #[test]
    fn numeric_components_compare_by_magnitude() {
        assert!(v("2.10.0") > v("2.9.9"));
        assert!(v("13.0.3") > v("13.0.1"));
        assert!(v("1.0.0.10") > v("1.0.0.9"));
        assert!(v("10.0") > v("9.99.99.99"));
    }

    #[test]
    fn missing_components_read_as_zero() {
        assert_eq!(v("1.2"), v("1.2.0"));
        assert_eq!(v("1.2.0"), v("1.2.0.0"));
    }

    #[test]
    fn irregular_versions_rank_lowest() {
        let irregular = ["1.0.0-beta", "", "latest", "1", "1.2.3.4.5", "1..2", "v1.0.0"];
        for raw in irregular {
            let parsed = v(raw);
            assert!(!parsed.is_regular(), "{raw} should be irregular");
            assert!(parsed < v("0.0.1"), "{raw} should sort below 0.0.1");
            assert!(parsed < v("0.0.0.0"), "{raw} should sort below 0.0.0.0");
        }
    }

    #[test]
    fn build_metadata_is_ignored() {
        assert!(v("1.0.0+abc").is_regular());
        assert_eq!(v("1.0.0+abc"), v("1.0.0"));
        assert!(v("1.0.1+abc") > v("1.0.0"));
        assert!(!v("1.0.0-beta+abc").is_regular());
    }

    #[test]
    fn downgrades_compare_release_cores() {
        assert!(is_downgrade("4.0.0-preview.1", "3.1.1"));
        assert!(is_downgrade("13.0.3", "12.0.1"));
        assert!(!is_downgrade("4.0.0-preview.1", "4.0.0"));
        assert!(!is_downgrade("12.0.1", "13.0.3"));
        assert!(!is_downgrade("latest", "1.0.0"));
    }

    #[test]
    fn sorting_mixed_candidates_is_total() {
        let mut versions = vec![v("2.9.9"), v("rc"), v("2.10.0"), v("1.0"), v("2.10.0.1")];
        versions.sort();
        let ordered: Vec<&str> = versions.iter().map(PackageVersion::as_str).collect();
        assert_eq!(ordered, vec!["rc", "1.0", "2.9.9", "2.10.0", "2.10.0.1"]);
    }

    #[test]
    fn opaque_requirements_are_detected() {
        assert!(is_opaque_requirement("[1.0,2.0)"));
        assert!(is_opaque_requirement("6.*"));
        assert!(is_opaque_requirement("$(NewtonsoftVersion)"));
        assert!(is_opaque_requirement(""));
        assert!(!is_opaque_requirement("12.0.1"));
        assert!(!is_opaque_requirement("1.0.0-preview.3"));
    }
}
