use netmig_domain::PackageVersion;

use crate::registry::{FrameworkSupport, VersionEntry};

/// Whether a version declares support for at least one allowed framework.
/// Versions without compatibility groups are usable anywhere.
#[must_use]
pub fn is_compatible(entry: &VersionEntry, allowed: &[String]) -> bool {
    match &entry.support {
        FrameworkSupport::Any => true,
        FrameworkSupport::Frameworks(frameworks) => {
            frameworks.is_empty() || frameworks.iter().any(|fw| allowed.contains(fw))
        }
    }
}

/// Picks the numerically highest compatible version, or `None` when no
/// candidate survives the allow-list.
#[must_use]
pub fn select_best<'a>(versions: &'a [VersionEntry], allowed: &[String]) -> Option<&'a VersionEntry> {
    versions
        .iter()
        .filter(|entry| is_compatible(entry, allowed))
        .max_by(|a, b| PackageVersion::parse(&a.version).cmp(&PackageVersion::parse(&b.version)))
}

/// Highest version regardless of compatibility.
#[must_use]
pub fn latest(versions: &[VersionEntry]) -> Option<&VersionEntry> {
    versions
        .iter()
        .max_by(|a, b| PackageVersion::parse(&a.version).cmp(&PackageVersion::parse(&b.version)))
}
