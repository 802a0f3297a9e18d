//! Target framework monikers and the migration rules attached to them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Monikers that Phase A may replace verbatim with the target literal.
const REWRITABLE_LITERALS: &[&str] = &[
    "netcoreapp2.0",
    "netcoreapp2.1",
    "netcoreapp2.2",
    "netcoreapp3.0",
    "netcoreapp3.1",
    "net5.0",
    "net6.0",
    "net7.0",
];

const STANDARD_IDENTIFIERS: &[&str] = &["netstandard2.0", "netstandard2.1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum FrameworkFamily {
    /// Classic .NET Framework (`net48`, `net472`, `v4.7.2`, `net35`).
    NetFramework,
    NetCoreApp { major: u32, minor: u32 },
    NetStandard { major: u32, minor: u32 },
    /// .NET 5 and later.
    Net { major: u32, minor: u32 },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFramework {
    moniker: String,
    family: FrameworkFamily,
}

impl TargetFramework {
    #[must_use]
    pub fn parse(moniker: &str) -> Self {
        let moniker = moniker.trim().to_string();
        let family = classify(&moniker);
        Self { moniker, family }
    }

    #[must_use]
    pub fn moniker(&self) -> &str {
        &self.moniker
    }

    #[must_use]
    pub fn family(&self) -> FrameworkFamily {
        self.family
    }

    /// True when a project on this framework should be moved to `target`.
    #[must_use]
    pub fn needs_migration(&self, target: &TargetFramework) -> bool {
        match self.family {
            FrameworkFamily::NetFramework | FrameworkFamily::NetCoreApp { .. } => true,
            FrameworkFamily::NetStandard { major, .. } => major < 2,
            FrameworkFamily::Net { major, minor } => match target.family {
                FrameworkFamily::Net {
                    major: target_major,
                    minor: target_minor,
                } => (major, minor) < (target_major, target_minor),
                _ => false,
            },
            FrameworkFamily::Unknown => false,
        }
    }

    /// True when the moniker is one of the outdated literals that can be
    /// swapped for `target` without any other project changes.
    #[must_use]
    pub fn is_rewritable_to(&self, target: &TargetFramework) -> bool {
        let lowered = self.moniker.to_ascii_lowercase();
        REWRITABLE_LITERALS.contains(&lowered.as_str()) && self.is_older_than(target)
    }

    fn is_older_than(&self, target: &TargetFramework) -> bool {
        let FrameworkFamily::Net {
            major: target_major,
            minor: target_minor,
        } = target.family
        else {
            return false;
        };
        match self.family {
            FrameworkFamily::NetCoreApp { .. } | FrameworkFamily::NetFramework => true,
            FrameworkFamily::Net { major, minor } => (major, minor) < (target_major, target_minor),
            _ => false,
        }
    }

    /// Framework identifiers a package may declare and still be usable from
    /// this target: the target itself, every earlier `netN.0` from .NET 5 on,
    /// and the `netstandard2.x` identifiers.
    #[must_use]
    pub fn compatible_identifiers(&self) -> Vec<String> {
        let mut allowed = vec![self.moniker.to_ascii_lowercase()];
        if let FrameworkFamily::Net { major, .. } = self.family {
            for earlier in 5..=major {
                let id = format!("net{earlier}.0");
                if !allowed.contains(&id) {
                    allowed.push(id);
                }
            }
        }
        for id in STANDARD_IDENTIFIERS {
            if !allowed.iter().any(|existing| existing == id) {
                allowed.push((*id).to_string());
            }
        }
        allowed
    }
}

impl fmt::Display for TargetFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.moniker)
    }
}

fn classify(moniker: &str) -> FrameworkFamily {
    let lowered = moniker.to_ascii_lowercase();
    let base = lowered.split('-').next().unwrap_or_default();

    if let Some(version) = base.strip_prefix("netcoreapp") {
        return dotted(version)
            .map_or(FrameworkFamily::Unknown, |(major, minor)| {
                FrameworkFamily::NetCoreApp { major, minor }
            });
    }
    if let Some(version) = base.strip_prefix("netstandard") {
        return dotted(version)
            .map_or(FrameworkFamily::Unknown, |(major, minor)| {
                FrameworkFamily::NetStandard { major, minor }
            });
    }
    if let Some(version) = base.strip_prefix('v') {
        // TargetFrameworkVersion form used by legacy descriptors.
        return if dotted(version).is_some() {
            FrameworkFamily::NetFramework
        } else {
            FrameworkFamily::Unknown
        };
    }
    if let Some(version) = base.strip_prefix("net") {
        if version.contains('.') {
            return match dotted(version) {
                Some((major, minor)) if major >= 5 => FrameworkFamily::Net { major, minor },
                _ => FrameworkFamily::Unknown,
            };
        }
        if !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) {
            return FrameworkFamily::NetFramework;
        }
    }
    FrameworkFamily::Unknown
}

fn dotted(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(minor) => minor.parse().ok()?,
        None => 0,
    };
    Some((major, minor))
}

/// Normalises a framework name as published in registry metadata
/// (`.NETStandard2.0`, `.NETCoreApp3.1`, `net8.0-windows7.0`) into the short
/// moniker form. Returns `None` for an empty name, which registries use to
/// mean "any framework".
#[must_use]
pub fn normalize_registry_framework(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("any") {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase();
    let base = lowered.split('-').next().unwrap_or_default();
    let short = if let Some(rest) = base.strip_prefix(".netstandard") {
        format!("netstandard{rest}")
    } else if let Some(rest) = base.strip_prefix(".netcoreapp") {
        format!("netcoreapp{rest}")
    } else if let Some(rest) = base.strip_prefix(".netframework") {
        format!("net{}", rest.replace('.', ""))
    } else {
        base.to_string()
    };
    Some(short)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tf(moniker: &str) -> TargetFramework {
        TargetFramework::parse(moniker)
    }

    #[test]
    fn classifies_common_monikers() {
        assert_eq!(tf("net48").family(), FrameworkFamily::NetFramework);
        assert_eq!(tf("v4.7.2").family(), FrameworkFamily::NetFramework);
        assert_eq!(
            tf("netcoreapp3.1").family(),
            FrameworkFamily::NetCoreApp { major: 3, minor: 1 }
        );
        assert_eq!(
            tf("netstandard2.0").family(),
            FrameworkFamily::NetStandard { major: 2, minor: 0 }
        );
        assert_eq!(
            tf("net8.0-windows").family(),
            FrameworkFamily::Net { major: 8, minor: 0 }
        );
        assert_eq!(tf("$(DefaultTfm)").family(), FrameworkFamily::Unknown);
    }

    #[test]
    fn migration_predicate_follows_family() {
        let target = tf("net8.0");
        assert!(tf("net472").needs_migration(&target));
        assert!(tf("netcoreapp3.1").needs_migration(&target));
        assert!(tf("netstandard1.6").needs_migration(&target));
        assert!(tf("net6.0").needs_migration(&target));
        assert!(!tf("netstandard2.0").needs_migration(&target));
        assert!(!tf("net8.0").needs_migration(&target));
        assert!(!tf("net9.0").needs_migration(&target));
        assert!(!tf("weird").needs_migration(&target));
    }

    #[test]
    fn only_listed_literals_older_than_target_are_rewritable() {
        let target = tf("net8.0");
        assert!(tf("netcoreapp3.1").is_rewritable_to(&target));
        assert!(tf("net6.0").is_rewritable_to(&target));
        assert!(!tf("net8.0").is_rewritable_to(&target));
        assert!(!tf("net48").is_rewritable_to(&target));
        assert!(!tf("netstandard2.0").is_rewritable_to(&target));
        assert!(!tf("net7.0").is_rewritable_to(&tf("net6.0")));
    }

    #[test]
    fn compatible_identifiers_include_earlier_net_and_standard() {
        let ids = tf("net8.0").compatible_identifiers();
        assert_eq!(
            ids,
            vec![
                "net8.0",
                "net5.0",
                "net6.0",
                "net7.0",
                "netstandard2.0",
                "netstandard2.1"
            ]
        );
    }

    #[test]
    fn registry_frameworks_normalise_to_short_form() {
        assert_eq!(
            normalize_registry_framework(".NETStandard2.0").as_deref(),
            Some("netstandard2.0")
        );
        assert_eq!(
            normalize_registry_framework(".NETCoreApp3.1").as_deref(),
            Some("netcoreapp3.1")
        );
        assert_eq!(
            normalize_registry_framework(".NETFramework4.6.1").as_deref(),
            Some("net461")
        );
        assert_eq!(
            normalize_registry_framework("net8.0-windows7.0").as_deref(),
            Some("net8.0")
        );
        assert_eq!(
            normalize_registry_framework("net461").as_deref(),
            Some("net461")
        );
        assert_eq!(normalize_registry_framework(""), None);
    }
}
