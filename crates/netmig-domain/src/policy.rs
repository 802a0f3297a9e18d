use serde::{Deserialize, Serialize};

use crate::report::Compatibility;

/// Platform and runtime packages that ship with the framework itself.
pub const EXCLUDED_PREFIXES: &[&str] = &[
    "System.",
    "Microsoft.NETCore.",
    "Microsoft.AspNetCore.App",
    "NETStandard.Library",
    "runtime.",
];

pub const DEFAULT_INTERNAL_PREFIX: &str = "Internal.";

/// Packages whose verdict is fixed regardless of what the registry metadata
/// says. Entries here must carry a reason.
pub const COMPATIBILITY_OVERRIDES: &[CompatibilityOverride] = &[CompatibilityOverride {
    package: "Newtonsoft.Json",
    verdict: Compatibility::Compatible,
    reason: "ships a netstandard2.0 build; older versions only list .NET Framework groups",
}];

#[derive(Debug, Clone, Copy)]
pub struct CompatibilityOverride {
    pub package: &'static str,
    pub verdict: Compatibility,
    pub reason: &'static str,
}

/// How a reference is handled during package resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageRoute {
    /// Never looked up and never reported.
    Excluded,
    /// Only private sources are consulted.
    Internal,
    Public,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagePolicy {
    excluded_prefixes: Vec<String>,
    internal_prefixes: Vec<String>,
}

impl Default for PackagePolicy {
    fn default() -> Self {
        Self::new(vec![DEFAULT_INTERNAL_PREFIX.to_string()])
    }
}

impl PackagePolicy {
    #[must_use]
    pub fn new(internal_prefixes: Vec<String>) -> Self {
        Self {
            excluded_prefixes: EXCLUDED_PREFIXES.iter().map(ToString::to_string).collect(),
            internal_prefixes: internal_prefixes
                .into_iter()
                .filter(|prefix| !prefix.trim().is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn route(&self, package: &str) -> PackageRoute {
        if self
            .excluded_prefixes
            .iter()
            .any(|prefix| package.starts_with(prefix.as_str()))
        {
            PackageRoute::Excluded
        } else if self
            .internal_prefixes
            .iter()
            .any(|prefix| package.starts_with(prefix.as_str()))
        {
            PackageRoute::Internal
        } else {
            PackageRoute::Public
        }
    }

    #[must_use]
    pub fn internal_prefixes(&self) -> &[String] {
        &self.internal_prefixes
    }

    #[must_use]
    pub fn compatibility_override(&self, package: &str) -> Option<&'static CompatibilityOverride> {
        COMPATIBILITY_OVERRIDES
            .iter()
            .find(|entry| entry.package.eq_ignore_ascii_case(package))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_prefix() {
        let policy = PackagePolicy::default();
        assert_eq!(policy.route("System.Text.Json"), PackageRoute::Excluded);
        assert_eq!(policy.route("Microsoft.NETCore.App"), PackageRoute::Excluded);
        assert_eq!(policy.route("runtime.native.System"), PackageRoute::Excluded);
        assert_eq!(policy.route("Internal.Billing"), PackageRoute::Internal);
        assert_eq!(policy.route("Serilog"), PackageRoute::Public);
        assert_eq!(policy.route("Microsoft.Extensions.Logging"), PackageRoute::Public);
    }

    #[test]
    fn custom_internal_prefixes_replace_the_default() {
        let policy = PackagePolicy::new(vec!["Contoso.".into(), "  ".into()]);
        assert_eq!(policy.route("Contoso.Core"), PackageRoute::Internal);
        assert_eq!(policy.route("Internal.Billing"), PackageRoute::Public);
        assert_eq!(policy.internal_prefixes(), ["Contoso.".to_string()]);
    }

    #[test]
    fn override_table_is_case_insensitive() {
        let policy = PackagePolicy::default();
        let entry = policy
            .compatibility_override("newtonsoft.json")
            .expect("override present");
        assert_eq!(entry.verdict, Compatibility::Compatible);
        assert!(policy.compatibility_override("Serilog").is_none());
    }
}
