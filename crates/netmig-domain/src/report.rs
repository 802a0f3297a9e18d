//! The run aggregate: per-package compatibility records, per-project results
//! and the global update/failure/private lists.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::project::DescriptorShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    Compatible,
    Incompatible,
    Unknown,
}

impl Compatibility {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Compatible => "compatible",
            Self::Incompatible => "incompatible",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageOrigin {
    PublicRegistry,
    PrivateRegistry,
    /// Not found anywhere; someone has to check it by hand.
    UnresolvedPrivate,
}

impl PackageOrigin {
    #[must_use]
    pub fn is_private(self) -> bool {
        !matches!(self, Self::PublicRegistry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationMode {
    /// Resolve and report only.
    Analyze,
    /// Rewrite descriptors and verify the build.
    Apply,
}

impl MigrationMode {
    #[must_use]
    pub const fn writes(self) -> bool {
        matches!(self, Self::Apply)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageKey {
    pub name: String,
    pub version: String,
}

impl PackageKey {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageCompatibilityRecord {
    pub name: String,
    pub current_version: String,
    pub latest_version: Option<String>,
    pub verdict: Compatibility,
    pub origin: PackageOrigin,
    pub source_url: Option<String>,
    pub notes: Vec<String>,
}

impl PackageCompatibilityRecord {
    #[must_use]
    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.name, &self.current_version)
    }

    #[must_use]
    pub fn is_private(&self) -> bool {
        self.origin.is_private()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkOutcome {
    Updated,
    /// Would be updated; analyze mode does not write.
    Pending,
    AlreadyCurrent,
    /// Needs migration but is not a literal swap (e.g. .NET Framework).
    RequiresUpgradeTool,
    /// Matched the rewrite rule but the descriptor could not be changed.
    NotRewritten,
    NoFramework,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkChange {
    pub project: String,
    pub from: Option<String>,
    pub to: String,
    pub outcome: FrameworkOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageUpdate {
    pub package: String,
    pub from: String,
    pub to: String,
    pub project: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUpdate {
    pub package: String,
    pub version: String,
    pub project: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivatePackage {
    pub name: String,
    pub version: String,
    pub source_url: Option<String>,
    pub latest_version: Option<String>,
}

impl PrivatePackage {
    #[must_use]
    pub fn requires_manual_verification(&self) -> bool {
        self.source_url.is_none()
    }
}

/// Captured result of one external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRun {
    pub command: String,
    pub exit_code: i32,
    pub output: String,
}

impl ToolRun {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectReport {
    pub name: String,
    pub path: String,
    pub shape: Option<DescriptorShape>,
    pub target_frameworks: Vec<String>,
    pub needs_migration: bool,
    pub framework: Option<FrameworkChange>,
    /// Keys into [`MigrationReport::packages`], in declaration order.
    pub packages: Vec<PackageKey>,
    pub build: Option<ToolRun>,
    pub package_listing: Option<ToolRun>,
    pub analysis: Option<ToolRun>,
    pub error: Option<String>,
}

impl ProjectReport {
    #[must_use]
    pub fn failed(name: String, path: String, error: String) -> Self {
        Self {
            name,
            path,
            shape: None,
            target_frameworks: Vec::new(),
            needs_migration: false,
            framework: None,
            packages: Vec::new(),
            build: None,
            package_listing: None,
            analysis: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub repository: String,
    pub branch: String,
    pub target_framework: String,
    pub mode: MigrationMode,
    pub generated_at: String,
    pub setup_notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub projects: usize,
    pub projects_needing_migration: usize,
    pub project_errors: usize,
    pub framework_updates: usize,
    pub pending_framework_updates: usize,
    pub packages: usize,
    pub successful_updates: usize,
    pub pending_updates: usize,
    pub failed_updates: usize,
    pub private_packages: usize,
    pub build_failures: usize,
}

/// Accumulator threaded through a run and rendered once at the end.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    pub projects: Vec<ProjectReport>,
    #[serde(serialize_with = "records_as_list")]
    pub packages: IndexMap<PackageKey, PackageCompatibilityRecord>,
    pub framework_updates: Vec<FrameworkChange>,
    pub successful_updates: Vec<PackageUpdate>,
    pub pending_updates: Vec<PackageUpdate>,
    pub failed_updates: Vec<FailedUpdate>,
    pub private_packages: Vec<PrivatePackage>,
}

fn records_as_list<S: Serializer>(
    records: &IndexMap<PackageKey, PackageCompatibilityRecord>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(records.values())
}

impl MigrationReport {
    #[must_use]
    pub fn new(metadata: ReportMetadata) -> Self {
        Self {
            metadata,
            summary: ReportSummary::default(),
            projects: Vec::new(),
            packages: IndexMap::new(),
            framework_updates: Vec::new(),
            successful_updates: Vec::new(),
            pending_updates: Vec::new(),
            failed_updates: Vec::new(),
            private_packages: Vec::new(),
        }
    }

    #[must_use]
    pub fn record(&self, key: &PackageKey) -> Option<&PackageCompatibilityRecord> {
        self.packages.get(key)
    }

    /// Adds a failed update unless the same package already failed for the
    /// same project. Returns whether it was added.
    pub fn push_failed_update(&mut self, failed: FailedUpdate) -> bool {
        let duplicate = self
            .failed_updates
            .iter()
            .any(|existing| existing.package == failed.package && existing.project == failed.project);
        if !duplicate {
            self.failed_updates.push(failed);
        }
        !duplicate
    }

    /// Adds a private package unless one with the same name is already listed.
    pub fn push_private_package(&mut self, package: PrivatePackage) -> bool {
        let duplicate = self
            .private_packages
            .iter()
            .any(|existing| existing.name == package.name);
        if !duplicate {
            self.private_packages.push(package);
        }
        !duplicate
    }

    /// Recomputes [`MigrationReport::summary`] from the collected lists.
    pub fn finalize(&mut self) {
        self.summary = ReportSummary {
            projects: self.projects.len(),
            projects_needing_migration: self.projects.iter().filter(|p| p.needs_migration).count(),
            project_errors: self.projects.iter().filter(|p| p.error.is_some()).count(),
            framework_updates: self
                .framework_updates
                .iter()
                .filter(|change| change.outcome == FrameworkOutcome::Updated)
                .count(),
            pending_framework_updates: self
                .framework_updates
                .iter()
                .filter(|change| change.outcome == FrameworkOutcome::Pending)
                .count(),
            packages: self.packages.len(),
            successful_updates: self.successful_updates.len(),
            pending_updates: self.pending_updates.len(),
            failed_updates: self.failed_updates.len(),
            private_packages: self.private_packages.len(),
            build_failures: self
                .projects
                .iter()
                .filter(|p| p.build.as_ref().is_some_and(|run| !run.succeeded()))
                .count(),
        };
    }
}
