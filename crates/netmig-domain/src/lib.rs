#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod framework;
pub mod policy;
pub mod project;
pub mod report;
pub mod version;

pub use framework::{normalize_registry_framework, FrameworkFamily, TargetFramework};
pub use policy::{CompatibilityOverride, PackagePolicy, PackageRoute, COMPATIBILITY_OVERRIDES};
pub use project::{
    discover_descriptors, parse_descriptor, rewrite_package_version, rewrite_target_framework,
    scan, set_package_version, set_target_framework, DescriptorShape, FrameworkProperty,
    PackageReference, ProjectDescriptor, VersionForm,
};
pub use report::{
    Compatibility, FailedUpdate, FrameworkChange, FrameworkOutcome, MigrationMode,
    MigrationReport, PackageCompatibilityRecord, PackageKey, PackageOrigin, PackageUpdate,
    PrivatePackage, ProjectReport, ReportMetadata, ReportSummary, ToolRun,
};
pub use version::{is_downgrade, is_opaque_requirement, PackageVersion};
