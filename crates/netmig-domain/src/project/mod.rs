//! Project descriptors: discovery, parsing and in-place edits.

mod descriptor;
mod rewrite;
mod scan;

pub use descriptor::{
    DescriptorShape, FrameworkProperty, PackageReference, ProjectDescriptor, VersionForm,
};
pub use rewrite::{
    rewrite_package_version, rewrite_target_framework, set_package_version, set_target_framework,
};
pub use scan::{discover_descriptors, parse_descriptor, scan};
