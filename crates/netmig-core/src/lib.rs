#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

pub mod checkout;
mod config;
mod migrate;
mod net;
mod outcome;
pub mod planner;
pub mod process;
pub mod registry;
pub mod render;
pub mod selector;
pub mod setup;
pub mod verify;

pub use crate::config::{GlobalOptions, Settings};
pub use crate::migrate::{
    run_migration, MigrateRequest, RepoSource, DEFAULT_BRANCH, DEFAULT_OUTPUT_DIR,
    DEFAULT_TARGET_FRAMEWORK,
};
pub use crate::outcome::{CommandStatus, ExecutionOutcome};
pub use crate::planner::MigrationPlanner;
pub use crate::registry::{NuGetClient, PackageSource, RegistryError, NUGET_PUBLIC_URL};

pub use netmig_domain::MigrationMode;

pub const NETMIG_VERSION: &str = env!("CARGO_PKG_VERSION");
