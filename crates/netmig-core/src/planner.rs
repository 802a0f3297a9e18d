//! Per-project migration: framework retargeting (phase A) followed by package
//! resolution and rewriting (phase B).
//!
//! Projects are handled one at a time in the order given. Package knowledge is
//! keyed by `(name, version)` in the report, so every project that references
//! the same pair points at the same record.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use netmig_domain::{
    is_downgrade, is_opaque_requirement, rewrite_package_version, rewrite_target_framework, Compatibility,
    FailedUpdate, FrameworkChange, FrameworkOutcome, MigrationMode, MigrationReport,
    PackageCompatibilityRecord, PackageKey, PackageOrigin, PackagePolicy, PackageReference,
    PackageRoute, PackageUpdate, PrivatePackage, ProjectDescriptor, ProjectReport,
    TargetFramework,
};

use crate::registry::{PackageIndex, PackageSource};
use crate::selector;

/// What a package name resolved to. Cached per name for the whole run.
#[derive(Debug, Clone)]
enum Resolution {
    Public(PackageIndex),
    Private(PackageIndex),
    Unresolved(String),
}

pub struct MigrationPlanner<'a, S: PackageSource + ?Sized> {
    source: &'a S,
    policy: &'a PackagePolicy,
    target: TargetFramework,
    allowed: Vec<String>,
    mode: MigrationMode,
    resolutions: HashMap<String, Resolution>,
}

impl<'a, S: PackageSource + ?Sized> MigrationPlanner<'a, S> {
    pub fn new(
        source: &'a S,
        policy: &'a PackagePolicy,
        target: TargetFramework,
        mode: MigrationMode,
    ) -> Self {
        let allowed = target.compatible_identifiers();
        Self {
            source,
            policy,
            target,
            allowed,
            mode,
            resolutions: HashMap::new(),
        }
    }

    /// Runs both phases over every project, appending to `report`.
    pub fn plan(&mut self, projects: &[ProjectDescriptor], report: &mut MigrationReport) {
        for project in projects {
            let project_report = self.plan_project(project, report);
            report.projects.push(project_report);
        }
    }

    pub fn plan_project(
        &mut self,
        project: &ProjectDescriptor,
        report: &mut MigrationReport,
    ) -> ProjectReport {
        info!(project = %project.name, "planning");
        let needs_migration = project.needs_migration(&self.target);
        let framework = self.retarget(project);
        if !matches!(
            framework.outcome,
            FrameworkOutcome::AlreadyCurrent | FrameworkOutcome::NoFramework
        ) {
            report.framework_updates.push(framework.clone());
        }

        let mut keys: Vec<PackageKey> = Vec::new();
        for (index, reference) in project.packages.iter().enumerate() {
            let route = self.policy.route(&reference.name);
            if route == PackageRoute::Excluded {
                debug!(package = %reference.name, "excluded from resolution");
                continue;
            }
            let key = PackageKey::new(&reference.name, &reference.version);
            if !report.packages.contains_key(&key) {
                let record = self.resolve_record(reference, route);
                report.packages.insert(key.clone(), record);
            }
            if let Some(record) = report.packages.get(&key).cloned() {
                let occurrence = project.packages[..index]
                    .iter()
                    .filter(|earlier| earlier.name == reference.name)
                    .count();
                self.apply_record(project, reference, occurrence, &record, report);
            }
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        ProjectReport {
            name: project.name.clone(),
            path: project.path.display().to_string(),
            shape: Some(project.shape),
            target_frameworks: project.target_frameworks.clone(),
            needs_migration,
            framework: Some(framework),
            packages: keys,
            build: None,
            package_listing: None,
            analysis: None,
            error: None,
        }
    }

    fn retarget(&self, project: &ProjectDescriptor) -> FrameworkChange {
        let to = self.target.moniker().to_string();
        let Some(framework) = project.framework() else {
            return FrameworkChange {
                project: project.name.clone(),
                from: None,
                to,
                outcome: FrameworkOutcome::NoFramework,
            };
        };
        let from = framework.moniker().to_string();
        let outcome = if !framework.needs_migration(&self.target) {
            FrameworkOutcome::AlreadyCurrent
        } else if !framework.is_rewritable_to(&self.target) {
            FrameworkOutcome::RequiresUpgradeTool
        } else if !self.mode.writes() {
            FrameworkOutcome::Pending
        } else {
            match project.framework_property {
                Some(property) => {
                    match rewrite_target_framework(&project.path, property, &from, &to) {
                        Ok(true) => {
                            info!(project = %project.name, %from, %to, "framework updated");
                            FrameworkOutcome::Updated
                        }
                        Ok(false) => {
                            warn!(project = %project.name, %from, "framework element not found");
                            FrameworkOutcome::NotRewritten
                        }
                        Err(err) => {
                            warn!(project = %project.name, error = %format!("{err:#}"), "framework rewrite failed");
                            FrameworkOutcome::NotRewritten
                        }
                    }
                }
                None => FrameworkOutcome::NotRewritten,
            }
        };
        FrameworkChange {
            project: project.name.clone(),
            from: Some(from),
            to,
            outcome,
        }
    }

    fn resolution(&mut self, name: &str, route: PackageRoute) -> Resolution {
        let id = name.to_ascii_lowercase();
        if let Some(cached) = self.resolutions.get(&id) {
            return cached.clone();
        }
        let resolved = resolve_name(self.source, name, route);
        self.resolutions.insert(id, resolved.clone());
        resolved
    }

    fn resolve_record(
        &mut self,
        reference: &PackageReference,
        route: PackageRoute,
    ) -> PackageCompatibilityRecord {
        let mut record = PackageCompatibilityRecord {
            name: reference.name.clone(),
            current_version: reference.version.clone(),
            latest_version: None,
            verdict: Compatibility::Unknown,
            origin: PackageOrigin::UnresolvedPrivate,
            source_url: None,
            notes: Vec::new(),
        };
        if is_opaque_requirement(&reference.version) {
            record.notes.push(if reference.version.trim().is_empty() {
                "no version declared in the project; not rewritten".to_string()
            } else {
                format!("version `{}` is not a single version; not rewritten", reference.version)
            });
        }

        match self.resolution(&reference.name, route) {
            Resolution::Public(index) => {
                record.origin = PackageOrigin::PublicRegistry;
                match selector::select_best(&index.versions, &self.allowed) {
                    Some(best) => {
                        record.verdict = Compatibility::Compatible;
                        record.latest_version = Some(best.version.clone());
                    }
                    None => {
                        record.verdict = Compatibility::Incompatible;
                        let newest = selector::latest(&index.versions)
                            .map_or_else(|| "none".to_string(), |entry| entry.version.clone());
                        record.notes.push(format!(
                            "no version supports {} (newest is {newest})",
                            self.target
                        ));
                    }
                }
                if let Some(entry) = self.policy.compatibility_override(&reference.name) {
                    record.verdict = entry.verdict;
                    if record.latest_version.is_none() && entry.verdict == Compatibility::Compatible
                    {
                        record.latest_version =
                            selector::latest(&index.versions).map(|e| e.version.clone());
                    }
                    record.notes.push(format!("verdict overridden: {}", entry.reason));
                }
            }
            Resolution::Private(index) => {
                record.origin = PackageOrigin::PrivateRegistry;
                record.source_url = Some(index.source_url.clone());
                record.latest_version = selector::latest(&index.versions).map(|e| e.version.clone());
                record.verdict = if selector::select_best(&index.versions, &self.allowed).is_some() {
                    Compatibility::Compatible
                } else {
                    Compatibility::Incompatible
                };
            }
            Resolution::Unresolved(reason) => {
                record.notes.push(format!("requires manual verification: {reason}"));
            }
        }
        if !record.is_private() {
            if let Some(latest) = record
                .latest_version
                .as_deref()
                .filter(|latest| is_downgrade(&reference.version, latest))
            {
                record.notes.push(format!(
                    "declared version {} is newer than {latest}; not rewritten",
                    reference.version
                ));
            }
        }
        record
    }

    fn apply_record(
        &self,
        project: &ProjectDescriptor,
        reference: &PackageReference,
        occurrence: usize,
        record: &PackageCompatibilityRecord,
        report: &mut MigrationReport,
    ) {
        if record.is_private() {
            report.push_private_package(PrivatePackage {
                name: record.name.clone(),
                version: record.current_version.clone(),
                source_url: record.source_url.clone(),
                latest_version: record.latest_version.clone(),
            });
            return;
        }

        let Some(resolved) = record.latest_version.as_deref() else {
            let reason = format!("no version supports {}", self.target);
            if report.push_failed_update(FailedUpdate {
                package: reference.name.clone(),
                version: reference.version.clone(),
                project: project.name.clone(),
                reason,
            }) {
                warn!(package = %reference.name, project = %project.name, "no compatible version");
            }
            return;
        };
        if resolved == reference.version
            || is_opaque_requirement(&reference.version)
            || is_downgrade(&reference.version, resolved)
        {
            return;
        }

        let update = PackageUpdate {
            package: reference.name.clone(),
            from: reference.version.clone(),
            to: resolved.to_string(),
            project: project.name.clone(),
        };
        if !self.mode.writes() {
            if !report.pending_updates.contains(&update) {
                report.pending_updates.push(update);
            }
            return;
        }
        match rewrite_package_version(&project.path, &reference.name, occurrence, resolved) {
            Ok(true) => {
                info!(package = %update.package, from = %update.from, to = %update.to, project = %project.name, "package updated");
                if !report.successful_updates.contains(&update) {
                    report.successful_updates.push(update);
                }
            }
            Ok(false) => {
                warn!(package = %reference.name, occurrence, path = %project.path.display(), "reference node not rewritten");
                report.push_failed_update(FailedUpdate {
                    package: update.package,
                    version: update.from,
                    project: update.project,
                    reason: "reference node not rewritten".to_string(),
                });
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(package = %reference.name, project = %project.name, error = %reason, "package rewrite failed");
                report.push_failed_update(FailedUpdate {
                    package: update.package,
                    version: update.from,
                    project: update.project,
                    reason,
                });
            }
        }
    }
}

fn resolve_name<S: PackageSource + ?Sized>(
    source: &S,
    name: &str,
    route: PackageRoute,
) -> Resolution {
    if route == PackageRoute::Public {
        match source.lookup_public(name) {
            Ok(index) => return Resolution::Public(index),
            Err(err) => debug!(package = name, %err, "public lookup failed"),
        }
    }
    if !source.has_private_sources() {
        return Resolution::Unresolved(if route == PackageRoute::Internal {
            "internal package and no private sources configured".to_string()
        } else {
            "not found in the public registry".to_string()
        });
    }
    match source.lookup_private(name) {
        Ok(index) => Resolution::Private(index),
        Err(err) => {
            debug!(package = name, %err, "private lookup failed");
            Resolution::Unresolved("not found in any configured source".to_string())
        }
    }
}
