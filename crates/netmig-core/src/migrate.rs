//! The `analyze` and `migrate` commands.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use netmig_domain::{
    discover_descriptors, scan, FrameworkFamily, FrameworkOutcome, MigrationMode,
    MigrationReport, PackagePolicy, ProjectReport, ReportMetadata, TargetFramework,
};

use crate::checkout::{redact, validate_repo_url, Checkout, RepoUrl};
use crate::config::{GlobalOptions, Settings};
use crate::outcome::ExecutionOutcome;
use crate::planner::MigrationPlanner;
use crate::registry::{Credentials, NuGetClient, RegistrySource, NUGET_PUBLIC_URL};
use crate::render::{write_outputs, ReportFiles};
use crate::setup::{self, SetupRequirements, SetupStatus};
use crate::verify::Verifier;

pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_TARGET_FRAMEWORK: &str = "net8.0";
pub const DEFAULT_OUTPUT_DIR: &str = "migration-report";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoSource {
    Remote(String),
    Local(PathBuf),
}

#[derive(Clone)]
pub struct MigrateRequest {
    pub mode: MigrationMode,
    pub source: RepoSource,
    pub branch: String,
    pub output: PathBuf,
    pub token: Option<String>,
    pub private_sources: Vec<String>,
    pub private_username: Option<String>,
    pub private_password: Option<String>,
    pub nuget_url: String,
    pub target_framework: String,
    pub internal_prefixes: Vec<String>,
    pub list_packages: bool,
    pub upgrade_assistant: bool,
}

impl MigrateRequest {
    #[must_use]
    pub fn new(mode: MigrationMode, source: RepoSource) -> Self {
        Self {
            mode,
            source,
            branch: DEFAULT_BRANCH.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT_DIR),
            token: None,
            private_sources: Vec::new(),
            private_username: None,
            private_password: None,
            nuget_url: NUGET_PUBLIC_URL.to_string(),
            target_framework: DEFAULT_TARGET_FRAMEWORK.to_string(),
            internal_prefixes: Vec::new(),
            list_packages: false,
            upgrade_assistant: false,
        }
    }

    fn credentials(&self) -> Option<Credentials> {
        match (&self.private_username, &self.private_password) {
            (None, None) => None,
            (username, password) => Some(Credentials {
                username: username.clone().unwrap_or_default(),
                password: password.clone().unwrap_or_default(),
            }),
        }
    }
}

impl std::fmt::Debug for MigrateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrateRequest")
            .field("mode", &self.mode)
            .field("source", &self.source)
            .field("branch", &self.branch)
            .field("output", &self.output)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("private_sources", &self.private_sources)
            .field("private_username", &self.private_username)
            .field("nuget_url", &self.nuget_url)
            .field("target_framework", &self.target_framework)
            .field("internal_prefixes", &self.internal_prefixes)
            .field("list_packages", &self.list_packages)
            .field("upgrade_assistant", &self.upgrade_assistant)
            .finish_non_exhaustive()
    }
}

/// Runs one analysis or migration end to end and writes the report.
///
/// # Errors
/// Returns an error only for failures outside the run's own error buckets,
/// such as an unwritable output directory.
pub fn run_migration(global: &GlobalOptions, request: &MigrateRequest) -> Result<ExecutionOutcome> {
    let settings = Settings::from_env();
    run_with_settings(global, request, &settings)
}

enum Origin<'a> {
    Remote(RepoUrl),
    Local(&'a Path),
}

pub(crate) fn run_with_settings(
    global: &GlobalOptions,
    request: &MigrateRequest,
    settings: &Settings,
) -> Result<ExecutionOutcome> {
    let target = TargetFramework::parse(&request.target_framework);
    if !matches!(target.family(), FrameworkFamily::Net { .. }) {
        return Ok(ExecutionOutcome::user_error(
            format!("unsupported target framework `{}`", request.target_framework),
            json!({
                "reason": "invalid_target_framework",
                "hint": "use a .NET 5+ moniker such as net8.0",
            }),
        ));
    }

    let origin = match &request.source {
        RepoSource::Remote(raw) => match validate_repo_url(raw) {
            Ok(url) => Origin::Remote(url),
            Err(outcome) => return Ok(outcome),
        },
        RepoSource::Local(path) => Origin::Local(path),
    };

    let writes = request.mode.writes();
    let setup = setup::prepare(
        SetupRequirements {
            clone: matches!(origin, Origin::Remote(_)),
            build: writes,
            upgrade_assistant: writes && request.upgrade_assistant,
        },
        settings,
    );
    let toolchain = match &setup {
        SetupStatus::Fatal { reason } => {
            return Ok(ExecutionOutcome::failure(
                "setup failed",
                json!({ "reason": "setup_failed", "error": reason }),
            ));
        }
        SetupStatus::Ready { toolchain } | SetupStatus::Degraded { toolchain, .. } => toolchain,
    };
    for note in setup.notes() {
        warn!("{note}");
    }

    let (checkout, repository) = match &origin {
        Origin::Local(path) => match Checkout::local(path) {
            Ok(checkout) => {
                let shown = checkout.root().display().to_string();
                (checkout, shown)
            }
            Err(err) => {
                return Ok(ExecutionOutcome::user_error(
                    format!("{err:#}"),
                    json!({ "reason": "invalid_path" }),
                ))
            }
        },
        Origin::Remote(url) => match clone(toolchain.git.as_deref(), url, request, settings) {
            Ok(checkout) => (checkout, url.redacted()),
            Err(err) => {
                let error = redact(&format!("{err:#}"), request.token.as_deref());
                return Ok(ExecutionOutcome::failure(
                    "clone failed",
                    json!({ "reason": "clone_failed", "error": error, "url": url.redacted() }),
                ));
            }
        },
    };

    let policy = if request.internal_prefixes.is_empty() {
        PackagePolicy::default()
    } else {
        PackagePolicy::new(request.internal_prefixes.clone())
    };
    let credentials = request.credentials();
    let private = request
        .private_sources
        .iter()
        .map(|url| RegistrySource::private(url, credentials.clone()))
        .collect();
    let client = NuGetClient::new(settings, RegistrySource::public(&request.nuget_url), private)?;

    let mut report = MigrationReport::new(ReportMetadata {
        repository,
        branch: match origin {
            Origin::Remote(_) => request.branch.clone(),
            Origin::Local(_) => "-".to_string(),
        },
        target_framework: target.moniker().to_string(),
        mode: request.mode,
        generated_at: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        setup_notes: setup.notes().to_vec(),
    });

    let verifier = toolchain.dotnet.as_deref().filter(|_| writes).map(|dotnet| {
        let verifier = Verifier::new(dotnet, settings.max_capture_bytes)
            .with_upgrade_assistant(toolchain.upgrade_assistant.as_deref());
        if global.verbose > 0 {
            verifier.with_full_output()
        } else {
            verifier
        }
    });

    let root = checkout.root();
    let paths = discover_descriptors(root)?;
    info!(count = paths.len(), root = %root.display(), "discovered projects");
    let mut planner = MigrationPlanner::new(&client, &policy, target, request.mode);
    for path in &paths {
        let shown = relative(root, path);
        let mut project_report = match scan(path) {
            Ok(descriptor) => {
                let mut project_report = planner.plan_project(&descriptor, &mut report);
                if let Some(verifier) = &verifier {
                    verify_project(verifier, request, path, &mut project_report);
                }
                project_report
            }
            Err(err) => {
                warn!(path = %shown, error = %format!("{err:#}"), "skipping unreadable project");
                let name = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                ProjectReport::failed(name, String::new(), format!("{err:#}"))
            }
        };
        project_report.path = shown;
        report.projects.push(project_report);
    }
    report.finalize();

    let files = write_outputs(&report, &request.output)?;
    info!(html = %files.html.display(), "report written");
    Ok(summarize(&report, &files))
}

fn clone(
    git: Option<&Path>,
    url: &RepoUrl,
    request: &MigrateRequest,
    settings: &Settings,
) -> Result<Checkout> {
    let git = git.ok_or_else(|| anyhow::anyhow!("git is not available"))?;
    Checkout::clone_remote(
        git,
        url,
        &request.branch,
        request.token.as_deref(),
        settings.max_capture_bytes,
    )
}

fn verify_project(
    verifier: &Verifier<'_>,
    request: &MigrateRequest,
    path: &Path,
    project: &mut ProjectReport,
) {
    project.build = Some(verifier.build(path));
    if request.list_packages {
        project.package_listing = Some(verifier.list_packages(path));
    }
    let needs_tool = project
        .framework
        .as_ref()
        .is_some_and(|change| change.outcome == FrameworkOutcome::RequiresUpgradeTool);
    if request.upgrade_assistant && needs_tool {
        project.analysis = verifier.analyze(path);
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn summarize(report: &MigrationReport, files: &ReportFiles) -> ExecutionOutcome {
    let verb = if report.metadata.mode.writes() {
        "migrated"
    } else {
        "analyzed"
    };
    let projects: Vec<Value> = report
        .projects
        .iter()
        .map(|project| {
            json!({
                "name": project.name,
                "path": project.path,
                "framework": project.target_frameworks.first(),
                "outcome": project.framework.as_ref().map(|change| change.outcome),
                "packages": project.packages.len(),
                "build": project.build.as_ref().map(|run| run.succeeded()),
                "error": project.error,
            })
        })
        .collect();
    ExecutionOutcome::success(
        format!(
            "{verb} {} project(s) for {}",
            report.summary.projects, report.metadata.target_framework
        ),
        json!({
            "mode": report.metadata.mode,
            "summary": report.summary,
            "outputs": files,
            "projects": projects,
            "setup_notes": report.metadata.setup_notes,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use httptest::{matchers::*, responders::*, Expectation, Server};

    fn write_project(root: &Path, rel: &str, contents: &str) -> Result<PathBuf> {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    fn local_request(mode: MigrationMode, root: &Path, output: &Path, registry: &Server) -> MigrateRequest {
        let mut request = MigrateRequest::new(mode, RepoSource::Local(root.to_path_buf()));
        request.output = output.to_path_buf();
        request.nuget_url = registry.url_str("");
        request
    }

    fn serve_newtonsoft(server: &Server) {
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/v3/registration5-semver1/newtonsoft.json/index.json",
            ))
            .respond_with(json_encoded(json!({
                "items": [{"@id": "p", "items": [
                    {"catalogEntry": {"version": "12.0.1", "dependencyGroups": [{"targetFramework": ".NETStandard2.0"}]}},
                    {"catalogEntry": {"version": "13.0.3", "dependencyGroups": [{"targetFramework": ".NETStandard2.0"}]}}
                ]}]
            }))),
        );
    }

    const API: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFramework>netcoreapp3.1</TargetFramework>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="Newtonsoft.Json" Version="12.0.1" />
    <PackageReference Include="System.Memory" Version="4.5.4" />
    <PackageReference Include="Internal.Billing" Version="1.0.0" />
  </ItemGroup>
</Project>
"#;

    #[test]
    fn analyze_reports_without_touching_the_checkout() -> Result<()> {
        let repo = tempfile::tempdir()?;
        let out = tempfile::tempdir()?;
        let api = write_project(repo.path(), "src/Api/Api.csproj", API)?;
        write_project(repo.path(), "src/Broken/Broken.csproj", "<Project><PropertyGroup></Project>")?;
        write_project(repo.path(), "src/Api/obj/Ignored.csproj", "<Project />")?;
        let server = Server::run();
        serve_newtonsoft(&server);

        let request = local_request(MigrationMode::Analyze, repo.path(), out.path(), &server);
        let outcome = run_with_settings(&GlobalOptions::default(), &request, &Settings::default())?;

        assert_eq!(outcome.status, crate::CommandStatus::Ok);
        assert_eq!(fs::read_to_string(&api)?, API);
        let summary = &outcome.details["summary"];
        assert_eq!(summary["projects"], 2);
        assert_eq!(summary["project_errors"], 1);
        assert_eq!(summary["pending_updates"], 1);
        assert_eq!(summary["pending_framework_updates"], 1);
        assert_eq!(summary["private_packages"], 1);
        assert!(out.path().join("migration-report.html").is_file());
        assert!(out.path().join("private-packages.txt").is_file());
        let paths: Vec<&str> = outcome.details["projects"]
            .as_array()
            .map(|list| list.iter().filter_map(|p| p["path"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.starts_with("src")));
        Ok(())
    }

    #[test]
    fn migrate_rewrites_descriptors() -> Result<()> {
        let repo = tempfile::tempdir()?;
        let out = tempfile::tempdir()?;
        let api = write_project(repo.path(), "Api.csproj", API)?;
        let server = Server::run();
        serve_newtonsoft(&server);

        let request = local_request(MigrationMode::Apply, repo.path(), out.path(), &server);
        let outcome = run_with_settings(&GlobalOptions::default(), &request, &Settings::default())?;

        assert_eq!(outcome.status, crate::CommandStatus::Ok);
        let rewritten = fs::read_to_string(&api)?;
        assert!(rewritten.contains("<TargetFramework>net8.0</TargetFramework>"));
        assert!(rewritten.contains(r#"Include="Newtonsoft.Json" Version="13.0.3""#));
        assert!(rewritten.contains(r#"Include="System.Memory" Version="4.5.4""#));
        assert_eq!(outcome.details["summary"]["successful_updates"], 1);
        assert_eq!(outcome.details["summary"]["framework_updates"], 1);
        Ok(())
    }

    #[test]
    fn invalid_inputs_are_user_errors() -> Result<()> {
        let out = tempfile::tempdir()?;
        let server = Server::run();
        let mut request = local_request(MigrationMode::Analyze, out.path(), out.path(), &server);
        request.target_framework = "netcoreapp3.1".into();
        let outcome = run_with_settings(&GlobalOptions::default(), &request, &Settings::default())?;
        assert_eq!(outcome.status, crate::CommandStatus::UserError);

        let mut request = MigrateRequest::new(
            MigrationMode::Analyze,
            RepoSource::Remote("not a url".into()),
        );
        request.output = out.path().to_path_buf();
        let outcome = run_with_settings(&GlobalOptions::default(), &request, &Settings::default())?;
        assert_eq!(outcome.status, crate::CommandStatus::UserError);
        assert_eq!(outcome.details["reason"], "invalid_repository_url");

        let request = local_request(
            MigrationMode::Analyze,
            &out.path().join("missing"),
            out.path(),
            &server,
        );
        let outcome = run_with_settings(&GlobalOptions::default(), &request, &Settings::default())?;
        assert_eq!(outcome.status, crate::CommandStatus::UserError);
        Ok(())
    }

    #[test]
    fn request_debug_hides_secrets() {
        let mut request =
            MigrateRequest::new(MigrationMode::Analyze, RepoSource::Local(PathBuf::from(".")));
        request.token = Some("ghp_secret".into());
        request.private_password = Some("hunter2".into());
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("ghp_secret"));
        assert!(!rendered.contains("hunter2"));
    }
}
