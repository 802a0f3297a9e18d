use std::path::Path;

use tracing::{debug, warn};

use netmig_domain::ToolRun;

use crate::process::{run_command, tail_lines};

pub const BUILD_TAIL_LINES: usize = 40;

/// Runs the dotnet CLI (and optionally upgrade-assistant) against single
/// projects and captures the results for the report.
#[derive(Debug, Clone)]
pub struct Verifier<'a> {
    dotnet: &'a Path,
    upgrade_assistant: Option<&'a Path>,
    capture_limit: usize,
    tail: usize,
}

impl<'a> Verifier<'a> {
    #[must_use]
    pub fn new(dotnet: &'a Path, capture_limit: usize) -> Self {
        Self {
            dotnet,
            upgrade_assistant: None,
            capture_limit,
            tail: BUILD_TAIL_LINES,
        }
    }

    #[must_use]
    pub fn with_upgrade_assistant(mut self, tool: Option<&'a Path>) -> Self {
        self.upgrade_assistant = tool;
        self
    }

    /// Keeps every captured line instead of the default tail.
    #[must_use]
    pub fn with_full_output(mut self) -> Self {
        self.tail = usize::MAX;
        self
    }

    /// `dotnet restore` followed by `dotnet build --no-restore`. A failed
    /// restore is reported as is; the build is not attempted.
    #[must_use]
    pub fn build(&self, project: &Path) -> ToolRun {
        let restore = self.run(self.dotnet, &["restore"], project, &[]);
        if !restore.succeeded() {
            warn!(project = %project.display(), code = restore.exit_code, "restore failed");
            return restore;
        }
        let build = self.run(self.dotnet, &["build"], project, &["--no-restore"]);
        if !build.succeeded() {
            warn!(project = %project.display(), code = build.exit_code, "build failed");
        }
        build
    }

    #[must_use]
    pub fn list_packages(&self, project: &Path) -> ToolRun {
        self.run(
            self.dotnet,
            &["list"],
            project,
            &["package", "--include-transitive"],
        )
    }

    /// `upgrade-assistant analyze`, or `None` when the tool is unavailable.
    #[must_use]
    pub fn analyze(&self, project: &Path) -> Option<ToolRun> {
        let tool = self.upgrade_assistant?;
        Some(self.run(tool, &["analyze"], project, &["--non-interactive"]))
    }

    fn run(&self, program: &Path, before: &[&str], project: &Path, after: &[&str]) -> ToolRun {
        let mut args: Vec<String> = before.iter().map(ToString::to_string).collect();
        args.push(project.to_string_lossy().into_owned());
        args.extend(after.iter().map(ToString::to_string));
        let tool = program
            .file_stem()
            .map_or_else(|| program.to_string_lossy(), |stem| stem.to_string_lossy());
        let command = format!("{tool} {}", args.join(" "));
        let cwd = project.parent().unwrap_or_else(|| Path::new("."));
        debug!(%command, "running");
        match run_command(
            &program.to_string_lossy(),
            &args,
            &[("DOTNET_CLI_TELEMETRY_OPTOUT", "1"), ("DOTNET_NOLOGO", "1")],
            cwd,
            self.capture_limit,
        ) {
            Ok(output) => ToolRun {
                command,
                exit_code: output.code,
                output: tail_lines(&output.combined(), self.tail),
            },
            Err(err) => ToolRun {
                command,
                exit_code: -1,
                output: format!("{err:#}"),
            },
        }
    }
}
