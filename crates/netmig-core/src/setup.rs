//! External tool discovery, done once before any project is touched.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Settings;
use crate::process::run_command;

pub const UPGRADE_ASSISTANT_PACKAGE: &str = "upgrade-assistant";

/// What the run needs from the machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetupRequirements {
    pub clone: bool,
    pub build: bool,
    pub upgrade_assistant: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Toolchain {
    pub git: Option<PathBuf>,
    pub dotnet: Option<PathBuf>,
    pub upgrade_assistant: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SetupStatus {
    Ready { toolchain: Toolchain },
    /// Usable, but some optional step will be skipped.
    Degraded { toolchain: Toolchain, notes: Vec<String> },
    Fatal { reason: String },
}

impl SetupStatus {
    #[must_use]
    pub fn toolchain(&self) -> Option<&Toolchain> {
        match self {
            Self::Ready { toolchain } | Self::Degraded { toolchain, .. } => Some(toolchain),
            Self::Fatal { .. } => None,
        }
    }

    #[must_use]
    pub fn notes(&self) -> &[String] {
        match self {
            Self::Degraded { notes, .. } => notes,
            _ => &[],
        }
    }
}

/// Locates the tools on `PATH`, installing upgrade-assistant when it was
/// requested and is missing.
#[must_use]
pub fn prepare(requirements: SetupRequirements, settings: &Settings) -> SetupStatus {
    assess(
        requirements,
        &|name| which::which(name).ok(),
        &|dotnet| install_upgrade_assistant(dotnet, settings),
    )
}

fn assess(
    requirements: SetupRequirements,
    locate: &dyn Fn(&str) -> Option<PathBuf>,
    install: &dyn Fn(&Path) -> Result<()>,
) -> SetupStatus {
    let mut toolchain = Toolchain::default();
    let mut notes = Vec::new();

    if requirements.clone {
        toolchain.git = locate("git");
        if toolchain.git.is_none() {
            return SetupStatus::Fatal {
                reason: "git was not found on PATH; it is required to clone the repository"
                    .to_string(),
            };
        }
    }

    if requirements.build || requirements.upgrade_assistant {
        toolchain.dotnet = locate("dotnet");
        if toolchain.dotnet.is_none() {
            notes.push("dotnet was not found on PATH; build verification skipped".to_string());
        }
    }

    if requirements.upgrade_assistant {
        toolchain.upgrade_assistant = locate(UPGRADE_ASSISTANT_PACKAGE);
        match (toolchain.upgrade_assistant.is_some(), toolchain.dotnet.clone()) {
            (true, _) => {}
            (false, Some(dotnet)) => {
                info!("installing {UPGRADE_ASSISTANT_PACKAGE}");
                match install(&dotnet) {
                    Ok(()) => {
                        toolchain.upgrade_assistant = locate(UPGRADE_ASSISTANT_PACKAGE);
                        if toolchain.upgrade_assistant.is_none() {
                            notes.push(format!(
                                "{UPGRADE_ASSISTANT_PACKAGE} was installed but is not on PATH; analysis skipped"
                            ));
                        }
                    }
                    Err(err) => {
                        warn!(error = %format!("{err:#}"), "tool install failed");
                        notes.push(format!(
                            "{UPGRADE_ASSISTANT_PACKAGE} could not be installed: {err}; analysis skipped"
                        ));
                    }
                }
            }
            (false, None) => notes.push(format!(
                "{UPGRADE_ASSISTANT_PACKAGE} needs dotnet to install; analysis skipped"
            )),
        }
    }

    if notes.is_empty() {
        SetupStatus::Ready { toolchain }
    } else {
        SetupStatus::Degraded { toolchain, notes }
    }
}

fn install_upgrade_assistant(dotnet: &Path, settings: &Settings) -> Result<()> {
    let program = dotnet.to_string_lossy();
    let args = ["tool", "install", "-g", UPGRADE_ASSISTANT_PACKAGE].map(String::from);
    let output = run_command(
        &program,
        &args,
        &[],
        Path::new("."),
        settings.max_capture_bytes,
    )?;
    if !output.succeeded() {
        bail!(
            "`dotnet tool install` exited with {}: {}",
            output.code,
            output.stderr.trim()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn on_path(tools: &'static [&'static str]) -> impl Fn(&str) -> Option<PathBuf> {
        move |name: &str| {
            tools
                .iter()
                .any(|tool| *tool == name)
                .then(|| PathBuf::from(format!("/usr/bin/{name}")))
        }
    }

    fn no_install(_: &Path) -> Result<()> {
        panic!("install should not run");
    }

    #[test]
    fn missing_git_is_fatal_when_cloning() {
        let status = assess(
            SetupRequirements {
                clone: true,
                ..SetupRequirements::default()
            },
            &on_path(&["dotnet"]),
            &no_install,
        );
        assert!(matches!(status, SetupStatus::Fatal { .. }));
        assert!(status.toolchain().is_none());
    }

    #[test]
    fn local_analysis_needs_nothing() {
        let status = assess(SetupRequirements::default(), &on_path(&[]), &no_install);
        assert!(matches!(status, SetupStatus::Ready { .. }));
    }

    #[test]
    fn missing_dotnet_degrades() {
        let status = assess(
            SetupRequirements {
                clone: true,
                build: true,
                upgrade_assistant: true,
            },
            &on_path(&["git"]),
            &no_install,
        );
        let SetupStatus::Degraded { toolchain, notes } = status else {
            panic!("expected degraded setup");
        };
        assert!(toolchain.git.is_some());
        assert!(toolchain.dotnet.is_none());
        assert_eq!(notes.len(), 2);
    }

    #[test]
    fn failed_install_degrades_with_a_note() {
        let attempts = Cell::new(0);
        let status = assess(
            SetupRequirements {
                build: true,
                upgrade_assistant: true,
                ..SetupRequirements::default()
            },
            &on_path(&["dotnet"]),
            &|_| {
                attempts.set(attempts.get() + 1);
                bail!("feed unreachable")
            },
        );
        assert_eq!(attempts.get(), 1);
        assert_eq!(status.notes().len(), 1);
        assert!(status.notes()[0].contains("feed unreachable"));
    }

    #[test]
    fn present_tools_are_ready() {
        let status = assess(
            SetupRequirements {
                clone: true,
                build: true,
                upgrade_assistant: true,
            },
            &on_path(&["git", "dotnet", "upgrade-assistant"]),
            &no_install,
        );
        let toolchain = status.toolchain().expect("toolchain");
        assert!(toolchain.upgrade_assistant.is_some());
        assert!(status.notes().is_empty());
    }
}
