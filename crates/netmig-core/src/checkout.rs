//! Getting a working copy of the repository to migrate.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::json;
use tempfile::TempDir;
use tracing::info;
use url::Url;

use crate::outcome::ExecutionOutcome;
use crate::process::run_command;

/// A repository URL that passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoUrl {
    /// `https://`, `http://`, `ssh://`, `git://` or `file://`.
    Url(Url),
    /// scp-like `user@host:path`.
    Scp(String),
}

impl RepoUrl {
    /// Form safe to print and store: any user info is stripped.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Url(url) => {
                let mut cleaned = url.clone();
                let _ = cleaned.set_username("");
                let _ = cleaned.set_password(None);
                cleaned.to_string()
            }
            Self::Scp(raw) => raw.clone(),
        }
    }

    /// Clone URL with the token as password. Only http(s) URLs carry it.
    #[must_use]
    pub fn with_token(&self, token: Option<&str>) -> String {
        match (self, token.map(str::trim).filter(|t| !t.is_empty())) {
            (Self::Url(url), Some(token)) if matches!(url.scheme(), "http" | "https") => {
                let mut authed = url.clone();
                if authed.username().is_empty() {
                    let _ = authed.set_username("pat");
                }
                let _ = authed.set_password(Some(token));
                authed.to_string()
            }
            (Self::Url(url), _) => url.to_string(),
            (Self::Scp(raw), _) => raw.clone(),
        }
    }
}

/// Checks the URL shape before anything is cloned.
///
/// # Errors
/// Returns a user-error outcome describing the accepted shapes.
pub fn validate_repo_url(raw: &str) -> Result<RepoUrl, ExecutionOutcome> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| {
        ExecutionOutcome::user_error(
            "invalid repository URL",
            json!({
                "reason": "invalid_repository_url",
                "url": redact_user_info(trimmed),
                "error": reason,
                "hint": "use https://host/org/repo.git, ssh://git@host/org/repo.git, git@host:org/repo.git or file:///path/to/repo",
            }),
        )
    };
    if trimmed.is_empty() {
        return Err(invalid("empty URL"));
    }
    if !trimmed.contains("://") {
        return if is_scp_like(trimmed) {
            Ok(RepoUrl::Scp(trimmed.to_string()))
        } else {
            Err(invalid("not a URL"))
        };
    }
    let url = Url::parse(trimmed).map_err(|err| invalid(&err.to_string()))?;
    match url.scheme() {
        "https" | "http" | "ssh" | "git" => {
            if url.host_str().map_or(true, str::is_empty) {
                return Err(invalid("missing host"));
            }
        }
        "file" => {}
        other => return Err(invalid(&format!("unsupported scheme `{other}`"))),
    }
    if url.path().trim_matches('/').is_empty() {
        return Err(invalid("missing repository path"));
    }
    Ok(RepoUrl::Url(url))
}

fn is_scp_like(raw: &str) -> bool {
    let Some((user_host, path)) = raw.split_once(':') else {
        return false;
    };
    let Some((user, host)) = user_host.split_once('@') else {
        return false;
    };
    !user.is_empty()
        && !host.is_empty()
        && !host.contains('/')
        && !path.is_empty()
        && !raw.chars().any(char::is_whitespace)
}

fn redact_user_info(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

/// Replaces every occurrence of `secret` with `***`.
#[must_use]
pub fn redact(text: &str, secret: Option<&str>) -> String {
    match secret.map(str::trim).filter(|s| !s.is_empty()) {
        Some(secret) => text.replace(secret, "***"),
        None => text.to_string(),
    }
}

/// The directory projects are discovered in. A clone lives in a temporary
/// directory that is removed on drop; removal failures are ignored.
#[derive(Debug)]
pub struct Checkout {
    root: PathBuf,
    _scratch: Option<TempDir>,
}

impl Checkout {
    /// Uses an existing directory in place.
    ///
    /// # Errors
    /// Returns an error when `path` is not a directory.
    pub fn local(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            bail!("{} is not a directory", path.display());
        }
        let root = path
            .canonicalize()
            .with_context(|| format!("failed to resolve {}", path.display()))?;
        Ok(Self {
            root,
            _scratch: None,
        })
    }

    /// Shallow-clones `branch` of `url` into a fresh temporary directory.
    ///
    /// # Errors
    /// Returns an error when git cannot be started or exits non-zero. The
    /// token never appears in the error text.
    pub fn clone_remote(
        git: &Path,
        url: &RepoUrl,
        branch: &str,
        token: Option<&str>,
        capture_limit: usize,
    ) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("netmig-")
            .tempdir()
            .context("failed to create a scratch directory")?;
        let root = scratch.path().join("repo");
        info!(url = %url.redacted(), branch, "cloning");
        let args = vec![
            "clone".to_string(),
            "--depth".to_string(),
            "1".to_string(),
            "--branch".to_string(),
            branch.to_string(),
            url.with_token(token),
            root.to_string_lossy().into_owned(),
        ];
        let output = run_command(
            &git.to_string_lossy(),
            &args,
            &[("GIT_TERMINAL_PROMPT", "0")],
            scratch.path(),
            capture_limit,
        )?;
        if !output.succeeded() {
            bail!(
                "git clone exited with {}: {}",
                output.code,
                redact(output.stderr.trim(), token)
            );
        }
        Ok(Self {
            root,
            _scratch: Some(scratch),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
