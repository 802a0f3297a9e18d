//! Report outputs: an HTML page for people, a JSON document for tooling and
//! a plain list of private packages.

mod html;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use netmig_domain::MigrationReport;

pub use html::render_html;

pub const HTML_REPORT: &str = "migration-report.html";
pub const JSON_REPORT: &str = "migration-report.json";
pub const PRIVATE_PACKAGES: &str = "private-packages.txt";

#[derive(Debug, Clone, Serialize)]
pub struct ReportFiles {
    pub html: PathBuf,
    pub json: PathBuf,
    pub private_packages: Option<PathBuf>,
}

/// # Errors
/// Returns an error if the report cannot be serialized.
pub fn render_json(report: &MigrationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize migration report")
}

/// One `name<TAB>version<TAB>source` line per private package, or `None`
/// when there are none.
#[must_use]
pub fn render_private_list(report: &MigrationReport) -> Option<String> {
    if report.private_packages.is_empty() {
        return None;
    }
    let mut out = String::new();
    for package in &report.private_packages {
        let source = package
            .source_url
            .as_deref()
            .unwrap_or("manual verification");
        out.push_str(&format!("{}\t{}\t{source}\n", package.name, package.version));
    }
    Some(out)
}

/// Writes every output into `dir`, creating it if needed.
///
/// # Errors
/// Returns an error when the directory or any file cannot be written.
pub fn write_outputs(report: &MigrationReport, dir: &Path) -> Result<ReportFiles> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let html = dir.join(HTML_REPORT);
    fs::write(&html, render_html(report))
        .with_context(|| format!("failed to write {}", html.display()))?;
    let json = dir.join(JSON_REPORT);
    fs::write(&json, render_json(report)?)
        .with_context(|| format!("failed to write {}", json.display()))?;
    let private_packages = match render_private_list(report) {
        Some(list) => {
            let path = dir.join(PRIVATE_PACKAGES);
            fs::write(&path, list).with_context(|| format!("failed to write {}", path.display()))?;
            Some(path)
        }
        None => None,
    };
    Ok(ReportFiles {
        html,
        json,
        private_packages,
    })
}
