use quick_xml::escape::escape;

use netmig_domain::{
    FrameworkChange, FrameworkOutcome, MigrationReport, PackageUpdate, ProjectReport, ToolRun,
};

const STYLE: &str = r"
body { font-family: system-ui, -apple-system, 'Segoe UI', sans-serif; margin: 2rem; color: #1f2933; }
h1 { margin-bottom: 0.25rem; }
table { border-collapse: collapse; margin: 0.75rem 0 1.5rem; min-width: 40rem; }
th, td { border: 1px solid #d9e2ec; padding: 0.35rem 0.6rem; text-align: left; vertical-align: top; }
th { background: #f0f4f8; }
.compatible { color: #1b7f3b; }
.incompatible { color: #b42318; }
.unknown { color: #8a6d00; }
.error { color: #b42318; }
.meta { color: #52606d; }
pre { background: #f5f7fa; padding: 0.75rem; overflow-x: auto; max-height: 24rem; }
";

/// Renders the whole report as a standalone HTML page.
#[must_use]
pub fn render_html(report: &MigrationReport) -> String {
    let meta = &report.metadata;
    let mut out = String::new();
    out.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\" />\n");
    out.push_str(&format!(
        "<title>Migration report: {}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n",
        e(&meta.repository)
    ));
    out.push_str(&format!(
        "<h1>Migration report</h1>\n<p class=\"meta\">{} &middot; branch {} &middot; target {} &middot; {} mode &middot; {}</p>\n",
        e(&meta.repository),
        e(&meta.branch),
        e(&meta.target_framework),
        mode_label(report),
        e(&meta.generated_at),
    ));

    if !meta.setup_notes.is_empty() {
        out.push_str("<h2>Setup</h2>\n<ul>\n");
        for note in &meta.setup_notes {
            out.push_str(&format!("<li>{}</li>\n", e(note)));
        }
        out.push_str("</ul>\n");
    }

    summary(&mut out, report);
    for project in &report.projects {
        project_section(&mut out, report, project);
    }
    framework_section(&mut out, &report.framework_updates);
    update_section(&mut out, "Package updates", &report.successful_updates);
    update_section(&mut out, "Pending package updates", &report.pending_updates);

    if !report.failed_updates.is_empty() {
        out.push_str("<h2>Failed updates</h2>\n<table>\n<tr><th>Package</th><th>Version</th><th>Project</th><th>Reason</th></tr>\n");
        for failed in &report.failed_updates {
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                e(&failed.package),
                e(&failed.version),
                e(&failed.project),
                e(&failed.reason)
            ));
        }
        out.push_str("</table>\n");
    }

    if !report.private_packages.is_empty() {
        out.push_str("<h2>Private packages</h2>\n<table>\n<tr><th>Package</th><th>Version</th><th>Latest</th><th>Source</th></tr>\n");
        for package in &report.private_packages {
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                e(&package.name),
                e(&package.version),
                e(package.latest_version.as_deref().unwrap_or("-")),
                e(package.source_url.as_deref().unwrap_or("manual verification"))
            ));
        }
        out.push_str("</table>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn e(text: &str) -> std::borrow::Cow<'_, str> {
    escape(text)
}

fn mode_label(report: &MigrationReport) -> &'static str {
    if report.metadata.mode.writes() {
        "migrate"
    } else {
        "analyze"
    }
}

fn summary(out: &mut String, report: &MigrationReport) {
    let s = &report.summary;
    let rows = [
        ("Projects", s.projects),
        ("Projects needing migration", s.projects_needing_migration),
        ("Project errors", s.project_errors),
        ("Framework updates", s.framework_updates),
        ("Pending framework updates", s.pending_framework_updates),
        ("Packages", s.packages),
        ("Successful package updates", s.successful_updates),
        ("Pending package updates", s.pending_updates),
        ("Failed package updates", s.failed_updates),
        ("Private packages", s.private_packages),
        ("Build failures", s.build_failures),
    ];
    out.push_str("<h2>Summary</h2>\n<table>\n");
    for (label, count) in rows {
        out.push_str(&format!("<tr><th>{label}</th><td>{count}</td></tr>\n"));
    }
    out.push_str("</table>\n");
}

fn project_section(out: &mut String, report: &MigrationReport, project: &ProjectReport) {
    out.push_str(&format!(
        "<h2>{}</h2>\n<p class=\"meta\">{}",
        e(&project.name),
        e(&project.path)
    ));
    if !project.target_frameworks.is_empty() {
        out.push_str(&format!(
            " &middot; {}",
            e(&project.target_frameworks.join(";"))
        ));
    }
    if project.needs_migration {
        out.push_str(" &middot; needs migration");
    }
    out.push_str("</p>\n");

    if let Some(error) = &project.error {
        out.push_str(&format!("<p class=\"error\">{}</p>\n", e(error)));
        return;
    }
    if let Some(change) = &project.framework {
        out.push_str(&format!("<p>Framework: {}</p>\n", framework_text(change)));
    }

    if !project.packages.is_empty() {
        out.push_str("<table>\n<tr><th>Package</th><th>Current</th><th>Latest</th><th>Compatibility</th><th>Private</th><th>Notes</th></tr>\n");
        for key in &project.packages {
            let Some(record) = report.record(key) else {
                continue;
            };
            let verdict = record.verdict.label();
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"{verdict}\">{verdict}</td><td>{}</td><td>{}</td></tr>\n",
                e(&record.name),
                e(&record.current_version),
                e(record.latest_version.as_deref().unwrap_or("-")),
                if record.is_private() { "yes" } else { "no" },
                e(&record.notes.join("; "))
            ));
        }
        out.push_str("</table>\n");
    }

    for (title, run) in [
        ("Build", &project.build),
        ("Package listing", &project.package_listing),
        ("Upgrade analysis", &project.analysis),
    ] {
        if let Some(run) = run {
            tool_run(out, title, run);
        }
    }
}

fn tool_run(out: &mut String, title: &str, run: &ToolRun) {
    let status = if run.succeeded() {
        "succeeded".to_string()
    } else {
        format!("failed (exit {})", run.exit_code)
    };
    out.push_str(&format!(
        "<h3>{title}: {status}</h3>\n<p class=\"meta\"><code>{}</code></p>\n<pre>{}</pre>\n",
        e(&run.command),
        e(&run.output)
    ));
}

fn framework_text(change: &FrameworkChange) -> String {
    let from = e(change.from.as_deref().unwrap_or("none"));
    match change.outcome {
        FrameworkOutcome::Updated => format!("{from} &rarr; {}", e(&change.to)),
        FrameworkOutcome::Pending => format!("{from} &rarr; {} (pending)", e(&change.to)),
        FrameworkOutcome::AlreadyCurrent => format!("{from} (current)"),
        FrameworkOutcome::RequiresUpgradeTool => {
            format!("{from} (needs the upgrade assistant)")
        }
        FrameworkOutcome::NotRewritten => format!("{from} (could not be rewritten)"),
        FrameworkOutcome::NoFramework => "not declared".to_string(),
    }
}

fn framework_section(out: &mut String, changes: &[FrameworkChange]) {
    if changes.is_empty() {
        return;
    }
    out.push_str("<h2>Framework changes</h2>\n<table>\n<tr><th>Project</th><th>Change</th></tr>\n");
    for change in changes {
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            e(&change.project),
            framework_text(change)
        ));
    }
    out.push_str("</table>\n");
}

fn update_section(out: &mut String, title: &str, updates: &[PackageUpdate]) {
    if updates.is_empty() {
        return;
    }
    out.push_str(&format!(
        "<h2>{title}</h2>\n<table>\n<tr><th>Package</th><th>From</th><th>To</th><th>Project</th></tr>\n"
    ));
    for update in updates {
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            e(&update.package),
            e(&update.from),
            e(&update.to),
            e(&update.project)
        ));
    }
    out.push_str("</table>\n");
}
