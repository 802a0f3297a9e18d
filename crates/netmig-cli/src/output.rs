use atty::Stream;
use color_eyre::Result;
use netmig_core::{CommandStatus, ExecutionOutcome};
use serde_json::{json, Value};

use crate::style::Style;

#[derive(Clone, Copy, Debug)]
pub struct OutputOptions {
    pub quiet: bool,
    pub json: bool,
    pub no_color: bool,
}

pub fn exit_code(status: CommandStatus) -> i32 {
    match status {
        CommandStatus::Ok => 0,
        CommandStatus::UserError => 1,
        CommandStatus::Failure => 2,
    }
}

pub fn emit_output(opts: &OutputOptions, command: &str, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = exit_code(outcome.status);
    let style = Style::new(opts.no_color, atty::is(Stream::Stdout));

    if opts.json {
        let payload = to_json_response(command, outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    let message = format!("netmig {command}: {}", outcome.message);
    if outcome.status != CommandStatus::Ok {
        eprintln!("{}", style.status(&outcome.status, &message));
        if let Some(error) = string_detail(&outcome.details, "error") {
            eprintln!("  {error}");
        }
        if let Some(hint) = string_detail(&outcome.details, "hint") {
            eprintln!("{}", style.info(&format!("Hint: {hint}")));
        }
        return Ok(code);
    }
    if opts.quiet {
        return Ok(code);
    }

    println!("{}", style.status(&outcome.status, &message));
    if let Some(notes) = outcome.details.get("setup_notes").and_then(Value::as_array) {
        for note in notes.iter().filter_map(Value::as_str) {
            println!("{}", style.warning(&format!("note: {note}")));
        }
    }
    if let Some(table) = render_project_table(&style, &outcome.details) {
        println!("{table}");
    }
    if let Some(html) = outcome
        .details
        .get("outputs")
        .and_then(|outputs| outputs.get("html"))
        .and_then(Value::as_str)
    {
        println!("{}", style.info(&format!("Report: {html}")));
    }
    Ok(code)
}

pub fn to_json_response(command: &str, outcome: &ExecutionOutcome) -> Value {
    let status = match outcome.status {
        CommandStatus::Ok => "ok",
        CommandStatus::UserError => "user-error",
        CommandStatus::Failure => "error",
    };
    let details = match &outcome.details {
        Value::Object(_) => outcome.details.clone(),
        Value::Null => json!({}),
        other => json!({ "value": other }),
    };
    json!({
        "status": status,
        "message": format!("netmig {command}: {}", outcome.message),
        "details": details,
    })
}

fn string_detail<'a>(details: &'a Value, key: &str) -> Option<&'a str> {
    details
        .as_object()
        .and_then(|map| map.get(key))
        .and_then(Value::as_str)
}

struct ProjectRow {
    path: String,
    framework: String,
    outcome: String,
    packages: String,
    build: (String, Option<bool>),
}

fn render_project_table(style: &Style, details: &Value) -> Option<String> {
    let projects = details.get("projects")?.as_array()?;
    if projects.is_empty() {
        return None;
    }
    let rows: Vec<ProjectRow> = projects.iter().filter_map(project_row).collect();
    Some(format_project_table(style, &rows))
}

fn project_row(project: &Value) -> Option<ProjectRow> {
    let obj = project.as_object()?;
    let path = obj.get("path")?.as_str()?.to_string();
    let error = obj.get("error").and_then(Value::as_str);
    let outcome = match error {
        Some(_) => "error".to_string(),
        None => obj
            .get("outcome")
            .and_then(Value::as_str)
            .unwrap_or("-")
            .replace('_', " "),
    };
    let build = match obj.get("build").and_then(Value::as_bool) {
        Some(true) => ("ok".to_string(), Some(true)),
        Some(false) => ("failed".to_string(), Some(false)),
        None => ("-".to_string(), None),
    };
    Some(ProjectRow {
        path,
        framework: obj
            .get("framework")
            .and_then(Value::as_str)
            .unwrap_or("-")
            .to_string(),
        outcome,
        packages: obj
            .get("packages")
            .and_then(Value::as_u64)
            .unwrap_or(0)
            .to_string(),
        build,
    })
}

fn format_project_table(style: &Style, rows: &[ProjectRow]) -> String {
    let headers = ["Project", "Framework", "Outcome", "Packages", "Build"];
    let mut widths = headers.map(str::len);
    for row in rows {
        widths[0] = widths[0].max(row.path.len());
        widths[1] = widths[1].max(row.framework.len());
        widths[2] = widths[2].max(row.outcome.len());
        widths[3] = widths[3].max(row.packages.len());
        widths[4] = widths[4].max(row.build.0.len());
    }

    let header_line = format!(
        "{:<w0$}  {:<w1$}  {:<w2$}  {:<w3$}  {:<w4$}",
        headers[0],
        headers[1],
        headers[2],
        headers[3],
        headers[4],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
        w4 = widths[4],
    );

    let mut lines = Vec::new();
    lines.push(style.table_header(header_line.trim_end()));
    lines.push(format!(
        "{:-<w0$}  {:-<w1$}  {:-<w2$}  {:-<w3$}  {:-<w4$}",
        "",
        "",
        "",
        "",
        "",
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
        w4 = widths[4],
    ));
    for row in rows {
        let (build, ok) = &row.build;
        lines.push(format!(
            "{:<w0$}  {:<w1$}  {:<w2$}  {:>w3$}  {}",
            row.path,
            row.framework,
            row.outcome,
            row.packages,
            style.cell(build, *ok),
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
        ));
    }
    lines.join("\n")
}
