// Output formatting utilities

use serde::Serialize;
use std::io::IsTerminal;
use crate::engine::PassReport;
use crate::models::{JobIds, RecordRow, Stage, Status};

// ANSI escape codes for terminal formatting
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_RESET: &str = "\x1b[0m";
const ANSI_FG_RED: &str = "\x1b[31m";
const ANSI_FG_GREEN: &str = "\x1b[32m";
const ANSI_FG_YELLOW: &str = "\x1b[33m";

/// Separator between fields of the file report
pub const REPORT_SEPARATOR: &str = " ; ";

/// Check if stdout is a terminal (TTY)
pub fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width dynamically
///
/// Uses the `terminal_size` crate for reliable detection, with fallback to
/// COLUMNS environment variable and a sensible default.
pub fn get_terminal_width() -> usize {
    if let Some((terminal_size::Width(w), _)) = terminal_size::terminal_size() {
        if w > 0 {
            return w as usize;
        }
    }

    if let Ok(cols) = std::env::var("COLUMNS") {
        if let Ok(width) = cols.parse::<usize>() {
            if width > 0 && width < 10000 {
                return width;
            }
        }
    }

    120
}

/// Stage name, or a marker for values outside 1..=5
pub fn stage_label(code: i64) -> String {
    match Stage::from_i64(code) {
        Some(stage) => stage.name().to_string(),
        None => format!("Unknown ({})", code),
    }
}

/// Status name, or a marker for values outside 0..=5
pub fn status_label(code: i64) -> String {
    match Status::from_i64(code) {
        Some(status) => status.name().to_string(),
        None => format!("Unknown ({})", code),
    }
}

/// One line per record: `directory ; stage-name ; status-name ; jobIDs`
pub fn format_dump_report(rows: &[RecordRow]) -> String {
    let mut out = String::new();
    for row in rows {
        let fields = [
            row.directory.clone(),
            stage_label(row.stage),
            status_label(row.status),
            row.job_ids.clone(),
        ];
        out.push_str(&fields.join(REPORT_SEPARATOR));
        out.push('\n');
    }
    out
}

#[derive(Debug, Serialize)]
struct DumpEntry<'a> {
    directory: &'a str,
    stage: i64,
    stage_name: String,
    status: i64,
    status_name: String,
    job_ids: JobIds,
}

/// Records as a JSON array
pub fn format_dump_json(rows: &[RecordRow]) -> serde_json::Result<String> {
    let entries: Vec<DumpEntry> = rows
        .iter()
        .map(|row| DumpEntry {
            directory: &row.directory,
            stage: row.stage,
            stage_name: stage_label(row.stage),
            status: row.status,
            status_name: status_label(row.status),
            job_ids: JobIds::parse(&row.job_ids),
        })
        .collect();
    serde_json::to_string_pretty(&entries)
}

fn status_color(code: i64) -> Option<&'static str> {
    match Status::from_i64(code) {
        Some(Status::Failed) | None => Some(ANSI_FG_RED),
        Some(Status::Done) => Some(ANSI_FG_GREEN),
        Some(Status::InProgress) => Some(ANSI_FG_YELLOW),
        _ => None,
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let keep = width.saturating_sub(3);
    format!("{}...", text.chars().take(keep).collect::<String>())
}

/// Human-readable table of all records
pub fn format_dump_table(rows: &[RecordRow], use_color: bool, terminal_width: usize) -> String {
    if rows.is_empty() {
        return "No tasks tracked.".to_string();
    }

    let headers = ["Directory", "Stage", "Status", "Job IDs"];
    let cells: Vec<[String; 4]> = rows
        .iter()
        .map(|row| [
            row.directory.clone(),
            stage_label(row.stage),
            status_label(row.status),
            row.job_ids.clone(),
        ])
        .collect();

    let mut widths = headers.map(|h| h.len());
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    // Long directory names give way first when the terminal is narrow
    let fixed: usize = widths[1..].iter().sum::<usize>() + 2 * 3;
    if fixed + widths[0] > terminal_width {
        widths[0] = terminal_width.saturating_sub(fixed).max(headers[0].len());
    }

    let mut out = String::from("Current status:\n");
    let header = format!(
        "{:<w0$}  {:<w1$}  {:<w2$}  {}",
        headers[0], headers[1], headers[2], headers[3],
        w0 = widths[0], w1 = widths[1], w2 = widths[2]
    );
    if use_color {
        out.push_str(&format!("{}{}{}\n", ANSI_BOLD, header.trim_end(), ANSI_RESET));
    } else {
        out.push_str(header.trim_end());
        out.push('\n');
    }

    for (row, cell) in rows.iter().zip(&cells) {
        let status = format!("{:<w$}", cell[2], w = widths[2]);
        let status = match status_color(row.status) {
            Some(color) if use_color => format!("{}{}{}", color, status, ANSI_RESET),
            _ => status,
        };
        let line = format!(
            "{:<w0$}  {:<w1$}  {}  {}",
            truncate(&cell[0], widths[0]), cell[1], status, cell[3],
            w0 = widths[0], w1 = widths[1]
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Console summary of an engine pass
pub fn format_pass_report(report: &PassReport) -> String {
    let mut out = String::new();
    for t in &report.transitions {
        out.push_str(&format!(
            "{}: {} / {} -> {} / {}\n",
            t.directory, t.from.0, t.from.1, t.to.0, t.to.1
        ));
    }
    for d in &report.deferred {
        out.push_str(&format!("{}: submission deferred ({})\n", d.directory, d.message));
    }
    out.push_str(&report.summary());
    out.push('\n');
    out
}
