//! Output formatting for CLI commands: tables, JSON, sizes and timestamps.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use concord_lifecycle::ContractStatus;
use serde::Serialize;

/// Format a byte count in human-readable form ("1.5 KB").
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// "5 minutes ago" for the last week, an absolute local date beyond that.
pub fn format_time(time: DateTime<Utc>) -> String {
    format_time_at(time, Utc::now())
}

fn format_time_at(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - time).num_seconds();
    if secs < 0 {
        return "just now".to_string();
    }

    let plural = |n: i64, unit: &str| format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" });
    match secs {
        0..=59 => plural(secs, "second"),
        60..=3599 => plural(secs / 60, "minute"),
        3600..=86_399 => plural(secs / 3600, "hour"),
        86_400..=604_799 => plural(secs / 86_400, "day"),
        _ => time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    }
}

pub fn status_color(status: ContractStatus) -> Color {
    match status {
        ContractStatus::Pending => Color::Yellow,
        ContractStatus::Edited => Color::Blue,
        ContractStatus::Approved => Color::Cyan,
        ContractStatus::Complete => Color::Green,
        ContractStatus::Signed => Color::DarkGreen,
        ContractStatus::Denied => Color::Red,
    }
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Print a table with headers and rows.
pub fn print_table(headers: &[&str], rows: Vec<Vec<Cell>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{}", table);
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
