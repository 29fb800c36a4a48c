use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, CellAlignment, ContentArrangement, Table};

use crate::period::ReportPeriod;
use crate::types::{ReportKind, UsageRecord};

fn format_hours(seconds: f64) -> String {
    format!("{:.1}", seconds / 3600.0)
}

fn format_optional_hours(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) => format_hours(s),
        None => "N/A".to_string(),
    }
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

fn headers(kind: ReportKind) -> Vec<&'static str> {
    let mut h = vec!["Tier", "VO"];
    if kind == ReportKind::Detailed {
        h.extend(["User", "Group", "Role"]);
    }
    h.extend(["Jobs", "CPU h", "Norm CPU h", "Wall h", "Norm Wall h"]);
    h
}

fn numeric(s: String) -> Cell {
    Cell::new(s).set_alignment(CellAlignment::Right)
}

fn entry_row(kind: ReportKind, e: &UsageRecord) -> Vec<Cell> {
    let mut row = vec![Cell::new(e.site.name()), Cell::new(or_dash(e.vo_name.as_deref()))];
    if kind == ReportKind::Detailed {
        row.push(Cell::new(or_dash(e.user_identity.as_deref())));
        row.push(Cell::new(or_dash(e.vo_group.as_deref())));
        row.push(Cell::new(or_dash(e.vo_role.as_deref())));
    }
    row.push(numeric(e.n_jobs.to_string()));
    row.push(numeric(format_hours(e.cpu_duration)));
    row.push(numeric(format_optional_hours(e.norm_cpu_duration)));
    row.push(numeric(format_hours(e.wall_duration)));
    row.push(numeric(format_optional_hours(e.norm_wall_duration)));
    row
}

pub fn print_table(entries: &[UsageRecord], kind: ReportKind, period: &ReportPeriod) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(headers(kind));

    let mut totals: Option<UsageRecord> = None;
    for e in entries {
        table.add_row(entry_row(kind, e));
        match totals.as_mut() {
            Some(t) => t.absorb(e),
            None => totals = Some(e.clone()),
        }
    }

    if let Some(mut t) = totals {
        t.site = crate::types::Site::Tier("TOTAL".to_string());
        t.vo_name = None;
        t.user_identity = None;
        t.vo_group = None;
        t.vo_role = None;
        table.add_row(entry_row(kind, &t));
    }

    println!(
        "{} report {} .. {}",
        match kind {
            ReportKind::Tier => "Tier",
            ReportKind::Detailed => "User",
        },
        period.start_str(),
        period.end_str()
    );
    println!("{table}");
}

pub fn print_json(entries: &[UsageRecord], kind: ReportKind, period: &ReportPeriod) -> Result<()> {
    let json = serde_json::json!({
        "kind": kind,
        "year": period.year,
        "month": period.month,
        "period_start": period.start_str(),
        "period_end": period.end_str(),
        "entries": entries,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&json).context("failed to serialize report")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::record;

    #[test]
    fn row_width_matches_headers() {
        let e = record("h", "u", Some("atlas"), 3);
        for kind in [ReportKind::Tier, ReportKind::Detailed] {
            assert_eq!(entry_row(kind, &e).len(), headers(kind).len());
        }
    }

    #[test]
    fn hours_formatting() {
        assert_eq!(format_hours(5400.0), "1.5");
        assert_eq!(format_optional_hours(None), "N/A");
    }
}
