//! SQL literal rendering for finished entries.
//!
//! Durations are kept as `f64` through every merge and split; this is the
//! only place they are truncated to whole seconds.

use crate::period::ReportPeriod;
use crate::types::{ReportKind, UsageRecord};

const NULL: &str = "NULL";
const EMPTY: &str = "''";

pub fn sql_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn text_or(value: Option<&str>, missing: &str) -> String {
    value.map(sql_text).unwrap_or_else(|| missing.to_string())
}

fn seconds(d: f64) -> String {
    (d as i64).to_string()
}

fn seconds_or_null(d: Option<f64>) -> String {
    d.map(seconds).unwrap_or_else(|| NULL.to_string())
}

/// Column names matching [`format_entry`]'s field order.
pub fn columns(kind: ReportKind) -> &'static [&'static str] {
    match kind {
        ReportKind::Tier => &[
            "tier",
            "vo_name",
            "n_jobs",
            "cputime",
            "norm_cputime",
            "walltime",
            "norm_walltime",
            "month",
            "year",
            "period_start",
            "period_end",
        ],
        ReportKind::Detailed => &[
            "tier",
            "vo_name",
            "user_identity",
            "vo_issuer",
            "vo_group",
            "vo_role",
            "n_jobs",
            "cputime",
            "norm_cputime",
            "walltime",
            "norm_walltime",
            "month",
            "year",
            "period_start",
            "period_end",
        ],
    }
}

/// Render one entry as the ordered literal values of an accounting row.
pub fn format_entry(r: &UsageRecord, kind: ReportKind, period: &ReportPeriod) -> Vec<String> {
    let mut fields = Vec::with_capacity(columns(kind).len());
    fields.push(sql_text(r.site.name()));
    fields.push(text_or(r.vo_name.as_deref(), NULL));

    if kind == ReportKind::Detailed {
        fields.push(text_or(r.user_identity.as_deref(), NULL));
        fields.push(text_or(r.vo_issuer.as_deref(), EMPTY));
        fields.push(text_or(r.vo_group.as_deref(), EMPTY));
        fields.push(text_or(r.vo_role.as_deref(), EMPTY));
    }

    fields.push(r.n_jobs.to_string());
    fields.push(seconds(r.cpu_duration));
    fields.push(seconds_or_null(r.norm_cpu_duration));
    fields.push(seconds(r.wall_duration));
    fields.push(seconds_or_null(r.norm_wall_duration));
    fields.push(period.month.to_string());
    fields.push(period.year.to_string());
    fields.push(sql_text(&period.start_str()));
    fields.push(sql_text(&period.end_str()));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::record;
    use crate::types::Site;

    fn entry() -> UsageRecord {
        let mut r = record("x", "/CN=O'Brien", Some("atlas"), 12);
        r.site = Site::Tier("NDGF-T1".to_string());
        r.cpu_duration = 1234.9;
        r.wall_duration = 99.99;
        r.norm_cpu_duration = Some(2161.075);
        r.vo_role = Some("production".to_string());
        r
    }

    #[test]
    fn tier_row_layout() {
        let period = ReportPeriod::new(2024, 3).unwrap();
        let mut r = entry();
        r.vo_name = Some("atlas-prod".to_string());

        let fields = format_entry(&r, ReportKind::Tier, &period);
        assert_eq!(
            fields,
            vec![
                "'NDGF-T1'",
                "'atlas-prod'",
                "12",
                "1234",
                "2161",
                "99",
                "NULL",
                "3",
                "2024",
                "'2024-03-01'",
                "'2024-03-31'",
            ]
        );
        assert_eq!(fields.len(), columns(ReportKind::Tier).len());
    }

    #[test]
    fn detailed_row_layout() {
        let period = ReportPeriod::new(2024, 3).unwrap();
        let fields = format_entry(&entry(), ReportKind::Detailed, &period);
        assert_eq!(fields.len(), columns(ReportKind::Detailed).len());
        assert_eq!(fields[2], "'/CN=O''Brien'");
        assert_eq!(fields[3], "''");
        assert_eq!(fields[4], "''");
        assert_eq!(fields[5], "'production'");
    }

    #[test]
    fn missing_vo_name_is_null() {
        let period = ReportPeriod::new(2024, 3).unwrap();
        let mut r = entry();
        r.vo_name = None;
        assert_eq!(format_entry(&r, ReportKind::Tier, &period)[1], "NULL");
    }
}
