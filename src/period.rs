use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};

/// One calendar month of accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub year: i32,
    pub month: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .with_context(|| format!("invalid report month {year}-{month:02}"))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .with_context(|| format!("report month {year}-{month:02} out of range"))?;
        let end = next
            .pred_opt()
            .with_context(|| format!("report month {year}-{month:02} out of range"))?;

        Ok(Self {
            year,
            month,
            start,
            end,
        })
    }

    /// The calendar month before the one containing `today`.
    pub fn previous_month(today: NaiveDate) -> Result<Self> {
        if today.month() == 1 {
            Self::new(today.year() - 1, 12)
        } else {
            Self::new(today.year(), today.month() - 1)
        }
    }

    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds() {
        let p = ReportPeriod::new(2024, 2).unwrap();
        assert_eq!(p.start_str(), "2024-02-01");
        assert_eq!(p.end_str(), "2024-02-29");

        let p = ReportPeriod::new(2023, 12).unwrap();
        assert_eq!(p.end_str(), "2023-12-31");
    }

    #[test]
    fn invalid_month_rejected() {
        assert!(ReportPeriod::new(2024, 13).is_err());
        assert!(ReportPeriod::new(2024, 0).is_err());
    }

    #[test]
    fn previous_month_wraps_year() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let p = ReportPeriod::previous_month(today).unwrap();
        assert_eq!((p.year, p.month), (2024, 12));
    }
}
