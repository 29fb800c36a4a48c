pub mod sqlite_store;

use anyhow::Result;

use crate::period::ReportPeriod;
use crate::types::{ReportKind, UsageRecord};

/// Where raw monthly usage rows come from.
pub trait UsageSource {
    /// All rows for one (year, month). Must return the complete set or an
    /// error, never a partial batch.
    fn fetch_month(&self, period: &ReportPeriod) -> Result<Vec<UsageRecord>>;
}

/// Where formatted accounting rows go.
pub trait ReportSink {
    /// Replace every row of `kind`'s table for `period` with `rows`, where
    /// each row is the literal field list produced by the formatter.
    /// Returns the number of rows written.
    fn replace_period(
        &mut self,
        kind: ReportKind,
        period: &ReportPeriod,
        rows: &[Vec<String>],
    ) -> Result<usize>;
}
