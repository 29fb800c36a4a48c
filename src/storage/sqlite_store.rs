use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::{ReportSink, UsageSource};
use crate::format::columns;
use crate::period::ReportPeriod;
use crate::types::{ReportKind, Site, UsageRecord};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tier_usage (
        tier          TEXT NOT NULL,
        vo_name       TEXT,
        n_jobs        INTEGER NOT NULL,
        cputime       INTEGER NOT NULL,
        norm_cputime  INTEGER,
        walltime      INTEGER NOT NULL,
        norm_walltime INTEGER,
        month         INTEGER NOT NULL,
        year          INTEGER NOT NULL,
        period_start  TEXT NOT NULL,
        period_end    TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS user_usage (
        tier          TEXT NOT NULL,
        vo_name       TEXT,
        user_identity TEXT,
        vo_issuer     TEXT NOT NULL,
        vo_group      TEXT NOT NULL,
        vo_role       TEXT NOT NULL,
        n_jobs        INTEGER NOT NULL,
        cputime       INTEGER NOT NULL,
        norm_cputime  INTEGER,
        walltime      INTEGER NOT NULL,
        norm_walltime INTEGER,
        month         INTEGER NOT NULL,
        year          INTEGER NOT NULL,
        period_start  TEXT NOT NULL,
        period_end    TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_tier_usage_period ON tier_usage(year, month);
    CREATE INDEX IF NOT EXISTS idx_user_usage_period ON user_usage(year, month);
";

/// Accounting database: reads the monthly usage view and owns the two
/// report tables.
pub struct SqliteStore {
    conn: Connection,
    source_view: String,
}

impl SqliteStore {
    pub fn open(path: &Path, source_view: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        Self::with_connection(conn, source_view)
    }

    pub fn with_connection(conn: Connection, source_view: &str) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("failed to initialize report tables")?;
        Ok(Self {
            conn,
            source_view: source_view.to_string(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn non_negative(idx: usize, v: i64) -> rusqlite::Result<u64> {
    u64::try_from(v).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, v))
}

impl UsageSource for SqliteStore {
    fn fetch_month(&self, period: &ReportPeriod) -> Result<Vec<UsageRecord>> {
        let sql = format!(
            "SELECT year, month, machine_name, user_identity, vo_issuer, vo_name,
                    vo_group, vo_role, n_jobs, cputime, walltime
               FROM {}
              WHERE year = ?1 AND month = ?2",
            self.source_view
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("failed to query {}", self.source_view))?;

        let rows = stmt
            .query_map(params![period.year, period.month], |row| {
                Ok(UsageRecord {
                    year: row.get(0)?,
                    month: row.get(1)?,
                    site: Site::Host(row.get(2)?),
                    user_identity: row.get(3)?,
                    vo_issuer: row.get(4)?,
                    vo_name: row.get(5)?,
                    vo_group: row.get(6)?,
                    vo_role: row.get(7)?,
                    n_jobs: non_negative(8, row.get(8)?)?,
                    cpu_duration: row.get::<_, f64>(9)?.max(0.0),
                    wall_duration: row.get::<_, f64>(10)?.max(0.0),
                    norm_cpu_duration: None,
                    norm_wall_duration: None,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("failed to read rows from {}", self.source_view))?;

        info!(
            rows = rows.len(),
            year = period.year,
            month = period.month,
            "fetched usage rows"
        );
        Ok(rows)
    }
}

impl ReportSink for SqliteStore {
    fn replace_period(
        &mut self,
        kind: ReportKind,
        period: &ReportPeriod,
        rows: &[Vec<String>],
    ) -> Result<usize> {
        let table = kind.table_name();
        let column_list = columns(kind).join(", ");

        let tx = self.conn.transaction().context("failed to begin transaction")?;

        let deleted = tx
            .execute(
                &format!("DELETE FROM {table} WHERE year = ?1 AND month = ?2"),
                params![period.year, period.month],
            )
            .with_context(|| format!("failed to clear {table} for {}-{:02}", period.year, period.month))?;
        debug!(table, deleted, "cleared previous rows");

        for row in rows {
            let sql = format!(
                "INSERT INTO {table} ({column_list}) VALUES ({})",
                row.join(", ")
            );
            tx.execute(&sql, [])
                .with_context(|| format!("failed to insert into {table}"))?;
        }

        tx.commit().context("failed to commit report rows")?;
        info!(table, rows = rows.len(), "wrote report rows");
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_entry;

    fn store_with_source() -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE usage_monthly (
                 year INTEGER, month INTEGER, machine_name TEXT, user_identity TEXT,
                 vo_issuer TEXT, vo_name TEXT, vo_group TEXT, vo_role TEXT,
                 n_jobs INTEGER, cputime REAL, walltime REAL
             );
             INSERT INTO usage_monthly VALUES
                 (2024, 3, 'ce.uio.no', '/CN=a', NULL, 'atlas', 'atlas', 'production', 12, 100.5, 200.0),
                 (2024, 3, 'ce.csc.fi', '/CN=b', NULL, NULL, NULL, NULL, 3, 10, 20),
                 (2024, 4, 'ce.uio.no', '/CN=a', NULL, 'atlas', NULL, NULL, 1, 1, 1);",
        )
        .unwrap();
        SqliteStore::with_connection(conn, "usage_monthly").unwrap()
    }

    #[test]
    fn fetches_only_requested_month() {
        let store = store_with_source();
        let period = ReportPeriod::new(2024, 3).unwrap();
        let rows = store.fetch_month(&period).unwrap();
        assert_eq!(rows.len(), 2);
        let uio = rows.iter().find(|r| r.site.name() == "ce.uio.no").unwrap();
        assert_eq!(uio.n_jobs, 12);
        assert_eq!(uio.cpu_duration, 100.5);
        assert_eq!(uio.vo_role.as_deref(), Some("production"));
        assert_eq!(uio.norm_cpu_duration, None);
    }

    #[test]
    fn missing_view_is_an_error() {
        let store =
            SqliteStore::with_connection(Connection::open_in_memory().unwrap(), "nope").unwrap();
        let period = ReportPeriod::new(2024, 3).unwrap();
        assert!(store.fetch_month(&period).is_err());
    }

    #[test]
    fn replace_period_is_idempotent() {
        let mut store = store_with_source();
        let period = ReportPeriod::new(2024, 3).unwrap();
        let mut entry = store.fetch_month(&period).unwrap().remove(0);
        entry.site = Site::Tier("NDGF-T1".to_string());
        let rows = vec![format_entry(&entry, ReportKind::Detailed, &period)];

        store
            .replace_period(ReportKind::Detailed, &period, &rows)
            .unwrap();
        store
            .replace_period(ReportKind::Detailed, &period, &rows)
            .unwrap();

        let count: i64 = store
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM user_usage WHERE year = 2024 AND month = 3",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);

        let tier: String = store
            .connection()
            .query_row("SELECT tier FROM user_usage", [], |r| r.get(0))
            .unwrap();
        assert_eq!(tier, "NDGF-T1");
    }
}
