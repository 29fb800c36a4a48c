use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a record's usage is booked: the executing host before
/// apportionment, the settlement tier after it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Host(String),
    Tier(String),
}

impl Site {
    pub fn name(&self) -> &str {
        match self {
            Site::Host(h) => h,
            Site::Tier(t) => t,
        }
    }

    pub fn tier(&self) -> Option<&str> {
        match self {
            Site::Host(_) => None,
            Site::Tier(t) => Some(t),
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub year: i32,
    pub month: u32,
    pub site: Site,
    pub user_identity: Option<String>,
    pub vo_issuer: Option<String>,
    pub vo_name: Option<String>,
    pub vo_group: Option<String>,
    pub vo_role: Option<String>,
    pub n_jobs: u64,
    pub cpu_duration: f64,
    pub wall_duration: f64,
    pub norm_cpu_duration: Option<f64>,
    pub norm_wall_duration: Option<f64>,
}

impl UsageRecord {
    /// Add another record's usage into this one.
    /// Normalized durations stay null if either side is null.
    pub fn absorb(&mut self, other: &UsageRecord) {
        self.n_jobs += other.n_jobs;
        self.cpu_duration += other.cpu_duration;
        self.wall_duration += other.wall_duration;
        self.norm_cpu_duration = sum_nullable(self.norm_cpu_duration, other.norm_cpu_duration);
        self.norm_wall_duration = sum_nullable(self.norm_wall_duration, other.norm_wall_duration);
    }

    /// A copy carrying `ratio` of this record's usage. Job count is truncated.
    pub fn scaled(&self, ratio: f64) -> UsageRecord {
        UsageRecord {
            n_jobs: (self.n_jobs as f64 * ratio) as u64,
            cpu_duration: self.cpu_duration * ratio,
            wall_duration: self.wall_duration * ratio,
            norm_cpu_duration: self.norm_cpu_duration.map(|d| d * ratio),
            norm_wall_duration: self.norm_wall_duration.map(|d| d * ratio),
            ..self.clone()
        }
    }
}

fn sum_nullable(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        _ => None,
    }
}

/// Report granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// One row per (tier, VO name), VO names suffixed `-prod`/`-user`.
    Tier,
    /// One row per user identity and VO attributes.
    Detailed,
}

impl ReportKind {
    pub fn table_name(self) -> &'static str {
        match self {
            ReportKind::Tier => "tier_usage",
            ReportKind::Detailed => "user_usage",
        }
    }
}
