use std::collections::HashMap;

use tracing::warn;

use crate::types::UsageRecord;
use crate::warnings::HostWarnings;

pub const DEFAULT_SCALE_FACTOR: f64 = 1.75;

/// Per-host normalization factors (normalized time / measured time).
#[derive(Debug, Clone, Default)]
pub struct ScaleFactorTable {
    factors: HashMap<String, f64>,
}

impl ScaleFactorTable {
    pub fn new(factors: HashMap<String, f64>) -> Self {
        Self { factors }
    }

    pub fn get(&self, host: &str) -> Option<f64> {
        self.factors.get(host).copied()
    }

    pub fn factor_for(&self, host: &str, warnings: &mut HostWarnings) -> f64 {
        match self.get(host) {
            Some(f) => f,
            None => {
                if warnings.first_unscaled(host) {
                    warn!(host, default = DEFAULT_SCALE_FACTOR, "no scale factor for host, using default");
                }
                DEFAULT_SCALE_FACTOR
            }
        }
    }
}

/// Fill in normalized CPU and wall durations. Raw durations are untouched.
pub fn annotate(
    records: &mut [UsageRecord],
    table: &ScaleFactorTable,
    warnings: &mut HostWarnings,
) {
    for r in records.iter_mut() {
        let factor = table.factor_for(r.site.name(), warnings);
        r.norm_cpu_duration = Some(r.cpu_duration * factor);
        r.norm_wall_duration = Some(r.wall_duration * factor);
    }
}
