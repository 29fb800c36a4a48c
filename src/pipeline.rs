use tracing::info;

use crate::config::Config;
use crate::filter::retain_interesting;
use crate::merge::merge_similar;
use crate::normalize::normalize;
use crate::scale::{annotate, ScaleFactorTable};
use crate::tier::{Apportioner, SharingRule, TierMap};
use crate::types::{ReportKind, UsageRecord};
use crate::warnings::HostWarnings;

/// The cleaning, merge and apportionment stages for one batch.
pub struct Pipeline<'a> {
    pub scale_factors: &'a ScaleFactorTable,
    pub tiers: &'a TierMap,
    pub rules: &'a [SharingRule],
    pub kind: ReportKind,
}

impl<'a> Pipeline<'a> {
    pub fn from_config(config: &'a Config, kind: ReportKind) -> Self {
        Self {
            scale_factors: &config.scale_factors,
            tiers: &config.tiers,
            rules: &config.sharing_rules,
            kind,
        }
    }

    /// Turn raw rows into finished entries, sorted by (tier, VO name, user).
    pub fn run(&self, raw: Vec<UsageRecord>, warnings: &mut HostWarnings) -> Vec<UsageRecord> {
        let raw_count = raw.len();

        let records = normalize(raw);
        let mut records = retain_interesting(records);
        let interesting = records.len();

        annotate(&mut records, self.scale_factors, warnings);

        let records = merge_similar(records, self.kind);
        let merged = records.len();

        let apportioner = Apportioner::new(self.tiers, self.rules, self.kind);
        let mut entries = apportioner.apportion(records, warnings);

        entries.sort_by(|a, b| {
            (&a.site, &a.vo_name, &a.user_identity, &a.vo_group, &a.vo_role).cmp(&(
                &b.site,
                &b.vo_name,
                &b.user_identity,
                &b.vo_group,
                &b.vo_role,
            ))
        });

        info!(
            raw = raw_count,
            interesting,
            merged,
            entries = entries.len(),
            kind = ?self.kind,
            "pipeline finished"
        );
        entries
    }
}
