use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::types::{ReportKind, Site, UsageRecord};

/// Fields that identify "the same reporting identity".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MergeKey {
    Detailed {
        site: Site,
        user_identity: Option<String>,
        vo_name: Option<String>,
        vo_group: Option<String>,
        vo_role: Option<String>,
    },
    /// After apportionment the role has been folded into the VO name,
    /// so this degenerates to (tier, VO name).
    Tier {
        site: Site,
        vo_name: Option<String>,
        vo_role: Option<String>,
    },
}

impl MergeKey {
    pub fn of(r: &UsageRecord, kind: ReportKind) -> Self {
        match kind {
            ReportKind::Detailed => MergeKey::Detailed {
                site: r.site.clone(),
                user_identity: r.user_identity.clone(),
                vo_name: r.vo_name.clone(),
                vo_group: r.vo_group.clone(),
                vo_role: r.vo_role.clone(),
            },
            ReportKind::Tier => MergeKey::Tier {
                site: r.site.clone(),
                vo_name: r.vo_name.clone(),
                vo_role: r.vo_role.clone(),
            },
        }
    }
}

/// Collapse records sharing a merge key into one.
///
/// Tier reports do not carry user identity or VO group, so those are
/// cleared before grouping. Merged records lose their VO issuer since a
/// differing issuer is usually what kept the rows apart. Output order is
/// unspecified.
pub fn merge_similar(records: Vec<UsageRecord>, kind: ReportKind) -> Vec<UsageRecord> {
    let mut groups: HashMap<MergeKey, UsageRecord> = HashMap::with_capacity(records.len());

    for mut r in records {
        if kind == ReportKind::Tier {
            r.user_identity = None;
            r.vo_group = None;
        }

        match groups.entry(MergeKey::of(&r, kind)) {
            Entry::Vacant(slot) => {
                slot.insert(r);
            }
            Entry::Occupied(mut slot) => {
                let merged = slot.get_mut();
                merged.absorb(&r);
                merged.vo_issuer = None;
            }
        }
    }

    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::record;

    fn prod(host: &str, user: &str, n_jobs: u64) -> UsageRecord {
        let mut r = record(host, user, Some("atlas"), n_jobs);
        r.vo_group = Some("g".to_string());
        r.vo_role = Some("production".to_string());
        r
    }

    #[test]
    fn detailed_duplicates_merge_and_lose_issuer() {
        let mut a = prod("X", "U", 5);
        a.vo_issuer = Some("/CN=issuer-a".to_string());
        let mut b = prod("X", "U", 7);
        b.vo_issuer = Some("/CN=issuer-b".to_string());

        let merged = merge_similar(vec![a, b], ReportKind::Detailed);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].n_jobs, 12);
        assert_eq!(merged[0].cpu_duration, 1200.0);
        assert_eq!(merged[0].vo_issuer, None);
    }

    #[test]
    fn singleton_passes_through_unchanged() {
        let mut a = prod("X", "U", 5);
        a.vo_issuer = Some("/CN=issuer".to_string());
        let merged = merge_similar(vec![a.clone()], ReportKind::Detailed);
        assert_eq!(merged, vec![a]);
    }

    #[test]
    fn detailed_keeps_users_apart() {
        let merged = merge_similar(vec![prod("X", "U", 5), prod("X", "V", 7)], ReportKind::Detailed);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn tier_mode_collapses_users_and_groups() {
        let mut b = prod("X", "V", 7);
        b.vo_group = Some("other".to_string());
        let merged = merge_similar(vec![prod("X", "U", 5), b], ReportKind::Tier);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].n_jobs, 12);
        assert_eq!(merged[0].user_identity, None);
        assert_eq!(merged[0].vo_group, None);
        assert_eq!(merged[0].vo_role.as_deref(), Some("production"));
    }

    #[test]
    fn tier_mode_keeps_roles_apart() {
        let mut user_job = prod("X", "V", 7);
        user_job.vo_role = None;
        let merged = merge_similar(vec![prod("X", "U", 5), user_job], ReportKind::Tier);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn null_normalized_duration_propagates() {
        let mut a = prod("X", "U", 5);
        a.norm_cpu_duration = Some(10.0);
        a.norm_wall_duration = Some(20.0);
        let b = prod("X", "U", 7);

        let merged = merge_similar(vec![a, b], ReportKind::Detailed);
        assert_eq!(merged[0].norm_cpu_duration, None);
        assert_eq!(merged[0].norm_wall_duration, None);
    }
}
