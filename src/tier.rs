//! Settlement-tier assignment and tier-1/tier-2 apportionment.
//!
//! Each record's host is mapped to a tier. Records matching a sharing rule
//! are split between the tier-1 site and a tier-2 site according to the
//! rule's ratio; all resulting shares are folded into a [`TierLedger`] so
//! shares landing on the same (tier, identity) key are summed.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::normalize::PRODUCTION_ROLE;
use crate::types::{ReportKind, Site, UsageRecord};
use crate::warnings::HostWarnings;

pub const DEFAULT_TIER1: &str = "NDGF-T1";

/// Records with at most this many jobs are not fragmented by a split.
pub const SPLIT_MIN_JOBS: u64 = 10;

const SUFFIX_TIERS: &[(&str, &str)] = &[
    (".no", "NORWAY-T2"),
    (".se", "SWEDEN-T2"),
    (".fi", "FINLAND-T2"),
];

/// Host to tier lookup with a country-suffix fallback.
#[derive(Debug, Clone)]
pub struct TierMap {
    hosts: HashMap<String, String>,
    tier1: String,
}

impl TierMap {
    pub fn new(hosts: HashMap<String, String>, tier1: impl Into<String>) -> Self {
        Self {
            hosts,
            tier1: tier1.into(),
        }
    }

    pub fn tier1(&self) -> &str {
        &self.tier1
    }

    pub fn tier_for(&self, host: &str, warnings: &mut HostWarnings) -> String {
        if let Some(tier) = self.hosts.get(host) {
            return tier.clone();
        }

        let tier = SUFFIX_TIERS
            .iter()
            .find(|(suffix, _)| host.ends_with(suffix))
            .map(|(_, tier)| *tier)
            .unwrap_or(self.tier1.as_str());

        if warnings.first_unmapped(host) {
            warn!(host, tier, "host not in tier map, using heuristic tier");
        }
        tier.to_string()
    }
}

/// Record fields a sharing rule can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleField {
    Tier,
    VoName,
    VoRole,
    VoGroup,
    VoIssuer,
    UserIdentity,
}

impl FromStr for RuleField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tier" => Ok(RuleField::Tier),
            "vo_name" => Ok(RuleField::VoName),
            "vo_role" => Ok(RuleField::VoRole),
            "vo_group" => Ok(RuleField::VoGroup),
            "vo_issuer" => Ok(RuleField::VoIssuer),
            "user_identity" => Ok(RuleField::UserIdentity),
            other => Err(format!("unknown rule field {other:?}")),
        }
    }
}

impl RuleField {
    fn value(self, r: &UsageRecord) -> Option<&str> {
        match self {
            RuleField::Tier => r.site.tier(),
            RuleField::VoName => r.vo_name.as_deref(),
            RuleField::VoRole => r.vo_role.as_deref(),
            RuleField::VoGroup => r.vo_group.as_deref(),
            RuleField::VoIssuer => r.vo_issuer.as_deref(),
            RuleField::UserIdentity => r.user_identity.as_deref(),
        }
    }
}

/// A resource-sharing agreement: records matching every entry of
/// `predicate` send `ratio` of their usage to the tier-2 side and the
/// rest to tier-1.
#[derive(Debug, Clone, PartialEq)]
pub struct SharingRule {
    pub predicate: BTreeMap<RuleField, String>,
    pub ratio: f64,
    /// Tier-2 site receiving the share. Defaults to the record's own tier.
    pub tier2: Option<String>,
}

impl SharingRule {
    pub fn matches(&self, r: &UsageRecord) -> bool {
        self.predicate
            .iter()
            .all(|(field, expected)| field.value(r) == Some(expected.as_str()))
    }
}

/// First rule in declared order whose predicate matches.
pub fn first_match<'a>(rules: &'a [SharingRule], r: &UsageRecord) -> Option<&'a SharingRule> {
    rules.iter().find(|rule| rule.matches(r))
}

fn split_allowed(n_jobs: u64, ratio: f64) -> bool {
    ratio == 0.0 || ratio == 1.0 || n_jobs > SPLIT_MIN_JOBS
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LedgerKey {
    site: Site,
    user_identity: Option<String>,
    vo_issuer: Option<String>,
    vo_name: Option<String>,
    vo_group: Option<String>,
    vo_role: Option<String>,
}

impl LedgerKey {
    fn of(r: &UsageRecord) -> Self {
        Self {
            site: r.site.clone(),
            user_identity: r.user_identity.clone(),
            vo_issuer: r.vo_issuer.clone(),
            vo_name: r.vo_name.clone(),
            vo_group: r.vo_group.clone(),
            vo_role: r.vo_role.clone(),
        }
    }
}

/// Apportioned entries keyed by (tier, identity fields).
#[derive(Debug, Default)]
pub struct TierLedger {
    entries: HashMap<LedgerKey, UsageRecord>,
}

impl TierLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `share` under its key, summing with any entry already there.
    pub fn insert_or_merge(&mut self, share: UsageRecord) {
        self.entries
            .entry(LedgerKey::of(&share))
            .and_modify(|existing| existing.absorb(&share))
            .or_insert(share);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn into_records(self) -> Vec<UsageRecord> {
        self.entries.into_values().collect()
    }
}

pub struct Apportioner<'a> {
    tiers: &'a TierMap,
    rules: &'a [SharingRule],
    kind: ReportKind,
}

impl<'a> Apportioner<'a> {
    pub fn new(tiers: &'a TierMap, rules: &'a [SharingRule], kind: ReportKind) -> Self {
        Self { tiers, rules, kind }
    }

    /// Replace the host with its tier. Tier reports fold the role into the
    /// VO name (`atlas` + `production` -> `atlas-prod`).
    pub fn assign_tier(&self, mut r: UsageRecord, warnings: &mut HostWarnings) -> UsageRecord {
        let tier = self.tiers.tier_for(r.site.name(), warnings);
        r.site = Site::Tier(tier);

        if self.kind == ReportKind::Tier {
            let suffix = if r.vo_role.as_deref() == Some(PRODUCTION_ROLE) {
                "prod"
            } else {
                "user"
            };
            r.vo_name = r.vo_name.map(|name| format!("{name}-{suffix}"));
            r.vo_role = None;
        }
        r
    }

    /// Tier report entries are identified by (tier, VO name) only.
    fn strip_identity(&self, mut r: UsageRecord) -> UsageRecord {
        if self.kind == ReportKind::Tier {
            r.vo_group = None;
            r.vo_issuer = None;
            r.user_identity = None;
        }
        r
    }

    pub fn apportion_into(
        &self,
        ledger: &mut TierLedger,
        r: UsageRecord,
        warnings: &mut HostWarnings,
    ) {
        let r = self.assign_tier(r, warnings);
        let own_tier = r.site.name().to_string();
        let tier1 = self.tiers.tier1();

        // Rules see the record before identity stripping.
        let split = first_match(self.rules, &r)
            .filter(|rule| split_allowed(r.n_jobs, rule.ratio))
            .map(|rule| (rule.tier2.clone().unwrap_or(own_tier), rule.ratio))
            .filter(|(tier2, _)| tier2 != tier1);

        let r = self.strip_identity(r);
        let Some((tier2, ratio)) = split else {
            ledger.insert_or_merge(r);
            return;
        };

        debug!(
            tier2 = %tier2,
            vo_name = ?r.vo_name,
            ratio,
            n_jobs = r.n_jobs,
            "splitting record"
        );

        for (tier, share_ratio) in [(tier2, ratio), (tier1.to_string(), 1.0 - ratio)] {
            if share_ratio == 0.0 {
                continue;
            }
            let mut share = r.scaled(share_ratio);
            share.site = Site::Tier(tier);
            ledger.insert_or_merge(share);
        }
    }

    pub fn apportion(&self, records: Vec<UsageRecord>, warnings: &mut HostWarnings) -> Vec<UsageRecord> {
        let mut ledger = TierLedger::new();
        for r in records {
            self.apportion_into(&mut ledger, r, warnings);
        }
        debug!(entries = ledger.len(), "apportionment finished");
        ledger.into_records()
    }
}
