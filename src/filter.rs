use crate::normalize::{
    ALICE_ANON_PREFIX, ALICE_PROD_USER, ALICE_PROD_USER_BARE, ALICE_VO, ATLAS_PROD_DN, ATLAS_VO,
    CERN_LCG_VOMS, CERN_VOMS, CMS_VO,
};
use crate::types::UsageRecord;

const MONITORED_VOS: &[&str] = &[ATLAS_VO, CMS_VO, ALICE_VO];
const MONITORED_ISSUERS: &[&str] = &[CERN_VOMS, CERN_LCG_VOMS];

/// Keep only records belonging to the monitored organizations.
pub fn retain_interesting(records: Vec<UsageRecord>) -> Vec<UsageRecord> {
    records.into_iter().filter(is_interesting).collect()
}

pub fn is_interesting(r: &UsageRecord) -> bool {
    if r
        .vo_issuer
        .as_deref()
        .is_some_and(|i| MONITORED_ISSUERS.contains(&i))
    {
        return true;
    }
    if r
        .vo_name
        .as_deref()
        .is_some_and(|v| MONITORED_VOS.contains(&v))
    {
        return true;
    }
    match r.user_identity.as_deref() {
        Some(ATLAS_PROD_DN | ALICE_PROD_USER | ALICE_PROD_USER_BARE) => true,
        Some(u) => u.starts_with(ALICE_ANON_PREFIX),
        None => false,
    }
}
