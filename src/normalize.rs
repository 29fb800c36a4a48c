//! Identity cleanup and VO reclassification for raw usage rows.
//!
//! Every rule is a field rewrite on a single record; no record is dropped
//! and the result does not depend on input order. Running the rules twice
//! gives the same result as running them once.

use crate::types::UsageRecord;

pub const FILE_SCHEME: &str = "file:///";

pub const ALICE_VO: &str = "alice";
pub const ALICE_VO_FQDN: &str = "alice.cern.ch";
pub const ATLAS_VO: &str = "atlas";
pub const ATLAS_VO_FQDN: &str = "atlas.cern.ch";
pub const CMS_VO: &str = "cms";

/// Anonymous ALICE production jobs arrive with identities under this prefix.
pub const ALICE_ANON_PREFIX: &str = "/O=Grid/O=NorduGrid/OU=nordugrid.org/CN=ALICE production";
pub const ALICE_PROD_USER_BARE: &str = "aliprod";
pub const ALICE_PROD_USER: &str = "/aliprod";

pub const CERN_VOMS_PREFIX: &str = "/DC=ch/DC=cern/OU=computers/CN=";
pub const CERN_VOMS: &str = "/DC=ch/DC=cern/OU=computers/CN=voms.cern.ch";
pub const CERN_LCG_VOMS: &str = "/DC=ch/DC=cern/OU=computers/CN=lcg-voms.cern.ch";

/// ATLAS production submitter whose rows frequently lack VO attributes.
pub const ATLAS_PROD_DN: &str = "/C=SI/O=SiGNET/O=IJS/OU=F9/CN=Andrej Filipcic";
pub const PRODUCTION_ROLE: &str = "production";

pub fn normalize(records: Vec<UsageRecord>) -> Vec<UsageRecord> {
    records.into_iter().map(normalize_record).collect()
}

pub fn normalize_record(mut r: UsageRecord) -> UsageRecord {
    if r.vo_name.as_deref() == Some(ALICE_VO_FQDN) {
        r.vo_name = Some(ALICE_VO.to_string());
    }

    if r
        .vo_issuer
        .as_deref()
        .is_some_and(|i| i.starts_with(FILE_SCHEME))
    {
        r.vo_issuer = None;
    }

    if r
        .vo_name
        .as_deref()
        .is_some_and(|v| v.starts_with(FILE_SCHEME) || v.starts_with('/'))
    {
        r.vo_name = None;
    }

    let user = r.user_identity.as_deref().unwrap_or_default();
    if user.starts_with(ALICE_ANON_PREFIX) {
        r.vo_name = Some(ALICE_VO.to_string());
        r.user_identity = Some(ALICE_PROD_USER.to_string());
    } else if user == ALICE_PROD_USER_BARE {
        r.user_identity = Some(ALICE_PROD_USER.to_string());
    }

    let is_atlas_prod = r.user_identity.as_deref() == Some(ATLAS_PROD_DN);

    if r.vo_name.as_deref() == Some(ATLAS_VO_FQDN)
        && r
            .vo_issuer
            .as_deref()
            .is_some_and(|i| i.starts_with(CERN_VOMS_PREFIX))
    {
        r.vo_name = Some(ATLAS_VO.to_string());
        if is_atlas_prod {
            set_atlas_production(&mut r);
        }
    }

    // Backfill for the one identity known to submit without VO metadata.
    if is_atlas_prod && r.vo_issuer.is_none() && r.vo_name.is_none() {
        r.vo_issuer = Some(CERN_VOMS.to_string());
        r.vo_name = Some(ATLAS_VO.to_string());
        set_atlas_production(&mut r);
    }

    r
}

fn set_atlas_production(r: &mut UsageRecord) {
    r.vo_group = Some(ATLAS_VO.to_string());
    r.vo_role = Some(PRODUCTION_ROLE.to_string());
}
