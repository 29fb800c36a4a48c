//! Monthly grid usage accounting.
//!
//! Raw per-host usage rows are normalized, filtered to the monitored VOs,
//! annotated with normalized durations, merged, and apportioned between
//! the tier-1 site and the tier-2 sites before being formatted for the
//! accounting tables.

pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod format;
pub mod logging;
pub mod merge;
pub mod normalize;
pub mod output;
pub mod period;
pub mod pipeline;
pub mod redact;
pub mod scale;
pub mod storage;
pub mod tier;
pub mod types;
pub mod warnings;
