use std::collections::HashSet;

/// Hosts already reported during this run, so each unknown host is
/// logged once per table rather than once per record.
#[derive(Debug, Default)]
pub struct HostWarnings {
    unscaled: HashSet<String>,
    unmapped: HashSet<String>,
}

impl HostWarnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time `host` is seen without a scale factor.
    pub fn first_unscaled(&mut self, host: &str) -> bool {
        first_time(&mut self.unscaled, host)
    }

    /// Returns true the first time `host` is seen without a tier mapping.
    pub fn first_unmapped(&mut self, host: &str) -> bool {
        first_time(&mut self.unmapped, host)
    }
}

fn first_time(seen: &mut HashSet<String>, host: &str) -> bool {
    if seen.contains(host) {
        return false;
    }
    seen.insert(host.to_string())
}
