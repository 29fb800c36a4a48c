use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::redact::RedactionMode;
use crate::scale::ScaleFactorTable;
use crate::tier::{RuleField, SharingRule, TierMap, DEFAULT_TIER1};

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scale_factors: ScaleFactorTable,
    pub tiers: TierMap,
    pub sharing_rules: Vec<SharingRule>,
    pub redaction: RedactionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    #[serde(default = "default_source_view")]
    pub source_view: String,
}

fn default_source_view() -> String {
    "usage_monthly".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedactionConfig {
    #[serde(default)]
    pub mode: RedactionMode,
    pub command: Option<PathBuf>,
}

/// The file as written. Required tables are `Option` so their absence
/// can be reported by name instead of as a serde error.
#[derive(Debug, Deserialize)]
struct RawConfig {
    database: Option<DatabaseConfig>,
    tier1: Option<String>,
    scale_factors: Option<HashMap<String, f64>>,
    tier_map: Option<HashMap<String, String>>,
    sharing_rules: Option<Vec<RawSharingRule>>,
    #[serde(default)]
    redaction: RedactionConfig,
}

#[derive(Debug, Deserialize)]
struct RawSharingRule {
    #[serde(rename = "match")]
    predicate: BTreeMap<String, String>,
    ratio: f64,
    tier2: Option<String>,
}

impl RawSharingRule {
    fn validate(self, index: usize) -> Result<SharingRule, ConfigError> {
        if !(0.0..=1.0).contains(&self.ratio) {
            return Err(ConfigError::BadRatio {
                index,
                ratio: self.ratio,
            });
        }
        if self.predicate.is_empty() {
            return Err(ConfigError::EmptyPredicate { index });
        }

        let predicate = self
            .predicate
            .into_iter()
            .map(|(field, value)| {
                field
                    .parse::<RuleField>()
                    .map(|f| (f, value))
                    .map_err(|reason| ConfigError::BadRuleField { index, reason })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(SharingRule {
            predicate,
            ratio: self.ratio,
            tier2: self.tier2,
        })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "t1report").map(|d| d.config_dir().join("config.toml"))
}

pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()
            .ok_or_else(|| ConfigError::NotFound(PathBuf::from("config.toml")))?,
    };
    if !path.exists() {
        return Err(ConfigError::NotFound(path));
    }

    let data = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    parse_config(&data)
}

pub fn parse_config(data: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = toml::from_str(data)?;

    let database = raw
        .database
        .ok_or(ConfigError::MissingSection("database"))?;
    let factors = raw
        .scale_factors
        .ok_or(ConfigError::MissingSection("scale_factors"))?;
    let tier_map = raw.tier_map.ok_or(ConfigError::MissingSection("tier_map"))?;
    let sharing_rules = raw
        .sharing_rules
        .ok_or(ConfigError::MissingSection("sharing_rules"))?
        .into_iter()
        .enumerate()
        .map(|(index, rule)| rule.validate(index))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some((host, &factor)) = factors.iter().find(|(_, f)| f.is_nan() || **f <= 0.0) {
        return Err(ConfigError::BadScaleFactor {
            host: host.clone(),
            factor,
        });
    }

    if raw.redaction.command.is_none() && raw.redaction.mode != RedactionMode::Never {
        return Err(ConfigError::MissingRedactionCommand(raw.redaction.mode.as_str()));
    }

    Ok(Config {
        database,
        scale_factors: ScaleFactorTable::new(factors),
        tiers: TierMap::new(tier_map, raw.tier1.unwrap_or_else(|| DEFAULT_TIER1.to_string())),
        sharing_rules,
        redaction: raw.redaction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::RuleField;
    use crate::warnings::HostWarnings;

    const SAMPLE: &str = r#"
tier1 = "NDGF-T1"

[database]
path = "/var/lib/t1report/accounting.db"

[scale_factors]
"ce.ndgf.org" = 2.1

[tier_map]
"grid.uio.no" = "NORWAY-T2"

[[sharing_rules]]
ratio = 0.5
match = { tier = "NORWAY-T2", vo_name = "atlas-prod" }

[[sharing_rules]]
ratio = 1.0
tier2 = "SWEDEN-T2"
match = { vo_name = "alice-prod" }

[redaction]
mode = "auto"
command = "/usr/libexec/t1report/encrypt-dn"
"#;

    #[test]
    fn parses_full_config() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.database.source_view, "usage_monthly");
        assert_eq!(config.scale_factors.get("ce.ndgf.org"), Some(2.1));
        assert_eq!(
            config.tiers.tier_for("grid.uio.no", &mut HostWarnings::new()),
            "NORWAY-T2"
        );
        assert_eq!(config.sharing_rules.len(), 2);
        assert_eq!(
            config.sharing_rules[0].predicate.get(&RuleField::VoName).map(String::as_str),
            Some("atlas-prod")
        );
        assert_eq!(config.sharing_rules[1].tier2.as_deref(), Some("SWEDEN-T2"));
        assert_eq!(config.redaction.mode, RedactionMode::Auto);
    }

    #[test]
    fn missing_table_is_fatal() {
        let without_rules = SAMPLE
            .split("[[sharing_rules]]")
            .next()
            .unwrap()
            .to_string()
            + "[redaction]\nmode = \"never\"\n";
        let err = parse_config(&without_rules).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSection("sharing_rules")));
    }

    #[test]
    fn ratio_out_of_range_is_fatal() {
        let bad = SAMPLE.replace("ratio = 0.5", "ratio = 1.5");
        let err = parse_config(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::BadRatio { index: 0, .. }));
    }

    #[test]
    fn unknown_rule_field_is_fatal() {
        let bad = SAMPLE.replace("match = { vo_name = \"alice-prod\" }", "match = { site = \"x\" }");
        assert!(matches!(
            parse_config(&bad),
            Err(ConfigError::BadRuleField { index: 1, .. })
        ));
    }

    #[test]
    fn malformed_toml_is_fatal() {
        assert!(matches!(
            parse_config("[database\npath = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn redaction_needs_a_command() {
        let bad = SAMPLE.replace("command = \"/usr/libexec/t1report/encrypt-dn\"", "");
        assert!(matches!(
            parse_config(&bad),
            Err(ConfigError::MissingRedactionCommand("auto"))
        ));
    }

    #[test]
    fn unknown_file_reported() {
        let err = load_config(Some(Path::new("/nonexistent/t1report.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
