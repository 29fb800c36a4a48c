use std::path::PathBuf;

use thiserror::Error;

/// Problems with the configuration. Always fatal: the run stops before
/// any record is read.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no configuration file found (looked for {0})")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required section [{0}]")]
    MissingSection(&'static str),

    #[error("scale factor for {host} must be positive, got {factor}")]
    BadScaleFactor { host: String, factor: f64 },

    #[error("sharing rule #{index}: ratio {ratio} outside [0, 1]")]
    BadRatio { index: usize, ratio: f64 },

    #[error("sharing rule #{index}: {reason}")]
    BadRuleField { index: usize, reason: String },

    #[error("sharing rule #{index}: empty match table")]
    EmptyPredicate { index: usize },

    #[error("redaction mode {0} needs redaction.command")]
    MissingRedactionCommand(&'static str),
}
