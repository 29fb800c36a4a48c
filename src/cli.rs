use std::path::PathBuf;

use clap::{ArgGroup, Parser, ValueEnum};

use crate::types::ReportKind;

#[derive(Parser, Debug)]
#[command(
    name = "t1report",
    about = "Monthly tier-1/tier-2 grid usage accounting report"
)]
#[command(group(ArgGroup::new("report").args(["tier", "user"])))]
pub struct Cli {
    /// Configuration file (default: the user config dir's t1report/config.toml)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Report year (default: year of the previous month)
    #[arg(long, requires = "month")]
    pub year: Option<i32>,

    /// Report month, 1-12 (default: previous month)
    #[arg(long, requires = "year", value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,

    /// Tier-level report (default)
    #[arg(long)]
    pub tier: bool,

    /// User-level report
    #[arg(long)]
    pub user: bool,

    /// Print entries instead of writing them to the database
    #[arg(long, short)]
    pub interactive: bool,

    /// Output format for --interactive: table (default), json
    #[arg(long, default_value = "table")]
    pub format: OutputFormat,

    /// Log debug output
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl Cli {
    pub fn report_kind(&self) -> ReportKind {
        if self.user {
            ReportKind::Detailed
        } else {
            ReportKind::Tier
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_tier_report() {
        let cli = Cli::parse_from(["t1report"]);
        assert_eq!(cli.report_kind(), ReportKind::Tier);
        assert!(!cli.interactive);
        assert_eq!(cli.format, OutputFormat::Table);
    }

    #[test]
    fn user_report_with_period() {
        let cli = Cli::parse_from(["t1report", "--user", "--year", "2024", "--month", "3"]);
        assert_eq!(cli.report_kind(), ReportKind::Detailed);
        assert_eq!((cli.year, cli.month), (Some(2024), Some(3)));
    }

    #[test]
    fn rejects_conflicting_or_partial_args() {
        assert!(Cli::try_parse_from(["t1report", "--tier", "--user"]).is_err());
        assert!(Cli::try_parse_from(["t1report", "--year", "2024"]).is_err());
        assert!(Cli::try_parse_from(["t1report", "--year", "2024", "--month", "13"]).is_err());
    }
}
