use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use t1report::cli::{Cli, OutputFormat};
use t1report::config::load_config;
use t1report::format::format_entry;
use t1report::output;
use t1report::period::ReportPeriod;
use t1report::pipeline::Pipeline;
use t1report::redact::{redact_entries, CommandRedactor};
use t1report::storage::sqlite_store::SqliteStore;
use t1report::storage::{ReportSink, UsageSource};
use t1report::warnings::HostWarnings;

fn report_period(cli: &Cli) -> Result<ReportPeriod> {
    match (cli.year, cli.month) {
        (Some(year), Some(month)) => ReportPeriod::new(year, month),
        _ => ReportPeriod::previous_month(chrono::Local::now().date_naive()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    t1report::logging::init(cli.verbose);

    let config = load_config(cli.config.as_deref()).context("cannot start without configuration")?;
    let kind = cli.report_kind();
    let period = report_period(&cli)?;

    info!(
        year = period.year,
        month = period.month,
        kind = ?kind,
        interactive = cli.interactive,
        "starting report"
    );

    let mut store = SqliteStore::open(&config.database.path, &config.database.source_view)?;
    let raw = store.fetch_month(&period)?;

    let mut warnings = HostWarnings::new();
    let mut entries = Pipeline::from_config(&config, kind).run(raw, &mut warnings);

    if config.redaction.mode.applies(kind, cli.interactive) {
        // parse_config guarantees a command for every mode but `never`.
        let program = config
            .redaction
            .command
            .as_ref()
            .context("redaction enabled without redaction.command")?;
        let mut redactor = CommandRedactor::new(program);
        redact_entries(&mut entries, &mut redactor)?;
    }

    if cli.interactive {
        match cli.format {
            OutputFormat::Table => output::print_table(&entries, kind, &period),
            OutputFormat::Json => output::print_json(&entries, kind, &period)?,
        }
        return Ok(());
    }

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| format_entry(e, kind, &period))
        .collect();
    let written = store.replace_period(kind, &period, &rows)?;
    eprintln!(
        "Wrote {written} rows to {} for {}-{:02}.",
        kind.table_name(),
        period.year,
        period.month
    );

    Ok(())
}
