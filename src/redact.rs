use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::types::{ReportKind, UsageRecord};

/// When user identities are replaced by opaque tokens before writing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionMode {
    /// Only for detailed reports that are written to the database.
    #[default]
    Auto,
    Always,
    Never,
}

impl RedactionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RedactionMode::Auto => "auto",
            RedactionMode::Always => "always",
            RedactionMode::Never => "never",
        }
    }

    pub fn applies(self, kind: ReportKind, interactive: bool) -> bool {
        match self {
            RedactionMode::Auto => kind == ReportKind::Detailed && !interactive,
            RedactionMode::Always => true,
            RedactionMode::Never => false,
        }
    }
}

pub trait Redactor {
    /// Opaque token for `identity`. The same identity yields the same
    /// token within one run.
    fn redact(&mut self, identity: &str) -> Result<String>;
}

/// Runs an external helper once per distinct identity: identity on stdin,
/// token on stdout.
pub struct CommandRedactor {
    program: PathBuf,
    cache: HashMap<String, String>,
}

impl CommandRedactor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cache: HashMap::new(),
        }
    }

    fn run_helper(&self, identity: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start {}", self.program.display()))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .context("redaction helper has no stdin")?;
            writeln!(stdin, "{identity}").context("failed to write to redaction helper")?;
        }

        let output = child
            .wait_with_output()
            .context("redaction helper did not finish")?;
        if !output.status.success() {
            bail!(
                "{} exited with {}",
                self.program.display(),
                output.status
            );
        }

        let token = String::from_utf8(output.stdout)
            .context("redaction helper produced non-UTF-8 output")?
            .trim()
            .to_string();
        if token.is_empty() {
            bail!("{} produced an empty token", self.program.display());
        }
        Ok(token)
    }
}

impl Redactor for CommandRedactor {
    fn redact(&mut self, identity: &str) -> Result<String> {
        if let Some(token) = self.cache.get(identity) {
            return Ok(token.clone());
        }
        let token = self.run_helper(identity)?;
        self.cache.insert(identity.to_string(), token.clone());
        Ok(token)
    }
}

/// Replace every entry's user identity. Stops at the first failure so no
/// partially redacted batch is written.
pub fn redact_entries(entries: &mut [UsageRecord], redactor: &mut dyn Redactor) -> Result<()> {
    for entry in entries.iter_mut() {
        if let Some(identity) = entry.user_identity.as_deref() {
            let token = redactor
                .redact(identity)
                .with_context(|| format!("failed to redact identity for {}", entry.site))?;
            entry.user_identity = Some(token);
        }
    }
    Ok(())
}
