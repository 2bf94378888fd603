//! Line-oriented crontab parsing.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::warn;

use chronod_core::CrontabEntry;

use crate::error::{CrontabError, Result};

/// Which job-line grammar applies to a crontab source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialect {
    /// System crontab: `<schedule> <user> <command>`.
    System,
    /// User crontab: `<schedule> <command>`, every entry running as
    /// `default_user` (`None` keeps the daemon's own identity).
    User { default_user: Option<String> },
}

/// Stateful crontab parser.
///
/// Scans top to bottom, tracking the running environment list and the
/// current `SHELL=` override: both apply to all *subsequent* job lines of
/// the same source, never retroactively.
pub struct CrontabParser {
    dialect: Dialect,
    env_re: Regex,
    job_re: Regex,
}

// `@every <dur>` must be tried before the generic `@macro` alternative so
// the duration token is captured as part of the schedule.
const SCHEDULE_PATTERN: &str = r"@every\s+\S+|@\S+|\S+\s+\S+\s+\S+\s+\S+\s+\S+";

impl CrontabParser {
    pub fn new(dialect: Dialect) -> Self {
        let job_re = match dialect {
            Dialect::System => Regex::new(&format!(
                r"^(?P<spec>{SCHEDULE_PATTERN})\s+(?P<user>\S+)\s+(?P<cmd>.+)$"
            )),
            Dialect::User { .. } => {
                Regex::new(&format!(r"^(?P<spec>{SCHEDULE_PATTERN})\s+(?P<cmd>.+)$"))
            }
        }
        .expect("static regex");

        Self {
            dialect,
            env_re: Regex::new(r"^(?P<name>[^\s=]+)=(?P<value>\S+)\s*$").expect("static regex"),
            job_re,
        }
    }

    /// Read and parse a crontab file. Only I/O failures are errors; a file
    /// with zero recognised job lines yields an empty list.
    pub fn parse_file(&self, path: &Path) -> Result<Vec<CrontabEntry>> {
        let text = fs::read_to_string(path).map_err(|source| CrontabError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.parse_text(&text, path))
    }

    /// Parse crontab text, attributing entries to `source` for diagnostics.
    pub fn parse_text(&self, text: &str, source: &Path) -> Vec<CrontabEntry> {
        let mut entries = Vec::new();
        let mut shell: Option<String> = None;
        let mut env: Vec<String> = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(caps) = self.env_re.captures(line) {
                let name = &caps["name"];
                let value = &caps["value"];
                if name == "SHELL" {
                    shell = Some(value.to_string());
                } else {
                    env.push(format!("{name}={value}"));
                }
                continue;
            }

            if let Some(caps) = self.job_re.captures(line) {
                let schedule = collapse_whitespace(&caps["spec"]);
                let user = match &self.dialect {
                    Dialect::System => Some(caps["user"].to_string()),
                    Dialect::User { default_user } => default_user.clone(),
                };
                entries.push(CrontabEntry {
                    schedule,
                    user,
                    command: caps["cmd"].to_string(),
                    env: env.clone(),
                    shell: shell.clone(),
                    source: source.to_path_buf(),
                });
                continue;
            }

            warn!(source = %source.display(), line, "skipping unparseable crontab line");
        }

        entries
    }
}

/// Parse `path` with the given dialect. Convenience wrapper used by the
/// scanner and the daemon's source collection.
pub fn parse_crontab(path: &Path, dialect: Dialect) -> Result<Vec<CrontabEntry>> {
    CrontabParser::new(dialect).parse_file(path)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
