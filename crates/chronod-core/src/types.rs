use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Shell used when neither the crontab nor the entry specifies one.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// One scheduled unit of work, as read from a crontab file or synthesised
/// by the run-parts scanner.
///
/// Entries are immutable after parsing. The runner assigns a [`JobHandle`]
/// at registration time; the entry itself never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrontabEntry {
    /// Raw schedule expression: five-field cron syntax, an `@` macro, or
    /// `@every <duration>`.
    pub schedule: String,
    /// Identity to run the command as. `None` means the daemon's own user.
    pub user: Option<String>,
    /// Shell command line, executed via `shell -c`.
    pub command: String,
    /// Extra `NAME=VALUE` pairs appended to the subprocess environment.
    /// Later entries win on duplicate names.
    pub env: Vec<String>,
    /// Interpreter override (`SHELL=` line in the crontab). Falls back to
    /// [`DEFAULT_SHELL`] when unset.
    pub shell: Option<String>,
    /// Originating file, kept for diagnostics.
    pub source: PathBuf,
}

impl CrontabEntry {
    /// Shell this entry's command should be run with.
    pub fn effective_shell(&self) -> &str {
        self.shell.as_deref().unwrap_or(DEFAULT_SHELL)
    }

    /// User label for logs and metrics. Entries without a user switch are
    /// reported under the daemon's own identity marker.
    pub fn user_label(&self) -> &str {
        self.user.as_deref().unwrap_or("-")
    }
}

impl fmt::Display for CrontabEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "spec:'{}' usr:{} cmd:'{}'",
            self.schedule,
            self.user_label(),
            self.command
        )?;
        if !self.env.is_empty() {
            write!(f, " env:{:?}", self.env)?;
        }
        Ok(())
    }
}

/// Opaque identifier for an entry registered with a runner.
///
/// Assigned exactly once, by the runner, at registration; only meaningful
/// against the runner that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(pub usize);

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> CrontabEntry {
        CrontabEntry {
            schedule: "*/10 * * * *".into(),
            user: Some("svc".into()),
            command: "echo hi".into(),
            env: vec![],
            shell: None,
            source: PathBuf::from("/etc/crontab"),
        }
    }

    #[test]
    fn default_shell_when_unset() {
        assert_eq!(entry().effective_shell(), DEFAULT_SHELL);
    }

    #[test]
    fn shell_override_wins() {
        let mut e = entry();
        e.shell = Some("/bin/bash".into());
        assert_eq!(e.effective_shell(), "/bin/bash");
    }

    #[test]
    fn display_includes_env_only_when_present() {
        let mut e = entry();
        assert_eq!(format!("{e}"), "spec:'*/10 * * * *' usr:svc cmd:'echo hi'");
        e.env.push("FOO=bar".into());
        assert!(format!("{e}").contains("env:[\"FOO=bar\"]"));
    }
}
