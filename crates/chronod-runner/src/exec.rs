//! Single job dispatch: build the subprocess, drop privileges, capture
//! output.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local, Utc};
use tokio::process::Command;
use tracing::debug;

use chronod_core::{CrontabEntry, JobEventSink, JobOutcome};

use crate::error::DispatchError;

/// Outcome of a spawned subprocess before it is wrapped into a
/// [`JobOutcome`].
struct CommandResult {
    pid: Option<u32>,
    success: bool,
    exit_code: Option<i32>,
    output: String,
}

/// Run one dispatch to completion and report through the sink.
///
/// Runs on its own task; the timing loop never awaits it. Any abandonment
/// before the command executes (unknown user, spawn failure, missing
/// platform support for the requested identity switch) is reported as a
/// single `job_skipped` event.
pub(crate) async fn dispatch(
    entry: Arc<CrontabEntry>,
    sink: Arc<dyn JobEventSink>,
    switch_user: bool,
    fired_at: DateTime<Local>,
    next_run: Option<DateTime<Local>>,
) {
    sink.job_started(&entry);
    let started = Instant::now();

    match run_command(&entry, switch_user).await {
        Ok(result) => {
            let outcome = JobOutcome {
                success: result.success,
                exit_code: result.exit_code,
                pid: result.pid,
                output: result.output,
                duration: started.elapsed(),
                finished_at: Utc::now(),
                fired_at: fired_at.with_timezone(&Utc),
                next_run: next_run.map(|t| t.with_timezone(&Utc)),
            };
            sink.job_finished(&entry, &outcome);
        }
        Err(reason) => {
            sink.job_skipped(&entry, &reason.to_string());
        }
    }
}

async fn run_command(
    entry: &CrontabEntry,
    switch_user: bool,
) -> std::result::Result<CommandResult, DispatchError> {
    let shell = entry.effective_shell();
    debug!(entry = %entry, shell, "spawning job");

    let mut cmd = Command::new(shell);
    cmd.arg("-c")
        .arg(&entry.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Entry env is appended to the daemon's inherited environment; later
    // `env` calls win on duplicate names, matching last-write-wins.
    for pair in &entry.env {
        if let Some((name, value)) = pair.split_once('=') {
            cmd.env(name, value);
        }
    }

    if switch_user {
        if let Some(user) = entry.user.as_deref() {
            let (uid, gid) = resolve_user(user)?;
            apply_credentials(&mut cmd, uid, gid)?;
        }
    }

    let child = cmd.spawn().map_err(DispatchError::Spawn)?;
    let pid = child.id();
    let output = child.wait_with_output().await.map_err(DispatchError::Wait)?;

    Ok(CommandResult {
        pid,
        success: output.status.success(),
        exit_code: output.status.code(),
        output: combine_output(&output.stdout, &output.stderr),
    })
}

/// Resolve a user name to numeric uid/gid.
#[cfg(unix)]
fn resolve_user(name: &str) -> std::result::Result<(u32, u32), DispatchError> {
    match nix::unistd::User::from_name(name) {
        Ok(Some(user)) => Ok((user.uid.as_raw(), user.gid.as_raw())),
        Ok(None) => Err(DispatchError::UnknownUser(name.to_string())),
        Err(source) => Err(DispatchError::UserLookup {
            name: name.to_string(),
            source,
        }),
    }
}

#[cfg(not(unix))]
fn resolve_user(_name: &str) -> std::result::Result<(u32, u32), DispatchError> {
    Err(DispatchError::Unsupported)
}

/// Arrange for the child to start with the given identity.
///
/// The runtime applies uid/gid between fork and exec, so the command never
/// runs a single instruction with the daemon's own privileges.
#[cfg(unix)]
fn apply_credentials(cmd: &mut Command, uid: u32, gid: u32) -> std::result::Result<(), DispatchError> {
    cmd.uid(uid).gid(gid);
    Ok(())
}

#[cfg(not(unix))]
fn apply_credentials(
    _cmd: &mut Command,
    _uid: u32,
    _gid: u32,
) -> std::result::Result<(), DispatchError> {
    Err(DispatchError::Unsupported)
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut out = String::from_utf8_lossy(stdout).into_owned();
    let err = String::from_utf8_lossy(stderr);
    if !err.is_empty() {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&err);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_output_joins_streams() {
        assert_eq!(combine_output(b"", b""), "");
        assert_eq!(combine_output(b"out\n", b""), "out\n");
        assert_eq!(combine_output(b"", b"err\n"), "err\n");
        assert_eq!(combine_output(b"out", b"err\n"), "out\nerr\n");
    }

    #[cfg(unix)]
    #[test]
    fn unknown_user_fails_resolution() {
        let err = resolve_user("chronod-no-such-user").unwrap_err();
        assert!(matches!(err, DispatchError::UnknownUser(_)));
    }

    #[cfg(unix)]
    #[test]
    fn root_resolves_to_uid_zero() {
        let (uid, _gid) = resolve_user("root").unwrap();
        assert_eq!(uid, 0);
    }
}
