//! Crontab source collection.
//!
//! Turns the daemon options into entry lists: explicitly named crontab
//! files, include directories, run-parts directories with fixed or custom
//! intervals, and (with `--auto`) the distribution's default locations.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use chronod_core::CrontabEntry;
use chronod_crontab::parser::parse_crontab;
use chronod_crontab::scan::{is_valid_mode, scan_crontab_dirs, scan_run_parts};
use chronod_crontab::{split_user_prefix, Dialect};

use crate::opts::Opts;

/// Entries gathered from all configured sources.
///
/// Explicitly named crontab files are kept apart from discovered ones: a
/// schedule that fails to register from an explicit file aborts startup,
/// while discovered sources are diagnosed and skipped.
pub struct Collected {
    pub explicit: Vec<CrontabEntry>,
    pub discovered: Vec<CrontabEntry>,
}

pub fn collect(opts: &Opts) -> Result<Collected> {
    let mut explicit = Vec::new();
    for arg in &opts.crontabs {
        let (user, path) = split_user_prefix(arg);
        let path = std::path::absolute(path)
            .with_context(|| format!("cannot resolve crontab path '{path}'"))?;
        let meta = std::fs::metadata(&path)
            .with_context(|| format!("cannot read crontab {}", path.display()))?;
        if !is_valid_mode(&meta) {
            warn!(file = %path.display(), "ignoring crontab with group/other write permission");
            continue;
        }
        let dialect = match user {
            Some(u) => Dialect::User {
                default_user: Some(u.to_string()),
            },
            None => Dialect::System,
        };
        explicit.extend(parse_crontab(&path, dialect)?);
    }

    let mut discovered = Vec::new();

    if opts.auto {
        discovered.extend(system_default_entries(&opts.default_user));
    }

    discovered.extend(scan_crontab_dirs(&opts.include));

    for arg in &opts.run_parts {
        match arg.split_once(':') {
            Some((duration, path)) if !duration.is_empty() => {
                let schedule = format!("@every {duration}");
                discovered.extend(scan_run_parts(
                    &schedule,
                    &[path.to_string()],
                    Some(&opts.default_user),
                ));
            }
            _ => warn!(arg = %arg, "ignoring --run-parts argument without a time spec"),
        }
    }

    let fixed: [(&str, &Vec<String>); 6] = [
        ("@every 1m", &opts.run_parts_1min),
        ("*/15 * * * *", &opts.run_parts_15min),
        ("@hourly", &opts.run_parts_hourly),
        ("@daily", &opts.run_parts_daily),
        ("@weekly", &opts.run_parts_weekly),
        ("@monthly", &opts.run_parts_monthly),
    ];
    for (schedule, dirs) in fixed {
        if !dirs.is_empty() {
            discovered.extend(scan_run_parts(schedule, dirs, Some(&opts.default_user)));
        }
    }

    info!(
        explicit = explicit.len(),
        discovered = discovered.len(),
        "collected crontab entries"
    );
    Ok(Collected {
        explicit,
        discovered,
    })
}

/// Distribution defaults for `--auto`.
///
/// Probes well-known release files, then pulls in the crontab locations
/// that family uses. `/etc/cron.d` is always included when present. Only
/// root-owned sources are trusted.
fn system_default_entries(default_user: &str) -> Vec<CrontabEntry> {
    let mut entries = Vec::new();
    let mut detected = false;

    if root_owned("/etc/alpine-release") {
        info!("detected Alpine family, using distribution defaults");
        if Path::new("/etc/crontabs").is_dir() {
            // Alpine keeps user-dialect crontabs in /etc/crontabs.
            entries.extend(scan_crontab_dirs(&[format!("{default_user}:/etc/crontabs")]));
        }
        detected = true;
    }

    if root_owned("/etc/redhat-release") {
        info!("detected RedHat family, using distribution defaults");
        if root_owned("/etc/crontabs") {
            entries.extend(scan_crontab_dirs(&["/etc/crontabs".to_string()]));
        }
        detected = true;
    }

    if root_owned("/etc/SuSE-release") {
        info!("detected SuSE family, using distribution defaults");
        if root_owned("/etc/crontab") {
            entries.extend(discovered_crontab_file("/etc/crontab"));
        }
        detected = true;
    }

    if root_owned("/etc/debian_version") {
        info!("detected Debian family, using distribution defaults");
        if root_owned("/etc/crontab") {
            entries.extend(discovered_crontab_file("/etc/crontab"));
        }
        detected = true;
    }

    if !detected {
        if root_owned("/etc/crontab") {
            entries.extend(discovered_crontab_file("/etc/crontab"));
        }
        if root_owned("/etc/crontabs") {
            entries.extend(scan_crontab_dirs(&["/etc/crontabs".to_string()]));
        }
    }

    if Path::new("/etc/cron.d").is_dir() {
        entries.extend(scan_crontab_dirs(&["/etc/cron.d".to_string()]));
    }

    entries
}

/// Parse a discovered system crontab file, skipping it on read failure.
fn discovered_crontab_file(path: &str) -> Vec<CrontabEntry> {
    match parse_crontab(Path::new(path), Dialect::System) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(file = path, "skipping unreadable crontab: {e}");
            Vec::new()
        }
    }
}

fn root_owned(path: &str) -> bool {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(path).map(|m| m.uid() == 0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn write_mode(dir: &Path, name: &str, contents: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn explicit_crontab_with_user_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let tab = write_mode(dir.path(), "tab", "* * * * * echo hi\n", 0o644);
        let arg = format!("alice:{}", tab.display());

        let opts = Opts::parse_from(["chronod", &arg]);
        let collected = collect(&opts).unwrap();
        assert_eq!(collected.explicit.len(), 1);
        assert_eq!(collected.explicit[0].user.as_deref(), Some("alice"));
        assert_eq!(collected.explicit[0].command, "echo hi");
        assert!(collected.discovered.is_empty());
    }

    #[test]
    fn missing_explicit_crontab_is_fatal() {
        let opts = Opts::parse_from(["chronod", "/nonexistent/crontab"]);
        assert!(collect(&opts).is_err());
    }

    #[test]
    fn group_writable_explicit_crontab_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let tab = write_mode(dir.path(), "tab", "* * * * * echo hi\n", 0o664);
        let arg = tab.display().to_string();

        let opts = Opts::parse_from(["chronod", &arg]);
        let collected = collect(&opts).unwrap();
        assert!(collected.explicit.is_empty());
    }

    #[test]
    fn run_parts_interval_builds_every_schedule() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "task", "#!/bin/sh\n", 0o755);
        let arg = format!("30s:{}", dir.path().display());

        let opts = Opts::parse_from(["chronod", "--run-parts", &arg]);
        let collected = collect(&opts).unwrap();
        assert_eq!(collected.discovered.len(), 1);
        assert_eq!(collected.discovered[0].schedule, "@every 30s");
        assert_eq!(collected.discovered[0].user.as_deref(), Some("root"));
    }

    #[test]
    fn run_parts_without_time_spec_is_ignored() {
        let opts = Opts::parse_from(["chronod", "--run-parts", "/no/time/spec"]);
        let collected = collect(&opts).unwrap();
        assert!(collected.discovered.is_empty());
    }

    #[test]
    fn fixed_run_parts_variants_use_their_schedule() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "task", "#!/bin/sh\n", 0o755);
        let path = dir.path().display().to_string();

        let opts = Opts::parse_from(["chronod", "--run-parts-15min", &path]);
        let collected = collect(&opts).unwrap();
        assert_eq!(collected.discovered.len(), 1);
        assert_eq!(collected.discovered[0].schedule, "*/15 * * * *");

        let opts = Opts::parse_from(["chronod", "--run-parts-daily", &path]);
        let collected = collect(&opts).unwrap();
        assert_eq!(collected.discovered[0].schedule, "@daily");
    }

    #[test]
    fn include_directory_is_discovered() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "jobs", "* * * * * svc echo hi\n", 0o644);
        let path = dir.path().display().to_string();

        let opts = Opts::parse_from(["chronod", "--include", &path]);
        let collected = collect(&opts).unwrap();
        assert_eq!(collected.discovered.len(), 1);
        assert_eq!(collected.discovered[0].user.as_deref(), Some("svc"));
    }
}
