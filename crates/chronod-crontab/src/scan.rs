//! Run-parts style directory scanning.
//!
//! Walks directories and turns eligible files into job entries, either by
//! parsing each file as a crontab ("include" mode) or by synthesising one
//! entry per executable under a caller-supplied schedule ("run-parts" mode).
//!
//! Eligibility is deliberately strict, matching traditional cron daemons:
//! regular files only (symlink targets resolved), and no group/other write
//! permission. Ineligible files and missing directories are diagnosed and
//! skipped, never fatal.

use std::fs::Metadata;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use chronod_core::CrontabEntry;

use crate::parser::{parse_crontab, Dialect};

/// Split an optional `user:` prefix off a scan path argument.
pub fn split_user_prefix(arg: &str) -> (Option<&str>, &str) {
    match arg.split_once(':') {
        Some((user, path)) if !user.is_empty() => (Some(user), path),
        _ => (None, arg),
    }
}

/// Scan directories whose files are themselves crontabs.
///
/// Each path may carry a `user:` prefix: prefixed paths are parsed in the
/// user dialect with that identity, unprefixed paths in the system dialect.
pub fn scan_crontab_dirs(paths: &[String]) -> Vec<CrontabEntry> {
    let mut entries = Vec::new();
    for arg in paths {
        let (user, path) = split_user_prefix(arg);
        let dialect = match user {
            Some(u) => Dialect::User {
                default_user: Some(u.to_string()),
            },
            None => Dialect::System,
        };
        for file in eligible_files(Path::new(path)) {
            match parse_crontab(&file, dialect.clone()) {
                Ok(parsed) => entries.extend(parsed),
                Err(e) => warn!(file = %file.display(), "skipping unreadable crontab: {e}"),
            }
        }
    }
    entries
}

/// Scan directories of executables, one synthetic entry per file, all under
/// the fixed `spec` schedule.
///
/// A `user:` prefix on a path overrides `default_user` for entries found
/// under it. Files must additionally be owner-executable.
pub fn scan_run_parts(
    spec: &str,
    paths: &[String],
    default_user: Option<&str>,
) -> Vec<CrontabEntry> {
    let mut entries = Vec::new();
    for arg in paths {
        let (user, path) = split_user_prefix(arg);
        let user = user.or(default_user);
        for file in eligible_files(Path::new(path)) {
            let meta = match std::fs::metadata(&file) {
                Ok(m) => m,
                Err(e) => {
                    warn!(file = %file.display(), "cannot stat candidate: {e}");
                    continue;
                }
            };
            if !is_owner_executable(&meta) {
                warn!(file = %file.display(), "ignoring non-executable file");
                continue;
            }
            entries.push(CrontabEntry {
                schedule: spec.to_string(),
                user: user.map(str::to_string),
                command: file.display().to_string(),
                env: Vec::new(),
                shell: None,
                source: file,
            });
        }
    }
    entries
}

/// Walk `dir` and return eligible candidate files as absolute paths.
///
/// Missing or non-directory top-level paths are diagnosed and produce an
/// empty list.
fn eligible_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        warn!(path = %dir.display(), "path does not exist or is not a directory");
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), "walk error: {e}");
                continue;
            }
        };
        // metadata() on the path resolves symlinks, so a symlink to a valid
        // regular file is eligible while dangling links are not.
        let meta = match std::fs::metadata(entry.path()) {
            Ok(m) => m,
            Err(e) => {
                warn!(file = %entry.path().display(), "cannot stat: {e}");
                continue;
            }
        };
        if meta.is_dir() {
            continue;
        }
        if !is_valid_mode(&meta) {
            warn!(
                file = %entry.path().display(),
                mode = format_args!("{:04o}", meta.permissions().mode() & 0o7777),
                "ignoring file with group/other write permission"
            );
            continue;
        }
        let abs = std::path::absolute(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
        debug!(file = %abs.display(), "found scan candidate");
        files.push(abs);
    }
    files.sort();
    files
}

/// Candidate rule shared by both modes: a regular file that neither group
/// nor other can write (mode & 0022 == 0).
pub fn is_valid_mode(meta: &Metadata) -> bool {
    meta.is_file() && meta.permissions().mode() & 0o022 == 0
}

/// Additional run-parts rule: executable by its owner.
pub fn is_owner_executable(meta: &Metadata) -> bool {
    meta.permissions().mode() & 0o100 != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn write_mode(dir: &Path, name: &str, contents: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn split_user_prefix_forms() {
        assert_eq!(split_user_prefix("/etc/cron.d"), (None, "/etc/cron.d"));
        assert_eq!(
            split_user_prefix("www-data:/srv/jobs"),
            (Some("www-data"), "/srv/jobs")
        );
        assert_eq!(split_user_prefix(":/srv/jobs"), (None, ":/srv/jobs"));
    }

    #[test]
    fn mode_0644_is_valid_crontab_candidate() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "jobs", "* * * * * root echo hi\n", 0o644);
        let entries = scan_crontab_dirs(&[dir.path().display().to_string()]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user.as_deref(), Some("root"));
    }

    #[test]
    fn group_writable_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "jobs", "* * * * * root echo hi\n", 0o646);
        assert!(scan_crontab_dirs(&[dir.path().display().to_string()]).is_empty());
    }

    #[test]
    fn run_parts_requires_owner_executable() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "runnable", "#!/bin/sh\n", 0o744);
        write_mode(dir.path(), "plain", "#!/bin/sh\n", 0o644);

        let entries = scan_run_parts("@every 1m", &[dir.path().display().to_string()], None);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].command.ends_with("/runnable"));
        assert_eq!(entries[0].schedule, "@every 1m");
        assert_eq!(entries[0].user, None);
        assert!(entries[0].env.is_empty());
        assert_eq!(entries[0].shell, None);
    }

    #[test]
    fn run_parts_commands_are_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "task", "#!/bin/sh\n", 0o755);
        let entries = scan_run_parts("@hourly", &[dir.path().display().to_string()], None);
        assert!(Path::new(&entries[0].command).is_absolute());
    }

    #[test]
    fn user_prefix_overrides_default_identity() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "task", "#!/bin/sh\n", 0o755);
        let arg = format!("svc:{}", dir.path().display());
        let entries = scan_run_parts("@hourly", &[arg], Some("root"));
        assert_eq!(entries[0].user.as_deref(), Some("svc"));
    }

    #[test]
    fn default_user_applies_without_prefix() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "task", "#!/bin/sh\n", 0o755);
        let entries = scan_run_parts("@hourly", &[dir.path().display().to_string()], Some("root"));
        assert_eq!(entries[0].user.as_deref(), Some("root"));
    }

    #[test]
    fn user_prefixed_crontab_dir_parses_in_user_dialect() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "jobs", "* * * * * echo hi\n", 0o600);
        let arg = format!("alice:{}", dir.path().display());
        let entries = scan_crontab_dirs(&[arg]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user.as_deref(), Some("alice"));
        assert_eq!(entries[0].command, "echo hi");
    }

    #[test]
    fn missing_directory_is_not_fatal() {
        assert!(scan_crontab_dirs(&["/nonexistent/cron.d".to_string()]).is_empty());
        assert!(scan_run_parts("@daily", &["/nonexistent/jobs".to_string()], None).is_empty());
    }
}
