//! `chronod-crontab` — crontab file parsing and run-parts directory scanning.
//!
//! Two ways of turning files into [`chronod_core::CrontabEntry`] lists:
//!
//! - [`parser`]: line-oriented crontab parsing in the *system* dialect (each
//!   job line carries a user field) or the *user* dialect (a caller-supplied
//!   default applies). Malformed lines are skipped with a diagnostic, never
//!   fatal; only failing to read the source is an error.
//! - [`scan`]: run-parts style directory walks, where every eligible file is
//!   either parsed as a crontab or becomes one synthetic entry under a fixed
//!   schedule. World/group-writable files are refused.

pub mod error;
pub mod parser;
pub mod scan;

pub use error::{CrontabError, Result};
pub use parser::{CrontabParser, Dialect};
pub use scan::{scan_crontab_dirs, scan_run_parts, split_user_prefix};
