use std::path::PathBuf;

use thiserror::Error;

/// Errors from crontab sources. Content problems are never errors — they
/// are skipped line by line — so this covers I/O only.
#[derive(Debug, Error)]
pub enum CrontabError {
    /// The source file could not be opened or read.
    #[error("cannot read crontab {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CrontabError>;
