use thiserror::Error;

/// Errors surfaced when registering entries with a runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The entry's schedule expression did not parse.
    #[error(transparent)]
    InvalidSchedule(#[from] chronod_cron::CronError),

    /// The schedule parsed but has no fire time within the search horizon
    /// (e.g. `30 2 30 2 *`).
    #[error("schedule '{schedule}' never fires within the search horizon")]
    UnsatisfiableSchedule { schedule: String },
}

pub type Result<T> = std::result::Result<T, RunnerError>;

/// Reasons a single dispatch was abandoned without executing the command.
///
/// These never propagate to the runner or other jobs; they surface as one
/// `job_skipped` event per dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown user '{0}'")]
    UnknownUser(String),

    #[cfg(unix)]
    #[error("user lookup for '{name}' failed: {source}")]
    UserLookup {
        name: String,
        #[source]
        source: nix::Error,
    },

    #[error("cannot spawn subprocess: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("cannot collect subprocess output: {0}")]
    Wait(#[source] std::io::Error),

    /// Identity switching was requested but cannot be applied atomically at
    /// spawn time on this platform. The dispatch fails closed.
    #[error("user switching is not supported on this platform")]
    Unsupported,
}
