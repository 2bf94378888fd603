//! Job lifecycle events emitted by the runner.
//!
//! The runner is handed a [`JobEventSink`] at construction instead of
//! touching any process-wide logger or metric registry. Dispatch tasks emit
//! concurrently, so implementations must be `Send + Sync` and safe to call
//! from many tasks at once.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::CrontabEntry;

/// Result of one job dispatch, reported through [`JobEventSink::job_finished`].
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    /// Whether the subprocess exited with status zero.
    pub success: bool,
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    /// OS process id, when the spawn succeeded.
    pub pid: Option<u32>,
    /// Combined stdout + stderr. Empty output stays empty, callers decide
    /// whether to elide it.
    pub output: String,
    /// Wall-clock time from just before spawn to completion.
    #[serde(skip)]
    pub duration: Duration,
    /// Completion timestamp.
    pub finished_at: DateTime<Utc>,
    /// The nominal fire time this dispatch served.
    pub fired_at: DateTime<Utc>,
    /// The entry's next planned fire, if the schedule still has one.
    pub next_run: Option<DateTime<Utc>>,
}

/// Consumer of job lifecycle events.
///
/// All methods default to no-ops so sinks only implement what they care
/// about. Events are keyed by the entry itself; aggregating consumers use
/// the `(schedule, user, command)` tuple.
pub trait JobEventSink: Send + Sync {
    /// An entry was accepted by the runner and will be scheduled.
    fn job_registered(&self, _entry: &CrontabEntry) {}

    /// An entry was rejected at registration (bad schedule expression).
    fn job_registration_failed(&self, _entry: &CrontabEntry, _error: &str) {}

    /// A dispatch is about to spawn the subprocess.
    fn job_started(&self, _entry: &CrontabEntry) {}

    /// A dispatch completed, successfully or not.
    fn job_finished(&self, _entry: &CrontabEntry, _outcome: &JobOutcome) {}

    /// A dispatch was abandoned before the command ran (unknown user,
    /// spawn refusal). The command was not executed.
    fn job_skipped(&self, _entry: &CrontabEntry, _reason: &str) {}
}

/// Sink that drops every event. Useful in tests and tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl JobEventSink for NullSink {}
