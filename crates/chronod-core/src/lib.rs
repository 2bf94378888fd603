//! `chronod-core` — shared types for the chronod daemon.
//!
//! Holds the plain-data [`CrontabEntry`] produced by the crontab parser and
//! directory scanner, and the [`JobEventSink`] capability through which the
//! runner reports job lifecycle events to whatever observability backend the
//! binary wires in. No ambient global state lives here.

pub mod events;
pub mod types;

pub use events::{JobEventSink, JobOutcome, NullSink};
pub use types::{CrontabEntry, JobHandle, DEFAULT_SHELL};
