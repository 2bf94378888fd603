//! `chronod-runner` — job registration, timing loop, and dispatch.
//!
//! A [`Runner`] owns the full job set for one daemon lifetime. Entries are
//! added before [`Runner::start`]; starting hands ownership to a single
//! timing-loop task that sleeps until the soonest next fire, dispatches
//! every due entry on its own task, and recomputes fire times. Stopping via
//! [`RunnerHandle::stop`] ends the loop but leaves in-flight subprocesses
//! running — a slow job never blocks shutdown or reload.
//!
//! There is no mid-flight add/remove: reload means building a brand-new
//! runner from freshly re-read sources and discarding this one.

pub mod error;
pub mod exec;
pub mod runner;

pub use error::{DispatchError, Result, RunnerError};
pub use runner::{Runner, RunnerHandle};
