//! The runner: holds the registered job set and drives the timing loop.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Local};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use chronod_core::{CrontabEntry, JobEventSink, JobHandle};
use chronod_cron::{parse::parse, Schedule};

use crate::error::{Result, RunnerError};
use crate::exec::dispatch;

/// Idle wait when no entry has a future fire time. The loop still wakes to
/// observe the stop signal.
const IDLE_WAIT: StdDuration = StdDuration::from_secs(3600);

struct Slot {
    entry: Arc<CrontabEntry>,
    schedule: Schedule,
    /// Next planned fire; `None` once the schedule is exhausted.
    next: Option<DateTime<Local>>,
}

/// Owns the job set for one daemon lifetime.
///
/// Lifecycle: construct empty, [`add`](Runner::add) entries, then
/// [`start`](Runner::start) exactly once. The job set is fixed after start;
/// reload builds a new runner from fresh sources.
pub struct Runner {
    sink: Arc<dyn JobEventSink>,
    /// Whether dispatches honour per-entry users. Decided once at daemon
    /// startup; disabled when the daemon is not privileged to switch.
    switch_users: bool,
    slots: Vec<Slot>,
}

impl Runner {
    pub fn new(sink: Arc<dyn JobEventSink>, switch_users: bool) -> Self {
        Self {
            sink,
            switch_users,
            slots: Vec::new(),
        }
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Register an entry: parse its schedule, compute the first fire time,
    /// and record it under a fresh handle.
    ///
    /// A rejected entry emits a `job_registration_failed` event and leaves
    /// the rest of the caller's batch unaffected.
    pub fn add(&mut self, entry: CrontabEntry) -> Result<JobHandle> {
        let schedule = match parse(&entry.schedule) {
            Ok(s) => s,
            Err(e) => {
                self.sink.job_registration_failed(&entry, &e.to_string());
                return Err(RunnerError::InvalidSchedule(e));
            }
        };

        // First fire is measured from registration time.
        let now = Local::now();
        let Some(next) = schedule.next_after(now) else {
            let err = RunnerError::UnsatisfiableSchedule {
                schedule: entry.schedule.clone(),
            };
            self.sink.job_registration_failed(&entry, &err.to_string());
            return Err(err);
        };

        let handle = JobHandle(self.slots.len());
        self.sink.job_registered(&entry);
        info!(%handle, %entry, "job registered");

        self.slots.push(Slot {
            entry: Arc::new(entry),
            schedule,
            next: Some(next),
        });
        Ok(handle)
    }

    /// Start the timing loop and hand back a stop handle.
    ///
    /// One loop task per runner. Each wake collects the full set of due
    /// entries as one snapshot, launches every dispatch on its own task
    /// (fire-and-continue), and recomputes each fired entry's next time
    /// from "now" — fire times per entry are strictly increasing and a
    /// nominal fire time is dispatched at most once. Overlapping runs of
    /// the same entry are possible when its interval is shorter than its
    /// execution time; no single-flight de-duplication is performed.
    pub fn start(self) -> RunnerHandle {
        info!(jobs = self.slots.len(), "starting runner");
        let (stop_tx, stop_rx) = watch::channel(false);
        let join = tokio::spawn(run_loop(
            self.slots,
            self.sink,
            self.switch_users,
            stop_rx,
        ));
        RunnerHandle { stop_tx, join }
    }
}

/// Handle to a started runner.
pub struct RunnerHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl RunnerHandle {
    /// Signal the timing loop to exit and wait for it to do so.
    ///
    /// Does not wait for in-flight job subprocesses: they continue running
    /// detached from the runner's lifecycle.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.join.await;
        info!("runner stopped");
    }
}

async fn run_loop(
    mut slots: Vec<Slot>,
    sink: Arc<dyn JobEventSink>,
    switch_users: bool,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let wake_at = slots.iter().filter_map(|s| s.next).min();
        let wait = match wake_at {
            Some(at) => (at - Local::now()).to_std().unwrap_or(StdDuration::ZERO),
            None => IDLE_WAIT,
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
        }
        if *stop.borrow() {
            break;
        }

        // Snapshot every due entry before dispatching any of them, so
        // same-instant siblings are never skipped by earlier dispatches.
        let now = Local::now();
        let mut due = Vec::new();
        for slot in slots.iter_mut() {
            let Some(next) = slot.next else { continue };
            if next > now {
                continue;
            }
            slot.next = slot.schedule.next_after(now);
            if slot.next.is_none() {
                warn!(entry = %slot.entry, "schedule has no further fire times");
            }
            due.push((Arc::clone(&slot.entry), next, slot.next));
        }

        for (entry, fired_at, next_run) in due {
            let sink = Arc::clone(&sink);
            tokio::spawn(dispatch(entry, sink, switch_users, fired_at, next_run));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chronod_core::{JobOutcome, NullSink};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    fn entry(schedule: &str, command: &str, user: Option<&str>) -> CrontabEntry {
        CrontabEntry {
            schedule: schedule.to_string(),
            user: user.map(str::to_string),
            command: command.to_string(),
            env: vec![],
            shell: None,
            source: PathBuf::from("test"),
        }
    }

    /// Records every event for assertions. Emission happens concurrently
    /// from dispatch tasks, hence the mutexes.
    #[derive(Default)]
    struct RecordingSink {
        registered: Mutex<Vec<String>>,
        failed: Mutex<Vec<String>>,
        started: Mutex<Vec<String>>,
        finished: Mutex<Vec<(String, JobOutcome)>>,
        skipped: Mutex<Vec<(String, String)>>,
    }

    impl JobEventSink for RecordingSink {
        fn job_registered(&self, entry: &CrontabEntry) {
            self.registered.lock().unwrap().push(entry.command.clone());
        }
        fn job_registration_failed(&self, entry: &CrontabEntry, _error: &str) {
            self.failed.lock().unwrap().push(entry.command.clone());
        }
        fn job_started(&self, entry: &CrontabEntry) {
            self.started.lock().unwrap().push(entry.command.clone());
        }
        fn job_finished(&self, entry: &CrontabEntry, outcome: &JobOutcome) {
            self.finished
                .lock()
                .unwrap()
                .push((entry.command.clone(), outcome.clone()));
        }
        fn job_skipped(&self, entry: &CrontabEntry, reason: &str) {
            self.skipped
                .lock()
                .unwrap()
                .push((entry.command.clone(), reason.to_string()));
        }
    }

    #[tokio::test]
    async fn stop_right_after_start_with_no_entries() {
        let runner = Runner::new(Arc::new(NullSink), true);
        let handle = runner.start();
        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop must return promptly with zero entries");
    }

    #[tokio::test]
    async fn invalid_schedule_is_reported_and_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let mut runner = Runner::new(Arc::clone(&sink) as Arc<dyn JobEventSink>, true);

        assert!(runner.add(entry("not a schedule", "echo", None)).is_err());
        assert!(runner.add(entry("30 2 30 2 *", "echo", None)).is_err());
        // The batch continues: a later valid entry still registers.
        assert!(runner.add(entry("@daily", "echo", None)).is_ok());

        assert_eq!(sink.failed.lock().unwrap().len(), 2);
        assert_eq!(sink.registered.lock().unwrap().len(), 1);
        assert_eq!(runner.len(), 1);
    }

    #[tokio::test]
    async fn handles_are_assigned_densely() {
        let mut runner = Runner::new(Arc::new(NullSink), true);
        let a = runner.add(entry("@daily", "a", None)).unwrap();
        let b = runner.add(entry("@hourly", "b", None)).unwrap();
        assert_eq!(a, JobHandle(0));
        assert_eq!(b, JobHandle(1));
    }

    #[tokio::test]
    async fn simultaneous_entries_both_dispatch() {
        let sink = Arc::new(RecordingSink::default());
        let mut runner = Runner::new(Arc::clone(&sink) as Arc<dyn JobEventSink>, false);
        runner.add(entry("@every 50ms", "echo one", None)).unwrap();
        runner.add(entry("@every 50ms", "echo two", None)).unwrap();

        let handle = runner.start();
        tokio::time::sleep(Duration::from_millis(400)).await;
        handle.stop().await;

        let started = sink.started.lock().unwrap();
        assert!(started.iter().any(|c| c == "echo one"));
        assert!(started.iter().any(|c| c == "echo two"));
    }

    #[tokio::test]
    async fn finished_outcome_carries_exit_and_increasing_next_fire() {
        let sink = Arc::new(RecordingSink::default());
        let mut runner = Runner::new(Arc::clone(&sink) as Arc<dyn JobEventSink>, false);
        runner.add(entry("@every 50ms", "exit 3", None)).unwrap();

        let handle = runner.start();
        tokio::time::sleep(Duration::from_millis(400)).await;
        handle.stop().await;

        let finished = sink.finished.lock().unwrap();
        assert!(!finished.is_empty(), "job should have fired at least once");
        for (_, outcome) in finished.iter() {
            assert!(!outcome.success);
            assert_eq!(outcome.exit_code, Some(3));
            assert!(outcome.pid.is_some());
            let next = outcome.next_run.expect("interval schedules never exhaust");
            assert!(next > outcome.fired_at, "next fire must strictly increase");
        }
        // One nominal fire time, one dispatch: no duplicates.
        let mut fired: Vec<_> = finished.iter().map(|(_, o)| o.fired_at).collect();
        fired.sort();
        fired.dedup();
        assert_eq!(fired.len(), finished.len());
    }

    #[tokio::test]
    async fn job_output_is_captured() {
        let sink = Arc::new(RecordingSink::default());
        let mut runner = Runner::new(Arc::clone(&sink) as Arc<dyn JobEventSink>, false);
        runner
            .add(entry("@every 50ms", "echo out; echo err >&2", None))
            .unwrap();

        let handle = runner.start();
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.stop().await;

        let finished = sink.finished.lock().unwrap();
        assert!(!finished.is_empty());
        let (_, outcome) = &finished[0];
        assert!(outcome.success);
        assert!(outcome.output.contains("out"));
        assert!(outcome.output.contains("err"));
        assert!(outcome.finished_at <= Utc::now());
    }

    #[tokio::test]
    async fn unknown_user_skips_without_executing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let cmd = format!("touch {}", marker.display());

        let sink = Arc::new(RecordingSink::default());
        let mut runner = Runner::new(Arc::clone(&sink) as Arc<dyn JobEventSink>, true);
        runner
            .add(entry("@every 50ms", &cmd, Some("chronod-no-such-user")))
            .unwrap();

        let handle = runner.start();
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.stop().await;

        assert!(
            !marker.exists(),
            "command must not run for an unresolvable user"
        );
        assert!(sink.finished.lock().unwrap().is_empty());
        let skipped = sink.skipped.lock().unwrap();
        assert!(!skipped.is_empty());
        assert!(skipped[0].1.contains("unknown user"));
    }

    #[tokio::test]
    async fn user_switching_disabled_runs_as_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let cmd = format!("touch {}", marker.display());

        let sink = Arc::new(RecordingSink::default());
        // switch_users = false: the per-entry user is ignored entirely.
        let mut runner = Runner::new(Arc::clone(&sink) as Arc<dyn JobEventSink>, false);
        runner
            .add(entry("@every 50ms", &cmd, Some("chronod-no-such-user")))
            .unwrap();

        let handle = runner.start();
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.stop().await;

        assert!(marker.exists());
        assert!(sink.skipped.lock().unwrap().is_empty());
    }
}
