//! Prometheus-backed job event sink.
//!
//! Holds its own registry rather than the process-global default, so a
//! reload can reset every series and a test can build as many sinks as it
//! likes. Series are keyed by schedule, user, and command; the same triple
//! the daemon uses in its log lines.

use chrono::{DateTime, Utc};
use prometheus::{CounterVec, GaugeVec, Registry, TextEncoder};
use tracing::{debug, error, info};

use chronod_core::{CrontabEntry, JobEventSink, JobOutcome};

const LABELS: &[&str] = &["schedule", "user", "command"];

pub struct MetricsSink {
    registry: Registry,
    task_info: GaugeVec,
    run_count: CounterVec,
    run_result: GaugeVec,
    run_time: GaugeVec,
    run_duration: GaugeVec,
    run_next_ts: GaugeVec,
    run_prev_ts: GaugeVec,
}

impl MetricsSink {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let task_info = GaugeVec::new(
            prometheus::Opts::new("chronod_task_info", "registered task"),
            LABELS,
        )?;
        registry.register(Box::new(task_info.clone()))?;

        let run_count = CounterVec::new(
            prometheus::Opts::new("chronod_task_run_count", "task run count by result"),
            &["schedule", "user", "command", "result"],
        )?;
        registry.register(Box::new(run_count.clone()))?;

        let run_result = GaugeVec::new(
            prometheus::Opts::new("chronod_task_run_result", "last run result (1 ok, 0 failed)"),
            LABELS,
        )?;
        registry.register(Box::new(run_result.clone()))?;

        let run_time = GaugeVec::new(
            prometheus::Opts::new("chronod_task_run_time", "last run completion timestamp"),
            LABELS,
        )?;
        registry.register(Box::new(run_time.clone()))?;

        let run_duration = GaugeVec::new(
            prometheus::Opts::new("chronod_task_run_duration", "last run duration in seconds"),
            LABELS,
        )?;
        registry.register(Box::new(run_duration.clone()))?;

        let run_next_ts = GaugeVec::new(
            prometheus::Opts::new("chronod_task_run_next_time", "next planned run timestamp"),
            LABELS,
        )?;
        registry.register(Box::new(run_next_ts.clone()))?;

        let run_prev_ts = GaugeVec::new(
            prometheus::Opts::new("chronod_task_run_prev_time", "last nominal fire timestamp"),
            LABELS,
        )?;
        registry.register(Box::new(run_prev_ts.clone()))?;

        Ok(Self {
            registry,
            task_info,
            run_count,
            run_result,
            run_time,
            run_duration,
            run_next_ts,
            run_prev_ts,
        })
    }

    /// Drop every recorded series. Called on reload, before the fresh job
    /// set registers itself.
    pub fn reset(&self) {
        self.task_info.reset();
        self.run_count.reset();
        self.run_result.reset();
        self.run_time.reset();
        self.run_duration.reset();
        self.run_next_ts.reset();
        self.run_prev_ts.reset();
    }

    /// Encode the current registry contents in the text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }

    fn labels(entry: &CrontabEntry) -> [&str; 3] {
        [
            entry.schedule.as_str(),
            entry.user_label(),
            entry.command.as_str(),
        ]
    }
}

impl JobEventSink for MetricsSink {
    fn job_registered(&self, entry: &CrontabEntry) {
        self.task_info.with_label_values(&Self::labels(entry)).set(1.0);
    }

    fn job_registration_failed(&self, entry: &CrontabEntry, error: &str) {
        error!(%entry, error, "cannot register job");
    }

    fn job_started(&self, entry: &CrontabEntry) {
        debug!(%entry, "job started");
    }

    fn job_finished(&self, entry: &CrontabEntry, outcome: &JobOutcome) {
        let labels = Self::labels(entry);
        let result = if outcome.success { "success" } else { "error" };

        self.run_count
            .with_label_values(&[labels[0], labels[1], labels[2], result])
            .inc();
        self.run_result
            .with_label_values(&labels)
            .set(if outcome.success { 1.0 } else { 0.0 });
        self.run_time
            .with_label_values(&labels)
            .set(ts(outcome.finished_at));
        self.run_duration
            .with_label_values(&labels)
            .set(outcome.duration.as_secs_f64());
        self.run_prev_ts
            .with_label_values(&labels)
            .set(ts(outcome.fired_at));
        if let Some(next) = outcome.next_run {
            self.run_next_ts.with_label_values(&labels).set(ts(next));
        }

        if outcome.success {
            info!(
                %entry,
                exit = ?outcome.exit_code,
                pid = ?outcome.pid,
                elapsed_ms = outcome.duration.as_millis() as u64,
                "job finished"
            );
        } else {
            error!(
                %entry,
                exit = ?outcome.exit_code,
                pid = ?outcome.pid,
                output = %outcome.output.trim_end(),
                "job failed"
            );
        }
    }

    fn job_skipped(&self, entry: &CrontabEntry, reason: &str) {
        let labels = Self::labels(entry);
        self.run_count
            .with_label_values(&[labels[0], labels[1], labels[2], "error"])
            .inc();
        self.run_result.with_label_values(&labels).set(0.0);
        error!(%entry, reason, "job skipped");
    }
}

fn ts(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64
}
