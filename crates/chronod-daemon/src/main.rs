//! chronod: a crontab-compatible job scheduler daemon.
//!
//! Collects entries from crontab files, include directories, and run-parts
//! directories, then drives them with a timing loop. SIGHUP tears the
//! runner down and rebuilds it from fresh sources; SIGINT/SIGTERM shut the
//! daemon down. An optional embedded HTTP server exposes health endpoints
//! and Prometheus metrics.

mod collect;
mod http;
mod metrics;
mod opts;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chronod_core::JobEventSink;
use chronod_runner::Runner;

use crate::metrics::MetricsSink;
use crate::opts::Opts;

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();
    init_tracing(&opts);

    info!("starting chronod {}", env!("CARGO_PKG_VERSION"));
    info!(
        options = %serde_json::to_string(&opts).unwrap_or_default(),
        "effective configuration"
    );

    // Decided once; a reload never re-evaluates privileges.
    let switch_users = decide_user_switching(opts.allow_unprivileged)?;

    // Crontab arguments may be relative; remember where we started so every
    // reload resolves them from the same place.
    let conf_dir = std::env::current_dir().context("cannot determine current directory")?;

    let sink = Arc::new(MetricsSink::new().context("cannot initialise metrics")?);

    if let Some(bind) = opts.server_bind.clone() {
        let sink = Arc::clone(&sink);
        let expose_metrics = opts.server_metrics;
        tokio::spawn(async move {
            if let Err(e) = http::serve(bind, sink, expose_metrics).await {
                error!("http server failed: {e:#}");
            }
        });
    }

    let mut sighup = signal(SignalKind::hangup()).context("cannot install SIGHUP handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("cannot install SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("cannot install SIGTERM handler")?;

    loop {
        sink.reset();

        std::env::set_current_dir(&conf_dir)
            .with_context(|| format!("cannot switch to {}", conf_dir.display()))?;

        let runner = build_runner(&opts, Arc::clone(&sink) as Arc<dyn JobEventSink>, switch_users)?;

        // Jobs must not depend on where the daemon was launched from.
        std::env::set_current_dir(&opts.working_directory)
            .with_context(|| format!("cannot switch to {}", opts.working_directory))?;

        let handle = runner.start();

        let reload = tokio::select! {
            _ = sighup.recv() => {
                info!("got SIGHUP");
                true
            }
            _ = sigint.recv() => {
                info!("got SIGINT");
                false
            }
            _ = sigterm.recv() => {
                info!("got SIGTERM");
                false
            }
        };

        handle.stop().await;

        if !reload {
            break;
        }
        info!("reloading configuration");
    }

    info!("shutdown complete");
    Ok(())
}

/// Collect entries from all sources and register them with a fresh runner.
///
/// A registration failure from an explicitly named crontab file is fatal.
/// Discovered sources already report failures through the sink and the
/// remaining batch still loads.
fn build_runner(opts: &Opts, sink: Arc<dyn JobEventSink>, switch_users: bool) -> Result<Runner> {
    let collected = collect::collect(opts)?;
    let mut runner = Runner::new(sink, switch_users);

    for entry in collected.explicit {
        let source = entry.source.clone();
        runner
            .add(entry)
            .with_context(|| format!("cannot register entry from {}", source.display()))?;
    }
    for entry in collected.discovered {
        let _ = runner.add(entry);
    }

    if runner.is_empty() {
        warn!("no jobs registered; idling until reload or shutdown");
    }
    Ok(runner)
}

fn decide_user_switching(allow_unprivileged: bool) -> Result<bool> {
    if nix::unistd::Uid::effective().is_root() {
        return Ok(true);
    }
    if allow_unprivileged {
        warn!("not running as root, disabling user switching");
        return Ok(false);
    }
    bail!("not running as root; pass --allow-unprivileged if this is intended");
}

fn init_tracing(opts: &Opts) {
    let default_level = if opts.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if opts.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}
