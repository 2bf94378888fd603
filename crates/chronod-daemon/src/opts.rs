use clap::Parser;
use serde::Serialize;

/// Command-line options. Every flag also accepts a `CHRONOD_*` environment
/// variable override.
#[derive(Debug, Clone, Parser, Serialize)]
#[command(
    name = "chronod",
    version,
    about = "crontab-compatible job scheduler daemon"
)]
pub struct Opts {
    /// Crontab files; a `user:` prefix selects user-dialect parsing for
    /// that file, otherwise the system dialect applies.
    pub crontabs: Vec<String>,

    /// Default user for run-parts entries and user-dialect directories.
    #[arg(long, env = "CHRONOD_DEFAULT_USER", default_value = "root")]
    pub default_user: String,

    /// Directories whose files are included as system crontabs.
    #[arg(long = "include", value_name = "DIR")]
    pub include: Vec<String>,

    /// Detect the distribution's default crontab locations automatically.
    #[arg(long, env = "CHRONOD_AUTO")]
    pub auto: bool,

    /// Run-parts directory with a custom interval, as `<duration>:<path>`
    /// (duration units ns,us,ms,s,m,h — e.g. 10s, 1m, 1h30m).
    #[arg(long = "run-parts", value_name = "SPEC:DIR")]
    pub run_parts: Vec<String>,

    /// Execute files in directory every minute (like run-parts).
    #[arg(long = "run-parts-1min", value_name = "DIR")]
    pub run_parts_1min: Vec<String>,

    /// Execute files in directory every beginning 15 minutes (like run-parts).
    #[arg(long = "run-parts-15min", value_name = "DIR")]
    pub run_parts_15min: Vec<String>,

    /// Execute files in directory every beginning hour (like run-parts).
    #[arg(long = "run-parts-hourly", value_name = "DIR")]
    pub run_parts_hourly: Vec<String>,

    /// Execute files in directory every beginning day (like run-parts).
    #[arg(long = "run-parts-daily", value_name = "DIR")]
    pub run_parts_daily: Vec<String>,

    /// Execute files in directory every beginning week (like run-parts).
    #[arg(long = "run-parts-weekly", value_name = "DIR")]
    pub run_parts_weekly: Vec<String>,

    /// Execute files in directory every beginning month (like run-parts).
    #[arg(long = "run-parts-monthly", value_name = "DIR")]
    pub run_parts_monthly: Vec<String>,

    /// Allow the daemon to run as a non-root user (disables user switching).
    #[arg(long, env = "CHRONOD_ALLOW_UNPRIVILEGED")]
    pub allow_unprivileged: bool,

    /// Working directory for job commands.
    #[arg(long, env = "CHRONOD_WORKDIR", default_value = "/")]
    pub working_directory: String,

    /// HTTP server address, e.g. ':8080' or '127.0.0.1:8080'
    /// (serves /healthz and /readyz; /metrics when --server-metrics is set).
    #[arg(long, env = "CHRONOD_SERVER_BIND")]
    pub server_bind: Option<String>,

    /// Expose Prometheus metrics on /metrics. Job commands appear as metric
    /// labels — keep secrets in environment variables or files.
    #[arg(long, env = "CHRONOD_SERVER_METRICS")]
    pub server_metrics: bool,

    /// Verbose logging.
    #[arg(short, long, env = "CHRONOD_VERBOSE")]
    pub verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, env = "CHRONOD_LOG_JSON")]
    pub log_json: bool,
}
