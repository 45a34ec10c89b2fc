//! Command-line parsing and dispatch.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use s3s_syncer::SyncerConfig;
use s3s_syncer::config::{DEFAULT_QUEUE_CAPACITY, DEFAULT_TEMP_DIR, DEFAULT_WORKERS};
use s3s_telemetry::{BuildInfo, LogFormat, build_info};

use crate::bootstrap;
use crate::error::{AppError, AppResult};

/// Default seconds between runs in interval mode.
pub(crate) const DEFAULT_INTERVAL_SECS: u64 = 5;
/// Default port for the metrics endpoint.
pub(crate) const DEFAULT_METRICS_PORT: u16 = 8085;

#[derive(Parser, Debug)]
#[command(name = "s3s", about = "Mirror an S3 prefix onto a local directory")]
pub(crate) struct Cli {
    /// Enable debug logging.
    #[arg(short = 'v', long, global = true, env = "S3S_VERBOSE")]
    pub(crate) verbose: bool,

    /// Log output format; pretty for debug builds and json for release builds when omitted.
    #[arg(long, global = true, value_enum, env = "S3S_LOG_FORMAT")]
    pub(crate) log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Pull objects under an S3 prefix into a local directory.
    Pull(PullArgs),
    /// Print version and build information.
    Version,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct PullArgs {
    /// Remote prefix, `s3://bucket/prefix`.
    #[arg(value_name = "S3_URI")]
    pub(crate) remote_uri: String,

    /// Local directory to mirror into; must already exist.
    #[arg(value_name = "LOCAL_DIR")]
    pub(crate) local_dir: PathBuf,

    /// Perform a single run and exit.
    #[arg(long)]
    pub(crate) run_once: bool,

    /// Seconds between runs in interval mode.
    #[arg(
        short = 'i',
        long,
        env = "S3S_INTERVAL",
        default_value_t = DEFAULT_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub(crate) interval: u64,

    /// Port for the metrics endpoint in interval mode.
    #[arg(short = 'p', long, env = "S3S_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub(crate) metrics_port: u16,

    /// Number of concurrent download workers.
    #[arg(short = 'w', long, env = "S3S_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub(crate) workers: usize,

    /// Capacity of the pending-download queue.
    #[arg(long, env = "S3S_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub(crate) queue_capacity: usize,

    /// Staging directory for in-flight downloads.
    #[arg(long, env = "S3S_TEMP_DIR", default_value = DEFAULT_TEMP_DIR)]
    pub(crate) temp_dir: PathBuf,

    /// Custom S3-compatible endpoint, host or URL.
    #[arg(short = 'e', long, env = "S3S_S3_ENDPOINT")]
    pub(crate) s3_endpoint: Option<String>,

    /// Use plain HTTP towards the endpoint.
    #[arg(long, env = "S3S_DISABLE_SSL")]
    pub(crate) disable_ssl: bool,

    /// AWS region; falls back to the environment, then us-west-1.
    #[arg(long, env = "AWS_REGION")]
    pub(crate) region: Option<String>,
}

impl PullArgs {
    pub(crate) fn syncer_config(&self) -> SyncerConfig {
        SyncerConfig {
            local_dir: self.local_dir.clone(),
            remote_uri: self.remote_uri.clone(),
            endpoint: self.s3_endpoint.clone(),
            temp_dir: self.temp_dir.clone(),
            disable_tls: self.disable_ssl,
            region: self.region.clone(),
            workers: self.workers,
            queue_capacity: self.queue_capacity,
        }
    }

    pub(crate) fn period(&self) -> AppResult<Duration> {
        if self.interval == 0 {
            return Err(AppError::Validation {
                field: "interval",
                reason: "must_be_positive",
            });
        }
        Ok(Duration::from_secs(self.interval))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum LogFormatArg {
    Json,
    Pretty,
    Compact,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Json => Self::Json,
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Compact => Self::Compact,
        }
    }
}

/// Entry point for the CLI; returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

pub(crate) async fn execute(cli: Cli) -> AppResult<()> {
    match cli.command {
        Command::Version => {
            print!("{}", version_banner(build_info()));
            Ok(())
        }
        Command::Pull(args) => {
            let format = cli.log_format.map_or_else(LogFormat::infer, LogFormat::from);
            bootstrap::run_pull(&args, cli.verbose, format).await
        }
    }
}

pub(crate) fn version_banner(build: BuildInfo) -> String {
    format!(
        "S3 synchronizer v{}\nBuild time {}\n",
        build.version, build.build_time
    )
}
