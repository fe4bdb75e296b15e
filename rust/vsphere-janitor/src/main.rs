//! vsphere-janitor - Main Entry Point
//!
//! Sweeps the configured vSphere inventory folders, retiring VMs that have
//! outlived their cutoff, then sleeps and repeats (or exits with `--once`).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser};
use tokio_util::sync::CancellationToken;
use url::Url;

use vsphere_janitor::config::{
    format_duration, parse_duration, validate_vm_paths, ConfigurationError,
};
use vsphere_janitor::telemetry::{init_tracing, LogFormat};
use vsphere_janitor::vsphere::{ClientOptions, VsphereClient};
use vsphere_janitor::{metrics, Janitor, JanitorConfig};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "vsphere-janitor")]
#[command(about = "VMware vSphere cleanup thingy")]
#[command(version)]
struct Args {
    /// URL of the vSphere server, including credentials and '/sdk'.
    #[arg(short = 'u', long, env = "VSPHERE_JANITOR_VSPHERE_URL")]
    vsphere_url: Option<Url>,

    /// Paths in inventory that contain VMs for cleanup.
    #[arg(short = 'p', long, env = "VSPHERE_JANITOR_VSPHERE_VM_PATHS", value_delimiter = ',')]
    vsphere_vm_paths: Vec<String>,

    /// VI/JSON API release to talk to.
    #[arg(long, env = "VSPHERE_JANITOR_VSPHERE_API_RELEASE", default_value = "8.0.1.0")]
    vsphere_api_release: String,

    /// Longest wait for a power-off or destroy task.
    #[arg(long, env = "VSPHERE_JANITOR_VSPHERE_TASK_TIMEOUT", default_value = "10m", value_parser = parse_duration)]
    vsphere_task_timeout: Duration,

    /// Accept self-signed vCenter certificates.
    #[arg(long, env = "VSPHERE_JANITOR_VSPHERE_INSECURE", default_value_t = true, action = ArgAction::Set)]
    vsphere_insecure: bool,

    /// Do not destroy VMs, only power them down.
    #[arg(short = 'S', long, env = "VSPHERE_JANITOR_SKIP_DESTROY")]
    skip_destroy: bool,

    /// Skip over VMs with zero uptime.
    #[arg(
        short = 'z',
        long,
        env = "VSPHERE_JANITOR_SKIP_ZERO_UPTIME",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    skip_zero_uptime: bool,

    /// Skip over VMs without a boot time.
    #[arg(
        short = 'B',
        long,
        env = "VSPHERE_JANITOR_SKIP_NO_BOOT_TIME",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    skip_no_boot_time: bool,

    /// Max uptime cutoff.
    #[arg(short = 'C', long, env = "VSPHERE_JANITOR_CUTOFF", default_value = "2h", value_parser = parse_duration)]
    cutoff: Duration,

    /// Max 'zero uptime' cutoff.
    #[arg(long, env = "VSPHERE_JANITOR_ZERO_UPTIME_CUTOFF", default_value = "5m", value_parser = parse_duration)]
    zero_uptime_cutoff: Duration,

    /// Concurrent cleanup worker count (0 = one per candidate).
    #[arg(short = 'c', long, env = "VSPHERE_JANITOR_CONCURRENCY", default_value_t = 0)]
    concurrency: usize,

    /// Rate limit max VMs handled per second (0 = unlimited).
    #[arg(short = 'R', long, env = "VSPHERE_JANITOR_RATE_PER_SECOND", default_value_t = 5)]
    rate_per_second: u32,

    /// Only run one cleanup.
    #[arg(short = 'O', long, env = "VSPHERE_JANITOR_ONCE")]
    once: bool,

    /// Sleep interval between cleaning up all paths.
    #[arg(short = 's', long, env = "VSPHERE_JANITOR_CLEANUP_LOOP_SLEEP", default_value = "1m", value_parser = parse_duration)]
    cleanup_loop_sleep: Duration,

    /// Disable logging metrics.
    #[arg(long, env = "VSPHERE_JANITOR_SILENCE_METRICS")]
    silence_metrics: bool,

    /// Interval between metrics log dumps.
    #[arg(long, env = "VSPHERE_JANITOR_METRICS_INTERVAL", default_value = "1m", value_parser = parse_duration)]
    metrics_interval: Duration,

    /// Log level.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    /// Log format (text or json).
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,
}

/// Unprefixed environment variables honoured after the `VSPHERE_JANITOR_` ones.
const FALLBACK_ENV: &[(&str, &str)] = &[
    ("vsphere_url", "VSPHERE_URL"),
    ("vsphere_vm_paths", "VSPHERE_VM_PATHS"),
    ("skip_destroy", "SKIP_DESTROY"),
    ("skip_zero_uptime", "SKIP_ZERO_UPTIME"),
    ("skip_no_boot_time", "SKIP_NO_BOOT_TIME"),
    ("cutoff", "CUTOFF"),
    ("zero_uptime_cutoff", "ZERO_UPTIME_CUTOFF"),
    ("concurrency", "CONCURRENCY"),
    ("once", "ONCE"),
    ("cleanup_loop_sleep", "CLEANUP_LOOP_SLEEP"),
    ("rate_per_second", "RATE_PER_SECOND"),
    ("silence_metrics", "SILENCE_METRICS"),
];

/// Build the command with unprefixed fallbacks installed as defaults, so
/// flags and prefixed variables still take precedence.
fn command_with_fallback_env(lookup: impl Fn(&str) -> Option<String>) -> clap::Command {
    FALLBACK_ENV
        .iter()
        .fold(Args::command(), |command, (id, var)| match lookup(var) {
            Some(value) if *id == "vsphere_vm_paths" => {
                let paths: Vec<String> = value.split(',').map(str::to_string).collect();
                command.mut_arg(*id, |arg| arg.default_values(paths))
            }
            Some(value) => command.mut_arg(*id, |arg| arg.default_value(value)),
            None => command,
        })
}

impl Args {
    fn from_env_and_args() -> Self {
        let matches = command_with_fallback_env(|var| std::env::var(var).ok()).get_matches();
        Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }

    fn janitor_config(&self) -> JanitorConfig {
        JanitorConfig::default()
            .with_cutoff(self.cutoff)
            .with_zero_uptime_cutoff(self.zero_uptime_cutoff)
            .with_skip_zero_uptime(self.skip_zero_uptime)
            .with_skip_no_boot_time(self.skip_no_boot_time)
            .with_skip_destroy(self.skip_destroy)
            .with_concurrency(self.concurrency)
            .with_rate_per_second(self.rate_per_second)
    }

    fn client_options(&self) -> ClientOptions {
        ClientOptions {
            api_release: self.vsphere_api_release.clone(),
            insecure: self.vsphere_insecure,
            task_timeout: self.vsphere_task_timeout,
            ..ClientOptions::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::from_env_and_args();

    if let Err(e) = init_tracing(&args.log_level, args.log_format) {
        eprintln!("Failed to initialize tracing: {e}");
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting vsphere-janitor");
    let result = run(args).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "vsphere-janitor failed");
    }
    tracing::info!("stopping vsphere-janitor");

    result
}

async fn run(args: Args) -> anyhow::Result<()> {
    let Some(url) = &args.vsphere_url else {
        return Err(ConfigurationError::missing_required(
            "vSphere URL",
            "--vsphere-url or VSPHERE_JANITOR_VSPHERE_URL",
        )
        .into());
    };
    validate_vm_paths(&args.vsphere_vm_paths)?;

    let client = VsphereClient::new(url, &args.client_options())
        .context("couldn't create vsphere vm lister")?;
    tracing::info!(vsphere = %client.base_url(), paths = ?args.vsphere_vm_paths, "configured");
    let janitor = Janitor::new(Arc::new(client), args.janitor_config());

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    metrics::init_metrics()?;
    if !args.silence_metrics && !args.metrics_interval.is_zero() {
        tokio::spawn(metrics::log_metrics_loop(
            args.metrics_interval,
            shutdown.child_token(),
        ));
    }

    loop {
        for path in &args.vsphere_vm_paths {
            if shutdown.is_cancelled() {
                break;
            }
            if let Err(e) = janitor.cleanup(path, Utc::now(), &shutdown).await {
                tracing::error!(location = %path, error = %e, "error cleaning up");
            }
        }

        if args.once {
            tracing::info!("finishing after one run");
            break;
        }
        if shutdown.is_cancelled() {
            break;
        }

        tracing::info!(
            duration = %format_duration(args.cleanup_loop_sleep),
            "sleeping"
        );
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(args.cleanup_loop_sleep) => {}
        }
    }

    shutdown.cancel();
    Ok(())
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
        () = shutdown.cancelled() => return,
    }

    shutdown.cancel();
}
