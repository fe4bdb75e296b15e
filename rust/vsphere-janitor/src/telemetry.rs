use std::str::FromStr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}', expected text or json")),
        }
    }
}

/// Build the filter: `RUST_LOG` wins, then `log_level`.
///
/// A bare level such as `debug` is scoped to this crate so dependency noise
/// stays at `info`.
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = if log_level.contains('=') || log_level.contains(',') {
            log_level.to_string()
        } else {
            format!("info,vsphere_janitor={log_level}")
        };
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Initialize tracing/logging.
pub fn init_tracing(log_level: &str, format: LogFormat) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::registry().with(env_filter(log_level));

    match format {
        LogFormat::Json => subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
        LogFormat::Text => subscriber
            .with(tracing_subscriber::fmt::layer().with_ansi(false))
            .try_init()?,
    }

    Ok(())
}
