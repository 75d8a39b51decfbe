use crate::sysfs::DEFAULT_SYS_PATH;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "drm-agent", version, about)]
pub struct Config {
    /// Unique identifier for this agent instance.
    /// if none provided, default to hostname.
    #[arg(long, env = "DRM_AGENT_ID")]
    pub agent_id: Option<String>,

    /// Root of the sysfs mount to read DRM state from.
    #[arg(long, env = "DRM_AGENT_SYS_PATH", default_value = DEFAULT_SYS_PATH)]
    pub sys_path: PathBuf,

    /// Telemetry collection interval in milliseconds.
    #[arg(long, env = "DRM_AGENT_COLLECT_INTERVAL_MS", default_value_t = 15000)]
    pub collect_interval_ms: u64,

    /// Upper bound on a single collection in milliseconds.
    #[arg(long, env = "DRM_AGENT_COLLECT_TIMEOUT_MS", default_value_t = 5000)]
    pub collect_timeout_ms: u64,

    /// Comma-separated collectors to enable in addition to the defaults.
    #[arg(long = "enable-collector", env = "DRM_AGENT_ENABLE_COLLECTORS", value_delimiter = ',')]
    pub enable_collectors: Vec<String>,

    /// Comma-separated collectors to disable.
    #[arg(long = "disable-collector", env = "DRM_AGENT_DISABLE_COLLECTORS", value_delimiter = ',')]
    pub disable_collectors: Vec<String>,

    /// Output format for collected samples.
    #[arg(long, env = "DRM_AGENT_FORMAT", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Enable JSON structured logging.
    #[arg(long, env = "DRM_AGENT_JSON_LOGS", default_value_t = false)]
    pub json_logs: bool,

    /// Collect once and exit; non-zero exit if any collector fails.
    #[arg(long, default_value_t = false)]
    pub once: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One `name{labels} value` line per sample.
    Text,
    /// One JSON report per collection.
    Json,
}

impl Config {
    /// get agent ID, upon failure fallback to hostname.
    pub fn resolved_agent_id(&self) -> String {
        self.agent_id
            .clone()
            .unwrap_or_else(|| {
                hostname::get()
                    .map(|h| h.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| "unknown-agent".to_string())
            })
    }

    pub fn collect_interval(&self) -> Duration {
        Duration::from_millis(self.collect_interval_ms)
    }

    pub fn collect_timeout(&self) -> Duration {
        Duration::from_millis(self.collect_timeout_ms)
    }
}
