// src/config.rs

//! Manages server configuration: loading, defaults, and validation.

use crate::core::ReaperError;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Tunables for connection lifetime and socket buffering.
///
/// Loaded once at startup and never changed afterwards. Durations accept
/// humantime strings in TOML (`"15m"`, `"90s"`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Adjustments {
    /// A connection with no reads or writes for at least this long is a zombie.
    #[serde(with = "humantime_serde", default = "default_idle_timeout")]
    pub idle_timeout: Duration,
    /// Minimum spacing between two zombie sweeps.
    #[serde(with = "humantime_serde", default = "default_sweep_interval")]
    pub sweep_interval: Duration,
    /// Listen backlog for the server socket.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Receive buffer size, used for the socket and the initial read buffer.
    #[serde(default = "default_recv_bytes")]
    pub recv_bytes: usize,
    /// Socket send buffer size.
    #[serde(default = "default_send_bytes")]
    pub send_bytes: usize,
    /// Longest request line accepted before the connection is dropped.
    #[serde(default = "default_inbuf_overflow")]
    pub inbuf_overflow: usize,
    /// Pending output above this many bytes is flushed before reading more.
    #[serde(default = "default_outbuf_overflow")]
    pub outbuf_overflow: usize,
    /// Log socket errors at `warn` (true) or `debug` (false).
    #[serde(default = "default_log_socket_errors")]
    pub log_socket_errors: bool,
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(900) // 15 minutes
}
fn default_sweep_interval() -> Duration {
    Duration::from_secs(300) // 5 minutes
}
fn default_backlog() -> u32 {
    1024
}
fn default_recv_bytes() -> usize {
    8192
}
fn default_send_bytes() -> usize {
    9000
}
fn default_inbuf_overflow() -> usize {
    525_000
}
fn default_outbuf_overflow() -> usize {
    1_050_000
}
fn default_log_socket_errors() -> bool {
    true
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            idle_timeout: default_idle_timeout(),
            sweep_interval: default_sweep_interval(),
            backlog: default_backlog(),
            recv_bytes: default_recv_bytes(),
            send_bytes: default_send_bytes(),
            inbuf_overflow: default_inbuf_overflow(),
            outbuf_overflow: default_outbuf_overflow(),
            log_socket_errors: default_log_socket_errors(),
        }
    }
}

impl Adjustments {
    /// Adjustments with the given timing and default buffer limits.
    pub fn with_timing(idle_timeout: Duration, sweep_interval: Duration) -> Self {
        Self {
            idle_timeout,
            sweep_interval,
            ..Self::default()
        }
    }

    /// The longest a zombie can survive, assuming accepts keep arriving.
    pub fn worst_case_zombie_lifetime(&self) -> Duration {
        self.idle_timeout.saturating_add(self.sweep_interval)
    }

    /// Rejects zero timings and limits.
    ///
    /// A `sweep_interval` longer than `idle_timeout` is accepted with a
    /// warning: zombies then outlive `idle_timeout` by up to a full interval.
    pub fn validate(&self) -> Result<(), ReaperError> {
        let invalid = |msg: &str| Err(ReaperError::Config(msg.to_string()));
        if self.idle_timeout.is_zero() {
            return invalid("adjustments.idle_timeout cannot be 0");
        }
        if self.sweep_interval.is_zero() {
            return invalid("adjustments.sweep_interval cannot be 0");
        }
        if self.backlog == 0 {
            return invalid("adjustments.backlog cannot be 0");
        }
        if self.recv_bytes == 0 || self.send_bytes == 0 {
            return invalid(
                "adjustments.recv_bytes and adjustments.send_bytes must be greater than 0",
            );
        }
        if self.inbuf_overflow == 0 {
            return invalid("adjustments.inbuf_overflow cannot be 0");
        }
        if self.outbuf_overflow == 0 {
            return invalid("adjustments.outbuf_overflow cannot be 0");
        }
        if self.sweep_interval > self.idle_timeout {
            warn!(
                "adjustments.sweep_interval ({:?}) is longer than adjustments.idle_timeout ({:?}); idle connections may live up to {:?}.",
                self.sweep_interval,
                self.idle_timeout,
                self.worst_case_zombie_lifetime()
            );
        }
        Ok(())
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9464
}

/// A raw representation of the config file before validation.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_max_clients")]
    max_clients: usize,
    #[serde(default)]
    adjustments: Adjustments,
    #[serde(default)]
    metrics: MetricsConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    10000
}

/// Represents the final, validated server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub max_clients: usize,
    #[serde(default)]
    pub adjustments: Adjustments,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            adjustments: Adjustments::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    /// Like `from_file`, but falls back to the defaults if `path` does not exist.
    pub fn from_file_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            return Self::from_file(path);
        }
        info!("No config file at '{}', using defaults.", path);
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw_config: RawConfig =
            toml::from_str(contents).context("Failed to parse TOML configuration")?;

        let config = Config {
            host: raw_config.host,
            port: raw_config.port,
            log_level: raw_config.log_level,
            max_clients: raw_config.max_clients,
            adjustments: raw_config.adjustments,
            metrics: raw_config.metrics,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.max_clients > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(anyhow!(
                "max_clients cannot exceed {}",
                tokio::sync::Semaphore::MAX_PERMITS
            ));
        }

        self.adjustments.validate()?;

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main server port"
                ));
            }
        }
        Ok(())
    }
}
