//! Server configuration
//!
//! Defines the bind address, the log backend and the timing knobs of the
//! log pipeline.

use std::time::Duration;

use crate::service::build_log::StreamSettings;

/// Where step logs are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogBackend {
    /// Logs are pushed through the API and kept in memory
    Memory,
    /// Logs are read from podman containers named `<unit>-<step>`
    Podman,
}

impl std::str::FromStr for LogBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(LogBackend::Memory),
            "podman" => Ok(LogBackend::Podman),
            other => anyhow::bail!("unknown log backend '{}' (expected memory or podman)", other),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on
    pub bind_addr: String,

    /// How long a log request waits for a queued build to start
    pub wait_timeout: Duration,

    /// Pause between follow rounds that produced no output
    pub round_delay: Duration,

    /// Poll interval while an execution unit is pending
    pub pending_poll_interval: Duration,

    /// Maximum time to wait for a pending execution unit
    pub pending_timeout: Duration,

    /// Bytes buffered per aggregated log stream
    pub pipe_capacity: usize,

    pub log_backend: LogBackend,

    /// Podman binary used by the podman backend
    pub podman_bin: String,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(bind_addr: String) -> Self {
        Self {
            bind_addr,
            wait_timeout: Duration::from_secs(10),
            round_delay: Duration::from_millis(500),
            pending_poll_interval: Duration::from_millis(1000),
            pending_timeout: Duration::from_secs(600), // 10 minutes
            pipe_capacity: 64 * 1024,
            log_backend: LogBackend::Memory,
            podman_bin: "podman".to_string(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - BUILDLOG_BIND_ADDR (default: 0.0.0.0:8080)
    /// - BUILDLOG_WAIT_TIMEOUT (seconds, default: 10)
    /// - BUILDLOG_ROUND_DELAY_MS (default: 500)
    /// - BUILDLOG_PENDING_POLL_INTERVAL_MS (default: 1000)
    /// - BUILDLOG_PENDING_TIMEOUT (seconds, default: 600)
    /// - BUILDLOG_PIPE_CAPACITY (bytes, default: 65536)
    /// - BUILDLOG_LOG_BACKEND (memory | podman, default: memory)
    /// - BUILDLOG_PODMAN_BIN (default: podman)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        let log_backend = match lookup("BUILDLOG_LOG_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.log_backend,
        };

        Ok(Self {
            bind_addr: lookup("BUILDLOG_BIND_ADDR").unwrap_or(defaults.bind_addr),
            wait_timeout: secs("BUILDLOG_WAIT_TIMEOUT", defaults.wait_timeout),
            round_delay: millis("BUILDLOG_ROUND_DELAY_MS", defaults.round_delay),
            pending_poll_interval: millis(
                "BUILDLOG_PENDING_POLL_INTERVAL_MS",
                defaults.pending_poll_interval,
            ),
            pending_timeout: secs("BUILDLOG_PENDING_TIMEOUT", defaults.pending_timeout),
            pipe_capacity: lookup("BUILDLOG_PIPE_CAPACITY")
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.pipe_capacity),
            log_backend,
            podman_bin: lookup("BUILDLOG_PODMAN_BIN").unwrap_or(defaults.podman_bin),
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.wait_timeout.is_zero() {
            anyhow::bail!("wait_timeout must be greater than 0");
        }

        if self.round_delay.is_zero() {
            anyhow::bail!("round_delay must be greater than 0");
        }

        if self.pending_poll_interval.is_zero() {
            anyhow::bail!("pending_poll_interval must be greater than 0");
        }

        if self.pending_timeout < self.pending_poll_interval {
            anyhow::bail!("pending_timeout must not be shorter than pending_poll_interval");
        }

        if self.pipe_capacity == 0 {
            anyhow::bail!("pipe_capacity must be greater than 0");
        }

        if self.log_backend == LogBackend::Podman && self.podman_bin.is_empty() {
            anyhow::bail!("podman_bin cannot be empty with the podman backend");
        }

        Ok(())
    }

    /// Pipeline settings derived from this configuration
    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            wait_timeout: self.wait_timeout,
            round_delay: self.round_delay,
            pending_poll_interval: self.pending_poll_interval,
            pending_timeout: self.pending_timeout,
            pipe_capacity: self.pipe_capacity,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("0.0.0.0:8080".to_string())
    }
}
