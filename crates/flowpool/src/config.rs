use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Capacity must be at least 1")]
    ZeroCapacity,

    #[error("Port range {base}..{base}+{len} exceeds 65535")]
    PortRangeOverflow { base: u16, len: usize },
}

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of concurrent workers
    pub capacity: usize,
    /// First port of the reserved range; the range holds `2 * capacity` ports
    pub port_base: u16,
    /// Host workers bind to and the pool connects to
    pub worker_host: String,
    /// Worker executable
    pub worker_program: PathBuf,
    /// Arguments placed before the per-worker startup parameters
    pub worker_args: Vec<String>,
    pub readiness_timeout: Duration,
    /// Ceiling on writing the snapshot to a new worker's stdin
    pub handoff_timeout: Duration,
    pub poll_interval: Duration,
    /// Per-call timeout for health probes on the reuse path
    pub probe_timeout: Duration,
    /// How long a worker gets to exit after SIGTERM before it is killed
    pub shutdown_grace: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            port_base: 9100,
            worker_host: "127.0.0.1".to_string(),
            worker_program: PathBuf::from("flowworker"),
            worker_args: Vec::new(),
            readiness_timeout: Duration::from_secs(30),
            handoff_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    /// Defaults overridden by `FLOWPOOL_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(capacity) = parse_var(&lookup, "FLOWPOOL_CAPACITY")? {
            config.capacity = capacity;
        }
        if let Some(port_base) = parse_var(&lookup, "FLOWPOOL_PORT_BASE")? {
            config.port_base = port_base;
        }
        if let Some(host) = lookup("FLOWPOOL_WORKER_HOST") {
            config.worker_host = host;
        }
        if let Some(program) = lookup("FLOWPOOL_WORKER_BIN") {
            config.worker_program = PathBuf::from(program);
        }
        if let Some(args) = lookup("FLOWPOOL_WORKER_ARGS") {
            config.worker_args = args.split_whitespace().map(String::from).collect();
        }
        if let Some(secs) = parse_var(&lookup, "FLOWPOOL_READY_TIMEOUT_SECS")? {
            config.readiness_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "FLOWPOOL_HANDOFF_TIMEOUT_SECS")? {
            config.handoff_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var(&lookup, "FLOWPOOL_POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var(&lookup, "FLOWPOOL_PROBE_TIMEOUT_SECS")? {
            config.probe_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "FLOWPOOL_SHUTDOWN_GRACE_SECS")? {
            config.shutdown_grace = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        let len = self.port_range_len();
        if self.port_base as usize + len > u16::MAX as usize + 1 {
            return Err(ConfigError::PortRangeOverflow {
                base: self.port_base,
                len,
            });
        }
        Ok(())
    }

    /// Size of the reserved port range, twice the capacity
    pub fn port_range_len(&self) -> usize {
        self.capacity * 2
    }

    pub fn endpoint_for(&self, port: u16) -> String {
        format!("http://{}:{}", self.worker_host, port)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(None),
    }
}
