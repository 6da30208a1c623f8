//! Configuration types for fulcrum

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default interval between health checks
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 5;

/// Main balancer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Load balancing strategy
    pub strategy: LoadBalanceStrategy,
    /// Server ids registered at startup, in rotation order
    pub servers: Vec<String>,
    /// Starting load per server, by position in `servers` (missing entries are 0)
    pub initial_connections: Vec<usize>,
    /// Health check configuration
    pub health: HealthCheckConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl BalancerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::FulcrumError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::FulcrumError::Config(format!("Failed to read config file: {}", e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, crate::FulcrumError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| crate::FulcrumError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), crate::FulcrumError> {
        if self.initial_connections.len() > self.servers.len() {
            return Err(crate::FulcrumError::Config(format!(
                "{} initial connection counts given for {} servers",
                self.initial_connections.len(),
                self.servers.len()
            )));
        }
        Ok(())
    }

    /// Starting load for the server at `index`
    pub fn initial_connections_for(&self, index: usize) -> usize {
        self.initial_connections.get(index).copied().unwrap_or(0)
    }
}

/// Load balancing strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalanceStrategy {
    /// Rotate through servers in insertion order
    #[default]
    RoundRobin,
    /// Pick the healthy server with the fewest active connections
    LeastConnections,
}

impl std::fmt::Display for LoadBalanceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadBalanceStrategy::RoundRobin => write!(f, "round-robin"),
            LoadBalanceStrategy::LeastConnections => write!(f, "least-connections"),
        }
    }
}

impl std::str::FromStr for LoadBalanceStrategy {
    type Err = crate::FulcrumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "round-robin" | "roundrobin" | "rr" => Ok(LoadBalanceStrategy::RoundRobin),
            "least-connections" | "leastconnections" | "least-conn" => {
                Ok(LoadBalanceStrategy::LeastConnections)
            }
            other => Err(crate::FulcrumError::Config(format!(
                "Unknown load balancing strategy: {}",
                other
            ))),
        }
    }
}

/// Health check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Run the periodic health loop
    pub enabled: bool,
    /// Health check interval in seconds
    pub interval_secs: u64,
}

impl HealthCheckConfig {
    /// Interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or text)
    pub format: String,
    /// Log file path (if any)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
        }
    }
}
