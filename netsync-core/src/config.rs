//! Service configuration.
//!
//! Loaded once at start from a JSON file. Every section and key has a
//! default, so a file only names what differs.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ReservedNames, DEFAULT_RESERVED_NETWORKS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub datacenter: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            url: "https://127.0.0.1/sdk".to_string(),
            username: String::new(),
            password: String::new(),
            datacenter: "Datacenter".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub address: String,
    pub port: u16,
    /// Fully qualified project name, e.g. `["default-domain", "vCenter"]`.
    pub project: Vec<String>,
    pub ipam: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8082,
            project: vec!["default-domain".to_string(), "vCenter".to_string()],
            ipam: "vCenter-ipam".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
    /// Name prefix of the agent VM on each host.
    pub name_prefix: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: 9090,
            connect_timeout_ms: 2_000,
            io_timeout_ms: 5_000,
            name_prefix: "ContrailVM".to_string(),
        }
    }
}

impl AgentConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Pause between the end of one pass and the start of the next.
    pub delay_secs: u64,
    pub initial_delay_secs: u64,
    /// How long shutdown waits for an in-flight pass.
    pub shutdown_timeout_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            delay_secs: 10,
            initial_delay_secs: 0,
            shutdown_timeout_secs: 60,
        }
    }
}

impl ScheduleConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub platform: PlatformConfig,
    pub controller: ControllerConfig,
    pub agent: AgentConfig,
    pub schedule: ScheduleConfig,
    pub reserved_networks: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            platform: PlatformConfig::default(),
            controller: ControllerConfig::default(),
            agent: AgentConfig::default(),
            schedule: ScheduleConfig::default(),
            reserved_networks: DEFAULT_RESERVED_NETWORKS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl SyncConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.address.is_empty() {
            return Err(ConfigError::Invalid("controller.address is empty".to_string()));
        }
        if self.controller.project.is_empty() {
            return Err(ConfigError::Invalid("controller.project is empty".to_string()));
        }
        if self.controller.project.iter().any(|part| part.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "controller.project has an empty component: {:?}",
                self.controller.project
            )));
        }
        if self.controller.ipam.is_empty() {
            return Err(ConfigError::Invalid("controller.ipam is empty".to_string()));
        }
        if self.agent.port == 0 {
            return Err(ConfigError::Invalid("agent.port must be non-zero".to_string()));
        }
        if self.agent.connect_timeout_ms == 0 || self.agent.io_timeout_ms == 0 {
            return Err(ConfigError::Invalid("agent timeouts must be non-zero".to_string()));
        }
        if self.agent.name_prefix.is_empty() {
            return Err(ConfigError::Invalid("agent.name_prefix is empty".to_string()));
        }
        if self.schedule.delay_secs == 0 {
            return Err(ConfigError::Invalid("schedule.delay_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn reserved_names(&self) -> ReservedNames {
        ReservedNames::new(self.reserved_networks.iter().cloned())
    }
}
