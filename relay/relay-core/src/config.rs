use crate::error::ConfigError;
use crate::types::OrderingMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ACCOUNT_ID_ENV: &str = "MY_ACCOUNT_ID";
pub const PRIVATE_KEY_ENV: &str = "MY_PRIVATE_KEY";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BridgeConfig {
    pub operator: OperatorConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub termination: TerminationConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Credentials of the account paying for network transactions.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct OperatorConfig {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub private_key: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NetworkConfig {
    pub name: String,
    /// Where the sandbox network keeps its topics between runs. In-memory only when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "sandbox".to_string(),
            data_dir: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LedgerConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub save_policy: SavePolicy,
    #[serde(default)]
    pub ordering: OrderingMode,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SavePolicy {
    /// Persist once, when the run finishes.
    #[default]
    OnExit,
    /// Also persist after every accepted entry.
    EveryEntry,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Idle,
    Completion,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TerminationConfig {
    #[serde(default)]
    pub policy: PolicyKind,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Messages to wait for under the completion policy. Defaults to the number of
    /// records the topic acknowledged in this run.
    pub expected: Option<u64>,
    /// Upper bound on the completion wait.
    pub deadline_ms: Option<u64>,
}

fn default_idle_timeout_ms() -> u64 {
    10_000
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Idle,
            idle_timeout_ms: default_idle_timeout_ms(),
            expected: None,
            deadline_ms: None,
        }
    }
}

/// When the orchestrator stops waiting for inbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationPolicy {
    /// Wait until `expected` messages have been accepted, or `deadline` passes.
    /// `None` waits for as many messages as were acknowledged on submission.
    Completion { expected: Option<u64>, deadline: Option<Duration> },
    /// Wait until no message has been delivered for `quiet`.
    Idle { quiet: Duration },
}

impl TerminationConfig {
    pub fn policy(&self) -> TerminationPolicy {
        match self.policy {
            PolicyKind::Idle => TerminationPolicy::Idle {
                quiet: Duration::from_millis(self.idle_timeout_ms),
            },
            PolicyKind::Completion => TerminationPolicy::Completion {
                expected: self.expected,
                deadline: self.deadline_ms.map(Duration::from_millis),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MonitoringConfig {
    pub log_level: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Reads the TOML file, applies credential overrides from the environment and validates.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(account_id) = std::env::var(ACCOUNT_ID_ENV) {
            self.operator.account_id = account_id;
        }
        if let Ok(private_key) = std::env::var(PRIVATE_KEY_ENV) {
            self.operator.private_key = private_key;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.operator.account_id.trim().is_empty() {
            return Err(ConfigError::Missing("operator.account_id"));
        }
        if self.operator.private_key.trim().is_empty() {
            return Err(ConfigError::Missing("operator.private_key"));
        }
        if self.ledger.path.as_os_str().is_empty() {
            return Err(ConfigError::Missing("ledger.path"));
        }
        if self.termination.policy == PolicyKind::Idle && self.termination.idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "termination.idle_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.termination.deadline_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "termination.deadline_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn default_test_config() -> Self {
        Self {
            operator: OperatorConfig {
                account_id: "0.0.2".to_string(),
                private_key: "302e020100300506032b65700422042091132178e72057a1d7528025956fe39b0b847f200ab59b2fdd367017f3087137".to_string(),
            },
            network: NetworkConfig::default(),
            ledger: LedgerConfig {
                path: PathBuf::from("db.json"),
                save_policy: SavePolicy::OnExit,
                ordering: OrderingMode::Watermark,
            },
            termination: TerminationConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}
