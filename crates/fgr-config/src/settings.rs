use crate::LoadedConfig;
use anyhow::{Context, Result};
use fgr_reconcile::{EdgeScope, SeedStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_GROUP_NAME: &str = "我的好友";

/// System accounts whose edges are never regrouped.
pub const SYSTEM_COUNTERPARTS: &[&str] = &["u_10000", "fileHelper"];

/// Typed view of the merged config. Every field has a default, so an empty
/// config is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub reconcile: ReconcileSection,
    pub store: StoreSection,
    pub sequence: SequenceSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSection {
    pub default_group_name: String,
    /// Lock wait bound for the reconciliation transaction. `None` keeps the server default.
    pub lock_wait_timeout_secs: Option<u64>,
    pub seed_defaults_from: SeedStrategy,
    pub skip_provisioning: bool,
    pub edge_scope: EdgeScope,
    pub excluded_counterparts: Vec<String>,
    pub ensure_indexes: bool,
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            default_group_name: DEFAULT_GROUP_NAME.to_string(),
            lock_wait_timeout_secs: None,
            seed_defaults_from: SeedStrategy::Edges,
            skip_provisioning: false,
            edge_scope: EdgeScope::All,
            excluded_counterparts: SYSTEM_COUNTERPARTS.iter().map(|s| s.to_string()).collect(),
            ensure_indexes: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Name of the env var holding the Postgres URL.
    pub database_url_env: String,
    pub max_connections: u32,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            database_url_env: "FGR_DATABASE_URL".to_string(),
            max_connections: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocatorBackend {
    #[default]
    Postgres,
    Redis,
}

impl AllocatorBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocatorBackend::Postgres => "postgres",
            AllocatorBackend::Redis => "redis",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceSection {
    pub backend: AllocatorBackend,
    pub edge_counter: String,
    pub group_counter: String,
    /// Name of the env var holding the Redis URL (redis backend only).
    pub redis_url_env: String,
    pub timeout_secs: u64,
}

impl Default for SequenceSection {
    fn default() -> Self {
        Self {
            backend: AllocatorBackend::Postgres,
            edge_counter: "seq:friend".to_string(),
            group_counter: "seq:friendGroup".to_string(),
            redis_url_env: "FGR_REDIS_URL".to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl Settings {
    pub fn from_json(v: &Value) -> Result<Self> {
        Settings::deserialize(v).context("config does not match the settings schema")
    }

    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        Self::from_json(&loaded.config_json)
    }
}
