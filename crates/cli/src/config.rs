//! Cluster configuration
//!
//! Layered with the `config` crate: YAML file first, then `CLUSTERDIAG_*`
//! environment overrides (e.g. `CLUSTERDIAG_WORKERS=8`; `__` separates
//! nested keys).

use anyhow::{bail, Context, Result};
use clusterdiag_core::application::coordinator::constants::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_GRACE_PERIOD, DEFAULT_WORKERS,
};
use clusterdiag_core::application::EngineConfig;
use clusterdiag_core::domain::{Node, SshTarget, DEFAULT_SSH_PORT};
use clusterdiag_infra_system::ssh_executor::default_env_allowlist;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "CLUSTERDIAG";

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT.as_secs()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_grace_period() -> u64 {
    DEFAULT_GRACE_PERIOD.as_secs()
}

/// One node entry of the cluster file
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    pub host: String,
    pub ssh_user: Option<String>,
    pub ssh_port: Option<u16>,
    pub ssh_key: Option<String>,
    pub sql_url: Option<String>,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    /// Used by nodes without their own `sql_url`
    pub default_sql_url: Option<String>,
    pub ssh_user: Option<String>,
    pub ssh_port: Option<u16>,
    pub ssh_key: Option<String>,

    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    pub deadline_secs: Option<u64>,
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,

    /// Environment variables handed to ssh / sh children
    #[serde(default = "default_env_allowlist")]
    pub env_allowlist: Vec<String>,
}

impl ClusterConfig {
    /// Load `path` and apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read cluster config {}", path.display()))?;

        let cluster: ClusterConfig = settings
            .try_deserialize()
            .with_context(|| format!("Invalid cluster config {}", path.display()))?;
        cluster.validate()?;
        Ok(cluster)
    }

    fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("cluster config declares no nodes");
        }
        let mut seen = BTreeSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                bail!("duplicate node id '{}'", node.id);
            }
        }
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        Ok(())
    }

    /// Resolved nodes: per-node settings win over cluster-wide defaults
    pub fn nodes(&self) -> Vec<Node> {
        self.nodes
            .iter()
            .map(|n| {
                let ssh = SshTarget {
                    user: n.ssh_user.clone().or_else(|| self.ssh_user.clone()),
                    port: n.ssh_port.or(self.ssh_port).unwrap_or(DEFAULT_SSH_PORT),
                    key_file: n
                        .ssh_key
                        .as_deref()
                        .or(self.ssh_key.as_deref())
                        .map(|k| shellexpand::tilde(k).into_owned()),
                };
                Node {
                    id: n.id.clone(),
                    host: n.host.clone(),
                    ssh,
                    sql_url: n.sql_url.clone().or_else(|| self.default_sql_url.clone()),
                    local: n.local,
                    vars: n.vars.clone(),
                }
            })
            .collect()
    }

    pub fn engine_config(&self, workers_override: Option<usize>) -> EngineConfig {
        EngineConfig {
            workers: workers_override.unwrap_or(self.workers).max(1),
            deadline: self.deadline_secs.map(Duration::from_secs),
            grace_period: Duration::from_secs(self.grace_period_secs),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
