// Cluster Node Model

use std::collections::BTreeMap;

/// Node identity; reports are ordered by it
pub type NodeId = String;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// How to reach a node's remote shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: Option<String>,
    pub port: u16,
    pub key_file: Option<String>,
}

impl Default for SshTarget {
    fn default() -> Self {
        Self {
            user: None,
            port: DEFAULT_SSH_PORT,
            key_file: None,
        }
    }
}

/// A cluster node a task runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub host: String,
    pub ssh: SshTarget,
    /// SQL endpoint used by `sql` steps (e.g. `mysql://root@10.0.0.1:2881/oceanbase`)
    pub sql_url: Option<String>,
    /// Run shell commands on this machine instead of over SSH
    pub local: bool,
    /// Extra variables seeded into every execution context for this node
    pub vars: BTreeMap<String, String>,
}

impl Node {
    pub fn new(id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            ssh: SshTarget::default(),
            sql_url: None,
            local: false,
            vars: BTreeMap::new(),
        }
    }

    pub fn with_sql_url(mut self, url: impl Into<String>) -> Self {
        self.sql_url = Some(url.into());
        self
    }

    pub fn with_ssh(mut self, ssh: SshTarget) -> Self {
        self.ssh = ssh;
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }
}
