// sysctl ParameterReader Implementation

use async_trait::async_trait;
use clusterdiag_core::domain::Node;
use clusterdiag_core::port::{BackendError, ParameterReader, RemoteShell};
use std::sync::Arc;
use tracing::debug;

/// Reads kernel parameters with `sysctl -n` through a remote shell
pub struct SysctlParameterReader {
    shell: Arc<dyn RemoteShell>,
}

impl SysctlParameterReader {
    pub fn new(shell: Arc<dyn RemoteShell>) -> Self {
        Self { shell }
    }
}

/// Parameter names go into a shell command line unquoted
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
}

#[async_trait]
impl ParameterReader for SysctlParameterReader {
    async fn read(&self, node: &Node, name: &str) -> Result<String, BackendError> {
        let name = name.trim();
        if !is_valid_name(name) {
            return Err(BackendError::Query(format!(
                "invalid system parameter name '{}'",
                name
            )));
        }

        let output = self
            .shell
            .run(node, &format!("sysctl -n {}", name))
            .await?;
        if !output.is_success() {
            return Err(BackendError::CommandFailed {
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        let value = output.stdout.trim().to_string();
        debug!(node = %node.id, parameter = %name, value = %value, "Read system parameter");
        Ok(value)
    }
}
