// System Parameter Port
// reason: async-trait, reads usually go over the node's remote shell

use crate::domain::Node;
use crate::port::BackendError;
use async_trait::async_trait;

/// OS / kernel parameter reader
///
/// # Example
/// ```text
/// let value = reader.read(&node, "fs.aio-max-nr").await?;
/// if value.parse::<u64>()? < 1048576 {
///     println!("aio-max-nr too low");
/// }
/// ```
#[async_trait]
pub trait ParameterReader: Send + Sync {
    /// Current value of parameter `name` on `node`, trimmed
    async fn read(&self, node: &Node, name: &str) -> Result<String, BackendError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock parameter reader: fixed values, optionally per node
    #[derive(Default)]
    pub struct MockParameterReader {
        values: Mutex<HashMap<(Option<String>, String), Result<String, BackendError>>>,
    }

    impl MockParameterReader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(self, name: impl Into<String>, value: impl Into<String>) -> Self {
            self.values
                .lock()
                .unwrap()
                .insert((None, name.into()), Ok(value.into()));
            self
        }

        pub fn with_node(
            self,
            node: impl Into<String>,
            name: impl Into<String>,
            value: impl Into<String>,
        ) -> Self {
            self.values
                .lock()
                .unwrap()
                .insert((Some(node.into()), name.into()), Ok(value.into()));
            self
        }

        pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
            self.values
                .lock()
                .unwrap()
                .insert((None, name.into()), Ok(value.into()));
        }
    }

    #[async_trait]
    impl ParameterReader for MockParameterReader {
        async fn read(&self, node: &Node, name: &str) -> Result<String, BackendError> {
            let values = self.values.lock().unwrap();
            values
                .get(&(Some(node.id.clone()), name.to_string()))
                .or_else(|| values.get(&(None, name.to_string())))
                .cloned()
                .unwrap_or_else(|| {
                    Err(BackendError::CommandFailed {
                        exit_code: Some(255),
                        stderr: format!("unknown parameter '{}'", name),
                    })
                })
        }
    }
}
