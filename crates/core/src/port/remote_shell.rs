// Remote Shell Port
// Abstraction for running a command on a cluster node (SSH or local shell)

use crate::domain::Node;
use crate::port::BackendError;
use async_trait::async_trait;

/// Captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code: Some(0),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Remote shell trait
///
/// Implementations:
/// - SshShellExecutor: `ssh` with connection multiplexing, or `sh -c` for local nodes
/// - MockRemoteShell: scripted replies for tests
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run `command` on `node` and capture its output
    ///
    /// A non-zero exit status is NOT an error here; callers decide.
    ///
    /// # Errors
    /// - BackendError::Connect / Auth if the node cannot be reached
    /// - BackendError::Timeout if the command exceeds the adapter's timeout
    async fn run(&self, node: &Node, command: &str) -> Result<CommandOutput, BackendError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::NodeId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted reply
    #[derive(Debug, Clone)]
    pub enum MockReply {
        Output(CommandOutput),
        Fail(BackendError),
        /// Panic inside the call (for isolation testing)
        Panic(String),
    }

    #[derive(Debug, Clone)]
    struct Rule {
        node: Option<NodeId>,
        pattern: String,
        reply: MockReply,
    }

    /// Mock remote shell
    ///
    /// Rules match when the command contains `pattern` (and the node matches,
    /// if the rule is node-scoped). The most recently added rule wins.
    /// Unmatched commands succeed with empty stdout.
    #[derive(Default)]
    pub struct MockRemoteShell {
        rules: Mutex<Vec<Rule>>,
        calls: Mutex<Vec<(NodeId, String)>>,
        delay: Option<Duration>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockRemoteShell {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sleep this long inside every call
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn on(self, pattern: impl Into<String>, stdout: impl Into<String>) -> Self {
            self.push(None, pattern, MockReply::Output(CommandOutput::success(stdout)))
        }

        pub fn on_exit(self, pattern: impl Into<String>, exit_code: i32) -> Self {
            let output = CommandOutput {
                exit_code: Some(exit_code),
                ..Default::default()
            };
            self.push(None, pattern, MockReply::Output(output))
        }

        pub fn on_node(
            self,
            node: impl Into<String>,
            pattern: impl Into<String>,
            stdout: impl Into<String>,
        ) -> Self {
            self.push(
                Some(node.into()),
                pattern,
                MockReply::Output(CommandOutput::success(stdout)),
            )
        }

        pub fn fail_node(self, node: impl Into<String>, error: BackendError) -> Self {
            self.push(Some(node.into()), "", MockReply::Fail(error))
        }

        pub fn panic_node(self, node: impl Into<String>, message: impl Into<String>) -> Self {
            self.push(Some(node.into()), "", MockReply::Panic(message.into()))
        }

        fn push(self, node: Option<NodeId>, pattern: impl Into<String>, reply: MockReply) -> Self {
            self.rules.lock().unwrap().push(Rule {
                node,
                pattern: pattern.into(),
                reply,
            });
            self
        }

        /// Every (node, command) this mock received, in call order
        pub fn calls(&self) -> Vec<(NodeId, String)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn commands_for(&self, node: &str) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|(n, _)| n == node)
                .map(|(_, c)| c)
                .collect()
        }

        /// Highest number of concurrently running calls observed
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        fn lookup(&self, node: &str, command: &str) -> Option<MockReply> {
            self.rules
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|r| {
                    r.node.as_deref().map_or(true, |n| n == node) && command.contains(&r.pattern)
                })
                .map(|r| r.reply.clone())
        }
    }

    #[async_trait]
    impl RemoteShell for MockRemoteShell {
        async fn run(&self, node: &Node, command: &str) -> Result<CommandOutput, BackendError> {
            self.calls
                .lock()
                .unwrap()
                .push((node.id.clone(), command.to_string()));

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.lookup(&node.id, command) {
                Some(MockReply::Output(output)) => Ok(output),
                Some(MockReply::Fail(err)) => Err(err),
                Some(MockReply::Panic(msg)) => panic!("{}", msg),
                None => Ok(CommandOutput::success("")),
            }
        }
    }
}
