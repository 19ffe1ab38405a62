// SSH / local shell executor
// reason: tokio::process for async child management, nix for graceful termination
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use clusterdiag_core::application::coordinator::constants::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
};
use clusterdiag_core::domain::Node;
use clusterdiag_core::port::{BackendError, CommandOutput, RemoteShell};

/// Exit status ssh reserves for its own failures (connect, auth, ...)
const SSH_ERROR_EXIT: i32 = 255;

/// Time a timed-out child gets between SIGTERM and SIGKILL
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// How long an idle multiplexed master connection stays up
const CONTROL_PERSIST: &str = "60s";

/// Process-level settings shared by every node
#[derive(Debug, Clone)]
pub struct SshSettings {
    /// ssh `ConnectTimeout`
    pub connect_timeout: Duration,
    /// Wall-clock limit for one command, connect included
    pub command_timeout: Duration,
    /// Directory for ssh control sockets; `None` disables multiplexing
    pub control_dir: Option<PathBuf>,
    /// Environment variables passed through to the child
    pub env_allowlist: Vec<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            control_dir: None,
            env_allowlist: default_env_allowlist(),
        }
    }
}

/// What ssh itself needs to find keys and agents
pub fn default_env_allowlist() -> Vec<String> {
    ["PATH", "HOME", "USER", "LANG", "SSH_AUTH_SOCK"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Runs commands over the system `ssh` client, or `sh -c` for local nodes
///
/// Reuses one multiplexed connection per node when a control directory is
/// set, so a task with several ssh steps authenticates once.
pub struct SshShellExecutor {
    settings: SshSettings,
}

impl SshShellExecutor {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    /// Environment the child sees: the allowlisted subset of ours
    fn filtered_env(&self) -> Vec<(String, String)> {
        std::env::vars()
            .filter(|(k, _)| self.settings.env_allowlist.contains(k))
            .collect()
    }

    /// Program and argument vector for `command` on `node`
    fn build_command(&self, node: &Node, command: &str) -> (String, Vec<String>) {
        if node.local {
            return ("sh".to_string(), vec!["-c".to_string(), command.to_string()]);
        }

        let mut args: Vec<String> = vec![
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.settings.connect_timeout.as_secs().max(1)),
            "-o".into(),
            "StrictHostKeyChecking=accept-new".into(),
        ];
        if let Some(dir) = &self.settings.control_dir {
            args.extend([
                "-o".into(),
                "ControlMaster=auto".into(),
                "-o".into(),
                format!("ControlPath={}/%r@%h:%p", dir.display()),
                "-o".into(),
                format!("ControlPersist={}", CONTROL_PERSIST),
            ]);
        }
        args.extend(["-p".into(), node.ssh.port.to_string()]);
        if let Some(key) = &node.ssh.key_file {
            args.extend(["-i".into(), key.clone()]);
        }
        let destination = match &node.ssh.user {
            Some(user) => format!("{}@{}", user, node.host),
            None => node.host.clone(),
        };
        args.push(destination);
        args.push(command.to_string());

        ("ssh".to_string(), args)
    }

    async fn spawn_and_wait(
        &self,
        program: &str,
        args: &[String],
    ) -> Result<(Option<i32>, String, String), BackendError> {
        let mut child = Command::new(program)
            .args(args)
            .env_clear()
            .envs(self.filtered_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::Spawn(format!("{}: {}", program, e)))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let waited = timeout(self.settings.command_timeout, async {
            tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr))
        })
        .await;

        match waited {
            Ok((Ok(status), stdout, stderr)) => Ok((status.code(), stdout, stderr)),
            Ok((Err(e), _, _)) => Err(BackendError::Io(e.to_string())),
            Err(_) => {
                terminate(&mut child).await;
                Err(BackendError::Timeout(
                    self.settings.command_timeout.as_millis() as u64,
                ))
            }
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!(error = %e, "Failed to read child pipe");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// SIGTERM first, SIGKILL if the child outlives the grace period
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            info!(pid = pid, "Sending SIGTERM to timed-out command");
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                && timeout(TERMINATE_GRACE, child.wait()).await.is_ok()
            {
                return;
            }
            warn!(pid = pid, "Command did not exit after SIGTERM, killing");
        }
    }

    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill timed-out command");
    }
}

/// ssh's own failure (exit 255) as a backend error
fn ssh_failure(node: &Node, stderr: &str) -> BackendError {
    let message = format!("{}: {}", node.host, stderr.trim());
    if stderr.contains("Permission denied") || stderr.contains("Authentication failed") {
        BackendError::Auth(message)
    } else {
        BackendError::Connect(message)
    }
}

#[async_trait]
impl RemoteShell for SshShellExecutor {
    async fn run(&self, node: &Node, command: &str) -> Result<CommandOutput, BackendError> {
        let (program, args) = self.build_command(node, command);
        let started = Instant::now();

        debug!(node = %node.id, program = %program, command = %command, "Running command");
        let (exit_code, stdout, stderr) = self.spawn_and_wait(&program, &args).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        if !node.local && exit_code == Some(SSH_ERROR_EXIT) {
            return Err(ssh_failure(node, &stderr));
        }

        debug!(
            node = %node.id,
            exit_code = ?exit_code,
            duration_ms = duration_ms,
            "Command completed"
        );

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterdiag_core::domain::SshTarget;

    fn local() -> Node {
        Node::new("local", "127.0.0.1").local()
    }

    #[tokio::test]
    async fn test_local_command_success() {
        let executor = SshShellExecutor::new(SshSettings::default());

        let output = executor.run(&local(), "echo hello").await.unwrap();

        assert!(output.is_success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_local_nonzero_exit_is_not_an_error() {
        let executor = SshShellExecutor::new(SshSettings::default());

        let output = executor
            .run(&local(), "echo oops >&2; exit 3")
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let executor = SshShellExecutor::new(SshSettings {
            command_timeout: Duration::from_millis(100),
            ..Default::default()
        });

        let started = Instant::now();
        let result = executor.run(&local(), "sleep 10").await;

        assert!(matches!(result, Err(BackendError::Timeout(100))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_env_filtering() {
        std::env::set_var("CLUSTERDIAG_TEST_BLOCKED", "secret");
        let executor = SshShellExecutor::new(SshSettings {
            env_allowlist: vec!["PATH".to_string()],
            ..Default::default()
        });

        let output = executor
            .run(&local(), "echo \"[$CLUSTERDIAG_TEST_BLOCKED]\"")
            .await
            .unwrap();

        assert_eq!(output.stdout.trim(), "[]");
    }

    #[test]
    fn test_ssh_arguments() {
        let executor = SshShellExecutor::new(SshSettings {
            control_dir: Some(PathBuf::from("/tmp/cd")),
            ..Default::default()
        });
        let node = Node::new("node-1", "10.0.0.1").with_ssh(SshTarget {
            user: Some("admin".to_string()),
            port: 2022,
            key_file: Some("/keys/id_ed25519".to_string()),
        });

        let (program, args) = executor.build_command(&node, "uptime");

        assert_eq!(program, "ssh");
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ControlPath=/tmp/cd/%r@%h:%p".to_string()));
        let port = args.iter().position(|a| a == "-p").unwrap();
        assert_eq!(args[port + 1], "2022");
        let key = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[key + 1], "/keys/id_ed25519");
        assert_eq!(&args[args.len() - 2..], ["admin@10.0.0.1", "uptime"]);
    }

    #[test]
    fn test_ssh_failure_classification() {
        let node = Node::new("node-1", "10.0.0.1");
        assert!(matches!(
            ssh_failure(&node, "admin@10.0.0.1: Permission denied (publickey)."),
            BackendError::Auth(_)
        ));
        assert!(matches!(
            ssh_failure(&node, "ssh: connect to host 10.0.0.1 port 22: Connection refused"),
            BackendError::Connect(_)
        ));
    }
}
