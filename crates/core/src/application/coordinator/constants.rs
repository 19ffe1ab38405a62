// Engine constants (no magic values)
use std::time::Duration;

/// Default number of node executions in flight at once
pub const DEFAULT_WORKERS: usize = 4;

/// How long in-flight node executions may keep running after a
/// cancellation or deadline before they are abandoned (5s)
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Default per-command timeout for remote shell and SQL steps (60s)
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Default connection establishment timeout (10s)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Step index recorded when an abort cannot be attributed to a step
pub const UNATTRIBUTED_STEP: usize = 0;
