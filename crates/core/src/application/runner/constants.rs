// Queue runner constants
use std::time::Duration;

/// Pending commands buffered before callers wait for the runner
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// How long the daemon waits for the runner to stop after shutdown is signalled
pub const RUNNER_STOP_TIMEOUT: Duration = Duration::from_secs(5);
