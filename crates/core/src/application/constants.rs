// Orchestration constants (no magic values)
use std::time::Duration;

/// Default upper bound on concurrently running probes
/// Same default parallelism as a bounded task set
pub const DEFAULT_MAX_PARALLEL_PROBES: usize = 16;

/// Default per-step probe timeout (10s)
/// Applies separately to opening the connection and reading the load
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Command reading the 1-minute load average (first field)
pub const LOAD_AVERAGE_COMMAND: &str = "cat /proc/loadavg";

/// Command reading the release-identifier file
pub const OS_RELEASE_COMMAND: &str = "cat /etc/os-release";

/// Outcome recorded for a probe task that never reported back
pub const PROBE_TASK_ABORTED: &str = "probe task aborted";
