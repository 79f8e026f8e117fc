// Run configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::constants::{DEFAULT_MAX_PARALLEL_PROBES, DEFAULT_PROBE_TIMEOUT};
use crate::error::{ProvisionError, Result};

/// How provisioning treats a command that wrote to stderr or exited non-zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StderrPolicy {
    /// Record a warning and keep going
    #[default]
    Permissive,
    /// Abort the remaining phases
    Strict,
}

/// Knobs for selection and provisioning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub max_parallel_probes: usize,
    pub probe_timeout: Duration,
    pub stderr_policy: StderrPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_parallel_probes: DEFAULT_MAX_PARALLEL_PROBES,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            stderr_policy: StderrPolicy::default(),
        }
    }
}

impl RunConfig {
    pub fn strict(mut self) -> Self {
        self.stderr_policy = StderrPolicy::Strict;
        self
    }

    /// Reject settings that would make selection impossible
    pub fn validate(&self) -> Result<()> {
        if self.max_parallel_probes == 0 {
            return Err(ProvisionError::Config(
                "max_parallel_probes must be at least 1".to_string(),
            ));
        }
        if self.probe_timeout.is_zero() {
            return Err(ProvisionError::Config(
                "probe_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
