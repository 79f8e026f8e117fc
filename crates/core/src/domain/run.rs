// Provisioning Run State Machine

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};
use super::load::SelectionReport;
use super::os::OsFamily;

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Selecting,
    Detecting,
    Installing,
    Configuring,
    Verifying,
    Done,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Selecting => write!(f, "SELECTING"),
            RunState::Detecting => write!(f, "DETECTING"),
            RunState::Installing => write!(f, "INSTALLING"),
            RunState::Configuring => write!(f, "CONFIGURING"),
            RunState::Verifying => write!(f, "VERIFYING"),
            RunState::Done => write!(f, "DONE"),
            RunState::Failed => write!(f, "FAILED"),
        }
    }
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// Next state on the happy path
    pub fn successor(self) -> Option<RunState> {
        match self {
            RunState::Selecting => Some(RunState::Detecting),
            RunState::Detecting => Some(RunState::Installing),
            RunState::Installing => Some(RunState::Configuring),
            RunState::Configuring => Some(RunState::Verifying),
            RunState::Verifying => Some(RunState::Done),
            RunState::Done | RunState::Failed => None,
        }
    }

    /// Validate a transition: the happy-path successor, or Failed from any
    /// non-terminal state
    pub fn transition(self, to: RunState) -> Result<RunState> {
        let allowed = match to {
            RunState::Failed => !self.is_terminal(),
            _ => self.successor() == Some(to),
        };
        if !allowed {
            return Err(DomainError::InvalidStateTransition {
                from: self.to_string(),
                to: to.to_string(),
            });
        }
        Ok(to)
    }
}

/// A command whose stderr was non-empty (or exit status non-zero)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandWarning {
    pub phase: RunState,
    pub command: String,
    pub stderr: String,
    pub exit_status: Option<u32>,
}

/// Timing and command log of one provisioning phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: RunState,
    pub commands: Vec<String>,
    pub started_at: i64,  // epoch ms
    pub finished_at: i64, // epoch ms
}

impl PhaseRecord {
    pub fn duration_ms(&self) -> i64 {
        self.finished_at - self.started_at
    }
}

/// Aggregated result of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub address: String,
    pub load: f64,
    pub os_family: OsFamily,
    pub final_state: RunState,
    pub phases: Vec<PhaseRecord>,
    pub warnings: Vec<CommandWarning>,
    pub selection: SelectionReport,
    pub verify_output: String,
}

impl ProvisionReport {
    pub fn succeeded(&self) -> bool {
        self.final_state == RunState::Done
    }

    /// All commands issued against the selected host, in order
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.phases
            .iter()
            .flat_map(|p| p.commands.iter().map(String::as_str))
    }
}
