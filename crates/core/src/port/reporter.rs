// Run Reporter Port
// Injected event sink: components report progress here instead of relying on
// a process-wide logger, so each one can be tested in isolation

use tracing::{error, info, warn};

use crate::domain::{OsFamily, RunState};

/// Progress event emitted during a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    ConnectionOpened { address: String },
    ConnectionClosed { address: String },
    CommandStarted { address: String, command: String },
    CommandStderr { address: String, command: String, stderr: String },
    LoadObserved { address: String, load: f64 },
    ProbeFailed { address: String, reason: String },
    HostSelected { address: String, load: f64 },
    OsDetected { address: String, family: OsFamily },
    PhaseChanged { address: Option<String>, from: RunState, to: RunState },
    RunSucceeded { address: String },
    RunFailed { address: Option<String>, reason: String },
}

/// Event sink
pub trait RunReporter: Send + Sync {
    fn report(&self, event: RunEvent);
}

/// Production reporter: forwards events to `tracing`
pub struct TracingReporter;

impl RunReporter for TracingReporter {
    fn report(&self, event: RunEvent) {
        match event {
            RunEvent::ConnectionOpened { address } => {
                info!(address = %address, "Connection established")
            }
            RunEvent::ConnectionClosed { address } => {
                info!(address = %address, "Connection closed")
            }
            RunEvent::CommandStarted { address, command } => {
                info!(address = %address, command = %command, "Running command")
            }
            RunEvent::CommandStderr {
                address,
                command,
                stderr,
            } => warn!(
                address = %address,
                command = %command,
                stderr = %stderr.trim(),
                "Command wrote to stderr"
            ),
            RunEvent::LoadObserved { address, load } => {
                info!(address = %address, load = %load, "Load average observed")
            }
            RunEvent::ProbeFailed { address, reason } => {
                warn!(address = %address, reason = %reason, "Probe failed, host excluded")
            }
            RunEvent::HostSelected { address, load } => {
                info!(address = %address, load = %load, "Least-loaded host selected")
            }
            RunEvent::OsDetected { address, family } => {
                info!(address = %address, os = %family, "OS detected")
            }
            RunEvent::PhaseChanged { address, from, to } => info!(
                address = ?address,
                from = %from,
                to = %to,
                "Phase transition"
            ),
            RunEvent::RunSucceeded { address } => {
                info!(address = %address, "PostgreSQL provisioned and answering queries")
            }
            RunEvent::RunFailed { address, reason } => {
                error!(address = ?address, reason = %reason, "Provisioning run failed")
            }
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Reporter that keeps every event for assertions
    #[derive(Default)]
    pub struct RecordingReporter {
        events: Mutex<Vec<RunEvent>>,
    }

    impl RecordingReporter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<RunEvent> {
            self.events.lock().unwrap().clone()
        }

        /// Sequence of `to` states from PhaseChanged events
        pub fn phases(&self) -> Vec<RunState> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    RunEvent::PhaseChanged { to, .. } => Some(to),
                    _ => None,
                })
                .collect()
        }

        pub fn probe_failures(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    RunEvent::ProbeFailed { address, .. } => Some(address),
                    _ => None,
                })
                .collect()
        }
    }

    impl RunReporter for RecordingReporter {
        fn report(&self, event: RunEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
