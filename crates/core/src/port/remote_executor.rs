// Remote Executor Port
// Abstraction over an authenticated remote command channel (SSH in production)

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ConnectionState, Credentials};

/// Captured output of one remote command
///
/// Both streams are always returned; the executor never interprets the exit
/// status, callers decide what counts as failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    /// None when the transport did not report one
    pub exit_status: Option<u32>,
}

impl CommandResult {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status: None,
        }
    }

    pub fn with_exit_status(mut self, status: u32) -> Self {
        self.exit_status = Some(status);
        self
    }

    pub fn has_stderr(&self) -> bool {
        !self.stderr.trim().is_empty()
    }

    /// Non-empty stderr or a reported non-zero exit status
    pub fn indicates_failure(&self) -> bool {
        self.has_stderr() || self.exit_status.is_some_and(|s| s != 0)
    }
}

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Authentication rejected for user {0}")]
    AuthRejected(String),

    #[error("Key load failed: {0}")]
    Key(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Connect timeout after {0}ms")]
    Timeout(u64),

    #[error("Connection is closed")]
    Closed,
}

/// An open, authenticated channel to one host
///
/// Single owner: a connection is never shared between tasks.
#[async_trait]
pub trait Connection: Send {
    /// Address this connection was opened against
    fn address(&self) -> &str;

    fn state(&self) -> ConnectionState;

    /// Run a command and capture both output streams
    ///
    /// # Errors
    /// - ConnectionError::Closed if called after close
    /// - ConnectionError::Channel if the transport breaks mid-command
    async fn execute(&mut self, command: &str) -> Result<CommandResult, ConnectionError>;

    /// Close the connection. Idempotent: closing twice is a no-op.
    async fn close(&mut self);
}

/// Opens connections
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Open an authenticated connection to `address`
    ///
    /// # Errors
    /// - ConnectionError::Connect on network failure
    /// - ConnectionError::AuthRejected / Key on credential problems
    async fn open(
        &self,
        address: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn Connection>, ConnectionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Scripted response for commands whose text contains `needle`
    #[derive(Debug, Clone)]
    struct Rule {
        needle: String,
        result: CommandResult,
    }

    /// Behavior of one scripted host
    #[derive(Debug, Clone, Default)]
    pub struct ScriptedHost {
        open_error: Option<ConnectionError>,
        open_delay: Option<Duration>,
        command_delay: Option<Duration>,
        /// Opens beyond this count fail
        open_limit: Option<usize>,
        rules: Vec<Rule>,
        /// Simulated data-dir sentinel; flips to true once initdb runs
        initialized: bool,
    }

    impl ScriptedHost {
        pub fn new() -> Self {
            Self::default()
        }

        /// Host answering the load probe with `load`
        pub fn with_load(load: f64) -> Self {
            Self::new().respond("/proc/loadavg", format!("{} 0.40 0.30 1/123 4567\n", load))
        }

        /// Host whose open fails
        pub fn unreachable(error: ConnectionError) -> Self {
            Self {
                open_error: Some(error),
                ..Self::default()
            }
        }

        /// Full provisioning target: load, OS id, working verify
        pub fn provisionable(load: f64, os_id: &str) -> Self {
            Self::with_load(load)
                .respond("os-release", format!("NAME=\"Test\"\nID={}\n", os_id))
                .respond("psql", " ?column? \n----------\n        1\n(1 row)\n\n")
        }

        pub fn respond(self, needle: impl Into<String>, stdout: impl Into<String>) -> Self {
            self.respond_with(needle, CommandResult::new(stdout, ""))
        }

        /// First matching rule wins; later rules for the same needle are shadowed
        pub fn respond_with(mut self, needle: impl Into<String>, result: CommandResult) -> Self {
            let needle = needle.into();
            self.rules.retain(|r| r.needle != needle);
            self.rules.insert(0, Rule { needle, result });
            self
        }

        pub fn open_delay(mut self, delay: Duration) -> Self {
            self.open_delay = Some(delay);
            self
        }

        pub fn command_delay(mut self, delay: Duration) -> Self {
            self.command_delay = Some(delay);
            self
        }

        /// Accept only the first `opens` connections, refuse the rest
        pub fn reachable_for(mut self, opens: usize) -> Self {
            self.open_limit = Some(opens);
            self
        }

        pub fn initialized(mut self, initialized: bool) -> Self {
            self.initialized = initialized;
            self
        }

        fn answer(&mut self, command: &str) -> CommandResult {
            if command.starts_with("test -f") && command.contains("PG_VERSION") {
                let state = if self.initialized { "present" } else { "absent" };
                return CommandResult::new(format!("{}\n", state), "").with_exit_status(0);
            }
            if command.contains("--initdb") {
                self.initialized = true;
            }
            self.rules
                .iter()
                .find(|r| command.contains(&r.needle))
                .map(|r| r.result.clone())
                .unwrap_or_else(|| CommandResult::new("", "").with_exit_status(0))
        }
    }

    #[derive(Debug, Default)]
    struct Journal {
        hosts: HashMap<String, ScriptedHost>,
        commands: Vec<(String, String)>,
        opens: HashMap<String, usize>,
        closes: HashMap<String, usize>,
    }

    /// Scripted executor for testing
    ///
    /// Unknown addresses fail to open. Host state (initdb sentinel) persists
    /// across connections, like a real machine.
    #[derive(Clone, Default)]
    pub struct ScriptedExecutor {
        journal: Arc<Mutex<Journal>>,
    }

    impl ScriptedExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_host(self, address: impl Into<String>, host: ScriptedHost) -> Self {
            self.journal
                .lock()
                .unwrap()
                .hosts
                .insert(address.into(), host);
            self
        }

        /// Every (address, command) executed, in order
        pub fn commands(&self) -> Vec<(String, String)> {
            self.journal.lock().unwrap().commands.clone()
        }

        /// Commands executed against one address
        pub fn commands_for(&self, address: &str) -> Vec<String> {
            self.commands()
                .into_iter()
                .filter(|(a, _)| a == address)
                .map(|(_, c)| c)
                .collect()
        }

        pub fn open_count(&self, address: &str) -> usize {
            *self.journal.lock().unwrap().opens.get(address).unwrap_or(&0)
        }

        pub fn close_count(&self, address: &str) -> usize {
            *self.journal.lock().unwrap().closes.get(address).unwrap_or(&0)
        }

        /// True when every successful open was matched by a close
        pub fn all_closed(&self) -> bool {
            let journal = self.journal.lock().unwrap();
            journal
                .opens
                .iter()
                .all(|(addr, n)| journal.closes.get(addr) == Some(n))
        }
    }

    #[async_trait]
    impl RemoteExecutor for ScriptedExecutor {
        async fn open(
            &self,
            address: &str,
            _credentials: &Credentials,
        ) -> Result<Box<dyn Connection>, ConnectionError> {
            let host = self.journal.lock().unwrap().hosts.get(address).cloned();
            let host = host.ok_or_else(|| {
                ConnectionError::Connect(format!("no route to host {}", address))
            })?;

            if let Some(delay) = host.open_delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = host.open_error {
                return Err(err);
            }

            {
                let mut journal = self.journal.lock().unwrap();
                let opens = journal.opens.entry(address.to_string()).or_default();
                if host.open_limit.is_some_and(|limit| *opens >= limit) {
                    return Err(ConnectionError::Connect(format!(
                        "connection refused by {}",
                        address
                    )));
                }
                *opens += 1;
            }

            Ok(Box::new(ScriptedConnection {
                address: address.to_string(),
                state: ConnectionState::Connected,
                command_delay: host.command_delay,
                journal: Arc::clone(&self.journal),
            }))
        }
    }

    struct ScriptedConnection {
        address: String,
        state: ConnectionState,
        command_delay: Option<Duration>,
        journal: Arc<Mutex<Journal>>,
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        fn address(&self) -> &str {
            &self.address
        }

        fn state(&self) -> ConnectionState {
            self.state
        }

        async fn execute(&mut self, command: &str) -> Result<CommandResult, ConnectionError> {
            if self.state == ConnectionState::Disconnected {
                return Err(ConnectionError::Closed);
            }
            if let Some(delay) = self.command_delay {
                tokio::time::sleep(delay).await;
            }

            let mut journal = self.journal.lock().unwrap();
            journal
                .commands
                .push((self.address.clone(), command.to_string()));
            let host = journal
                .hosts
                .get_mut(&self.address)
                .ok_or(ConnectionError::Closed)?;
            Ok(host.answer(command))
        }

        async fn close(&mut self) {
            if self.state == ConnectionState::Disconnected {
                return;
            }
            self.state = ConnectionState::Disconnected;
            *self
                .journal
                .lock()
                .unwrap()
                .closes
                .entry(self.address.clone())
                .or_default() += 1;
        }
    }

}
