// pgpilot Infrastructure - SSH Adapter
// Implements: RemoteExecutor, Connection

pub mod ssh_executor;

pub use ssh_executor::{SshExecutor, SshSettings};
