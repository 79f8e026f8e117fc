// Central Error Type for a provisioning run

use thiserror::Error;

use crate::domain::RunState;
use crate::port::ConnectionError;

/// Run-level error type
///
/// Every variant that concerns a single host carries its address so the
/// caller can log it with host context.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Connection to {address} failed: {source}")]
    Connection {
        address: String,
        #[source]
        source: ConnectionError,
    },

    #[error("Unparseable load value from {address}: {raw:?}")]
    Parse { address: String, raw: String },

    #[error("Probe of {address} timed out after {timeout_ms}ms")]
    ProbeTimeout { address: String, timeout_ms: u64 },

    #[error("Probe of {address} aborted: {reason}")]
    ProbeAborted { address: String, reason: String },

    #[error("Unsupported OS on {address}: {id:?}")]
    UnsupportedOs { address: String, id: String },

    #[error("No hosts available: all {attempted} candidate(s) failed probing")]
    NoHostsAvailable { attempted: usize },

    #[error("Command failed on {address} during {phase}: {command}: {stderr}")]
    CommandFailed {
        address: String,
        phase: RunState,
        command: String,
        stderr: String,
    },

    #[error("Verification failed on {address}: row marker not found in output {output:?}")]
    VerificationFailed { address: String, output: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProvisionError {
    pub fn connection(address: impl Into<String>, source: ConnectionError) -> Self {
        ProvisionError::Connection {
            address: address.into(),
            source,
        }
    }

    /// Address of the host this error concerns, if any
    pub fn address(&self) -> Option<&str> {
        match self {
            ProvisionError::Connection { address, .. }
            | ProvisionError::Parse { address, .. }
            | ProvisionError::ProbeTimeout { address, .. }
            | ProvisionError::ProbeAborted { address, .. }
            | ProvisionError::UnsupportedOs { address, .. }
            | ProvisionError::CommandFailed { address, .. }
            | ProvisionError::VerificationFailed { address, .. } => Some(address),
            ProvisionError::Domain(_)
            | ProvisionError::NoHostsAvailable { .. }
            | ProvisionError::Config(_) => None,
        }
    }
}

/// Result type alias using ProvisionError
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_host_context() {
        let err = ProvisionError::ProbeAborted {
            address: "10.0.0.7".to_string(),
            reason: "panicked: boom".to_string(),
        };
        assert_eq!(err.address(), Some("10.0.0.7"));

        let err = ProvisionError::connection("10.0.0.8", ConnectionError::Closed);
        assert_eq!(err.address(), Some("10.0.0.8"));

        assert_eq!(ProvisionError::NoHostsAvailable { attempted: 3 }.address(), None);
        assert_eq!(ProvisionError::Config("zero".into()).address(), None);
    }
}
