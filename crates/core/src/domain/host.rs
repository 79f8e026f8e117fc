// Host Domain Model

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Authentication material for a remote host
///
/// Opaque to the core; only the transport adapter interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub private_key_path: PathBuf,
    #[serde(skip_serializing)]
    pub key_passphrase: Option<String>,
    pub port: u16,
}

impl Credentials {
    pub fn new(username: impl Into<String>, private_key_path: impl Into<PathBuf>) -> Self {
        Self {
            username: username.into(),
            private_key_path: private_key_path.into(),
            key_passphrase: None,
            port: DEFAULT_SSH_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.key_passphrase = Some(passphrase.into());
        self
    }
}

/// Connection lifecycle of a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionState::Connected => write!(f, "CONNECTED"),
        }
    }
}

/// A candidate host, one per input address
#[derive(Debug, Clone)]
pub struct Host {
    pub address: String,
    pub credentials: Arc<Credentials>,
}

impl Host {
    pub fn new(address: impl Into<String>, credentials: Arc<Credentials>) -> Self {
        Self {
            address: address.into(),
            credentials,
        }
    }

    /// Build one host per address, sharing the credentials
    pub fn from_addresses<I, S>(addresses: I, credentials: Arc<Credentials>) -> Vec<Host>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        addresses
            .into_iter()
            .map(|a| Host::new(a, Arc::clone(&credentials)))
            .collect()
    }
}
