// SSH executor implementation
// reason: russh for an async, pure-Rust SSH client on the tokio runtime
use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use pgpilot_core::domain::{ConnectionState, Credentials};
use pgpilot_core::port::remote_executor::{
    CommandResult, Connection, ConnectionError, RemoteExecutor,
};

/// SSH extended-data stream carrying stderr
const STDERR_STREAM: u32 = 1;

/// Default bound on TCP connect + handshake (10s)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default idle timeout of an open session (5 minutes)
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// Transport tunables
#[derive(Debug, Clone)]
pub struct SshSettings {
    pub connect_timeout: Duration,
    pub inactivity_timeout: Duration,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
        }
    }
}

/// Client handler: hosts are trusted, every server key is accepted
struct TrustingClient {
    address: String,
}

#[async_trait]
impl client::Handler for TrustingClient {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            address = %self.address,
            fingerprint = %server_public_key.fingerprint(),
            "Accepting server host key"
        );
        Ok(true)
    }
}

/// SSH executor: one session per `open`, one exec channel per command
pub struct SshExecutor {
    client_config: Arc<client::Config>,
    connect_timeout: Duration,
}

impl SshExecutor {
    /// Create a new SSH executor
    ///
    /// # Example
    /// ```ignore
    /// let executor = SshExecutor::new(SshSettings::default());
    /// ```
    pub fn new(settings: SshSettings) -> Self {
        let client_config = client::Config {
            inactivity_timeout: Some(settings.inactivity_timeout),
            ..Default::default()
        };
        Self {
            client_config: Arc::new(client_config),
            connect_timeout: settings.connect_timeout,
        }
    }

    /// Load the private key named by the credentials
    fn load_key(credentials: &Credentials) -> Result<key::KeyPair, ConnectionError> {
        russh_keys::load_secret_key(
            &credentials.private_key_path,
            credentials.key_passphrase.as_deref(),
        )
        .map_err(|e| {
            ConnectionError::Key(format!(
                "{}: {}",
                credentials.private_key_path.display(),
                e
            ))
        })
    }

    /// TCP connect + handshake + public-key auth
    async fn connect_and_authenticate(
        &self,
        address: &str,
        credentials: &Credentials,
        key_pair: key::KeyPair,
    ) -> Result<Handle<TrustingClient>, ConnectionError> {
        let (host, port) = resolve_target(address, credentials.port);
        let handler = TrustingClient {
            address: address.to_string(),
        };

        let mut handle = match timeout(
            self.connect_timeout,
            client::connect(Arc::clone(&self.client_config), (host.as_str(), port), handler),
        )
        .await
        {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => return Err(ConnectionError::Connect(e.to_string())),
            Err(_) => {
                return Err(ConnectionError::Timeout(
                    self.connect_timeout.as_millis() as u64,
                ))
            }
        };

        let accepted = handle
            .authenticate_publickey(&credentials.username, Arc::new(key_pair))
            .await
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;

        if !accepted {
            // Leave the half-open session cleanly before reporting
            if let Err(e) = handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
            {
                debug!(
                    address = %address,
                    error = %e,
                    "SSH disconnect after rejected auth was not clean"
                );
            }
            return Err(ConnectionError::AuthRejected(credentials.username.clone()));
        }

        Ok(handle)
    }
}

impl Default for SshExecutor {
    fn default() -> Self {
        Self::new(SshSettings::default())
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn open(
        &self,
        address: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn Connection>, ConnectionError> {
        let key_pair = Self::load_key(credentials)?;

        let handle = self
            .connect_and_authenticate(address, credentials, key_pair)
            .await
            .map_err(|e| {
                warn!(address = %address, error = %e, "SSH connection failed");
                e
            })?;

        info!(
            address = %address,
            user = %credentials.username,
            "SSH session established"
        );

        Ok(Box::new(SshConnection {
            address: address.to_string(),
            handle: Some(handle),
        }))
    }
}

/// An authenticated SSH session; `handle` is None once closed
pub struct SshConnection {
    address: String,
    handle: Option<Handle<TrustingClient>>,
}

#[async_trait]
impl Connection for SshConnection {
    fn address(&self) -> &str {
        &self.address
    }

    fn state(&self) -> ConnectionState {
        if self.handle.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    async fn execute(&mut self, command: &str) -> Result<CommandResult, ConnectionError> {
        let handle = self.handle.as_ref().ok_or(ConnectionError::Closed)?;

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| ConnectionError::Channel(e.to_string()))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| ConnectionError::Channel(e.to_string()))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        // Drain until the server closes the channel
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == STDERR_STREAM => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                _ => {}
            }
        }

        debug!(
            address = %self.address,
            command = %command,
            exit_status = ?exit_status,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "Remote command finished"
        );

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        })
    }

    async fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(e) = handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            // Session is dropped either way
            debug!(address = %self.address, error = %e, "SSH disconnect was not clean");
        }
        info!(address = %self.address, "SSH session closed");
    }
}

/// Split `host:port`; a bare host (or an IPv6 literal) uses `default_port`
fn resolve_target(address: &str, default_port: u16) -> (String, u16) {
    if let Some(stripped) = address.strip_prefix('[') {
        // [v6]:port
        if let Some((host, rest)) = stripped.split_once(']') {
            let port = rest
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .unwrap_or(default_port);
            return (host.to_string(), port);
        }
    }
    match address.split_once(':') {
        Some((host, port)) if !port.contains(':') => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (address.to_string(), default_port),
        },
        _ => (address.to_string(), default_port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("10.0.0.1", 22), ("10.0.0.1".to_string(), 22));
        assert_eq!(resolve_target("10.0.0.1:2222", 22), ("10.0.0.1".to_string(), 2222));
        assert_eq!(resolve_target("db.internal", 2200), ("db.internal".to_string(), 2200));
        assert_eq!(resolve_target("[fe80::1]:2022", 22), ("fe80::1".to_string(), 2022));
        assert_eq!(resolve_target("[fe80::1]", 22), ("fe80::1".to_string(), 22));
        assert_eq!(resolve_target("fe80::1", 22), ("fe80::1".to_string(), 22));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let executor = SshExecutor::default();
        let creds = Credentials::new("root", "/nonexistent/pgpilot/id_ed25519");

        let result = executor.open("127.0.0.1", &creds).await;

        match result {
            Err(ConnectionError::Key(msg)) => assert!(msg.contains("/nonexistent/pgpilot")),
            Err(other) => panic!("expected key error, got {:?}", other),
            Ok(_) => panic!("expected key error, got a connection"),
        }
    }

    #[test]
    fn test_default_settings() {
        let settings = SshSettings::default();
        assert_eq!(settings.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert!(settings.inactivity_timeout > settings.connect_timeout);
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_commands() {
        let mut conn = SshConnection {
            address: "10.0.0.1".to_string(),
            handle: None,
        };
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        conn.close().await;
        assert_eq!(conn.execute("uptime").await, Err(ConnectionError::Closed));
    }
}
