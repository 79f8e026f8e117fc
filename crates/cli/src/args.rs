//! Command-line arguments and their mapping onto core configuration

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pgpilot_core::application::{RunConfig, StderrPolicy};
use pgpilot_core::domain::plan::DEFAULT_DEBIAN_PG_MAJOR;
use pgpilot_core::domain::{AccessRule, Credentials, Host, PlanSettings};
use pgpilot_infra_ssh::SshSettings;

const DEFAULT_KEY_PATH: &str = "~/.ssh/id_ed25519";

#[derive(Parser, Debug)]
#[command(name = "pgpilot")]
#[command(about = "Install PostgreSQL on the least-loaded host of a pool", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print the final report as JSON instead of a table
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe every host and show which one would be selected
    Probe {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Select the least-loaded host and provision PostgreSQL on it
    Provision {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        postgres: PostgresArgs,

        /// Abort on the first command that writes to stderr or exits non-zero
        #[arg(long, env = "PGPILOT_STRICT")]
        strict: bool,
    },
}

/// Where to connect and how
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Comma-separated candidate addresses (host or host:port)
    #[arg(long, env = "PGPILOT_HOSTS", value_delimiter = ',', required = true)]
    pub hosts: Vec<String>,

    /// Remote user
    #[arg(short, long, env = "PGPILOT_USER", default_value = "root")]
    pub user: String,

    /// Private key used for public-key authentication
    #[arg(short, long, env = "PGPILOT_SSH_KEY", default_value = DEFAULT_KEY_PATH)]
    pub key: String,

    /// Passphrase of the private key
    #[arg(long, env = "PGPILOT_SSH_KEY_PASSPHRASE", hide_env_values = true)]
    pub key_passphrase: Option<String>,

    /// SSH port for addresses without an explicit one
    #[arg(short, long, env = "PGPILOT_SSH_PORT", default_value_t = 22)]
    pub port: u16,

    /// Per-step probe timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub probe_timeout_secs: u64,

    /// SSH connect + handshake timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Maximum number of hosts probed at once
    #[arg(long, default_value_t = 16)]
    pub max_parallel_probes: usize,
}

/// PostgreSQL configuration applied on the selected host
#[derive(Args, Debug)]
pub struct PostgresArgs {
    /// Value for listen_addresses
    #[arg(long, default_value = "*")]
    pub listen_addresses: String,

    /// Database user granted remote access
    #[arg(long, default_value = "student")]
    pub allow_user: String,

    /// Network the access rule applies to
    #[arg(long, default_value = "192.168.1.2/32")]
    pub allow_cidr: String,

    /// Authentication method of the access rule
    #[arg(long, default_value = "md5")]
    pub allow_method: String,

    /// PostgreSQL major version in Debian config paths
    #[arg(long, default_value_t = DEFAULT_DEBIAN_PG_MAJOR)]
    pub pg_major: u32,
}

impl TargetArgs {
    /// Candidate hosts with blank entries dropped
    pub fn hosts(&self) -> Vec<Host> {
        let credentials = Arc::new(self.credentials());
        Host::from_addresses(
            self.hosts
                .iter()
                .map(|h| h.trim())
                .filter(|h| !h.is_empty()),
            credentials,
        )
    }

    pub fn credentials(&self) -> Credentials {
        let key_path = PathBuf::from(shellexpand::tilde(&self.key).into_owned());
        let credentials = Credentials::new(&self.user, key_path).with_port(self.port);
        match &self.key_passphrase {
            Some(passphrase) => credentials.with_passphrase(passphrase),
            None => credentials,
        }
    }

    pub fn run_config(&self, stderr_policy: StderrPolicy) -> RunConfig {
        RunConfig {
            max_parallel_probes: self.max_parallel_probes,
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            stderr_policy,
        }
    }

    pub fn ssh_settings(&self) -> SshSettings {
        SshSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..SshSettings::default()
        }
    }
}

impl PostgresArgs {
    pub fn plan_settings(&self) -> PlanSettings {
        PlanSettings {
            listen_addresses: self.listen_addresses.clone(),
            access_rule: AccessRule::new(&self.allow_user, &self.allow_cidr, &self.allow_method),
            debian_pg_major: self.pg_major,
        }
    }
}
