// Provisioning Plan Domain Model
// Pure data: one plan per supported OsFamily, immutable once built

use serde::{Deserialize, Serialize};

use super::os::OsFamily;

/// Default PostgreSQL major version used in Debian config paths
pub const DEFAULT_DEBIAN_PG_MAJOR: u32 = 15;

/// Marker the verify query must print for the run to count as healthy
pub const VERIFY_ROW_MARKER: &str = "1 row";

const RHEL_DATA_DIR: &str = "/var/lib/pgsql/data";

/// One `pg_hba.conf` line granting remote access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub database: String,
    pub user: String,
    pub cidr: String,
    pub method: String,
}

impl AccessRule {
    pub fn new(user: impl Into<String>, cidr: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            database: "all".to_string(),
            user: user.into(),
            cidr: cidr.into(),
            method: method.into(),
        }
    }

    /// Render as a `pg_hba.conf` line
    pub fn to_hba_line(&self) -> String {
        format!(
            "host {} {} {} {}",
            self.database, self.user, self.cidr, self.method
        )
    }
}

impl Default for AccessRule {
    fn default() -> Self {
        Self::new("student", "192.168.1.2/32", "md5")
    }
}

/// Tunables that shape the generated commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSettings {
    /// Value written to `listen_addresses`
    pub listen_addresses: String,
    pub access_rule: AccessRule,
    /// Major version in `/etc/postgresql/<major>/main`
    pub debian_pg_major: u32,
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self {
            listen_addresses: "*".to_string(),
            access_rule: AccessRule::default(),
            debian_pg_major: DEFAULT_DEBIAN_PG_MAJOR,
        }
    }
}

/// Ordered command templates for one OS family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningPlan {
    pub family: OsFamily,
    pub install_command: String,
    /// Prints `present` or `absent` depending on the data-dir sentinel
    pub initdb_precondition_check: Option<String>,
    pub initdb_command: Option<String>,
    pub data_dir_sentinel: Option<String>,
    pub config_file_path: String,
    pub hba_file_path: String,
    pub listen_address_patch_command: String,
    pub access_rule_append_command: String,
    pub restart_command: String,
    pub verify_command: String,
}

impl ProvisioningPlan {
    /// Debian / Ubuntu: apt, cluster created by the package
    pub fn debian_like(settings: &PlanSettings) -> Self {
        let conf_dir = format!("/etc/postgresql/{}/main", settings.debian_pg_major);
        Self::with_common(
            OsFamily::DebianLike,
            settings,
            "DEBIAN_FRONTEND=noninteractive apt-get update && \
             DEBIAN_FRONTEND=noninteractive apt-get install -y postgresql"
                .to_string(),
            None,
            format!("{}/postgresql.conf", conf_dir),
            format!("{}/pg_hba.conf", conf_dir),
        )
    }

    /// CentOS / AlmaLinux / RHEL: dnf, explicit guarded initdb
    pub fn rhel_like(settings: &PlanSettings) -> Self {
        Self::with_common(
            OsFamily::RhelLike,
            settings,
            "dnf install -y postgresql-server postgresql-contrib && systemctl enable postgresql"
                .to_string(),
            Some(format!("{}/PG_VERSION", RHEL_DATA_DIR)),
            format!("{}/postgresql.conf", RHEL_DATA_DIR),
            format!("{}/pg_hba.conf", RHEL_DATA_DIR),
        )
    }

    fn with_common(
        family: OsFamily,
        settings: &PlanSettings,
        install_command: String,
        data_dir_sentinel: Option<String>,
        config_file_path: String,
        hba_file_path: String,
    ) -> Self {
        let rule = settings.access_rule.to_hba_line();

        let listen_address_patch_command = format!(
            "sed -i \"s/^#listen_addresses = 'localhost'/listen_addresses = '{}'/\" {}",
            settings.listen_addresses, config_file_path
        );
        let access_rule_append_command = format!(
            "grep -qxF '{rule}' {hba} || echo '{rule}' >> {hba}",
            rule = rule,
            hba = hba_file_path
        );

        let initdb_precondition_check = data_dir_sentinel
            .as_ref()
            .map(|sentinel| format!("test -f {} && echo present || echo absent", sentinel));
        let initdb_command = data_dir_sentinel
            .as_ref()
            .map(|_| "postgresql-setup --initdb".to_string());

        Self {
            family,
            install_command,
            initdb_precondition_check,
            initdb_command,
            data_dir_sentinel,
            config_file_path,
            hba_file_path,
            listen_address_patch_command,
            access_rule_append_command,
            restart_command: "systemctl restart postgresql".to_string(),
            verify_command: "sudo -u postgres bash -c 'cd ~ && psql -c \"SELECT 1;\"'".to_string(),
        }
    }

    pub fn requires_initdb(&self) -> bool {
        self.initdb_command.is_some()
    }

    /// Commands for the Installing phase
    pub fn install_sequence(&self) -> Vec<String> {
        vec![self.install_command.clone()]
    }

    /// Commands for the Configuring phase
    ///
    /// The initdb step is included only when the plan has one and the data
    /// directory is not initialized yet, so a second call after initdb
    /// returns the same sequence minus that step.
    pub fn configure_sequence(&self, data_dir_initialized: bool) -> Vec<String> {
        let mut commands = Vec::with_capacity(4);
        if let Some(initdb) = &self.initdb_command {
            if !data_dir_initialized {
                commands.push(initdb.clone());
            }
        }
        commands.push(self.listen_address_patch_command.clone());
        commands.push(self.access_rule_append_command.clone());
        commands.push(self.restart_command.clone());
        commands
    }

    /// Commands for the Verifying phase
    pub fn verify_sequence(&self) -> Vec<String> {
        vec![self.verify_command.clone()]
    }
}

/// Interpret the output of `initdb_precondition_check`
pub fn sentinel_present(check_output: &str) -> bool {
    check_output.trim() == "present"
}

/// Whether verify output carries the row-count marker
pub fn verify_output_ok(output: &str) -> bool {
    output.contains(VERIFY_ROW_MARKER)
}
