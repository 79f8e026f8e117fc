// Orchestrator - select the least-loaded host, then provision it
//
// Selecting -> Detecting -> Installing -> Configuring -> Verifying -> Done,
// with Failed reachable from any non-terminal state. Provisioning is strictly
// sequential and never retried.

use std::sync::Arc;
use tracing::{error, info};

use super::command::run_reported;
use super::config::{RunConfig, StderrPolicy};
use super::constants::OS_RELEASE_COMMAND;
use super::os_detect::detect;
use super::planner::Planner;
use super::selector::Selector;
use crate::domain::plan::{sentinel_present, verify_output_ok};
use crate::domain::{
    CommandWarning, Host, OsFamily, PhaseRecord, ProvisionReport, ProvisioningPlan, RunState,
    SelectionReport,
};
use crate::error::{ProvisionError, Result};
use crate::port::{Connection, RemoteExecutor, RunEvent, RunReporter, TimeProvider};

pub struct Orchestrator {
    executor: Arc<dyn RemoteExecutor>,
    reporter: Arc<dyn RunReporter>,
    time_provider: Arc<dyn TimeProvider>,
    planner: Planner,
    config: RunConfig,
}

/// Current state plus the host it concerns
struct Progress<'a> {
    state: RunState,
    address: Option<String>,
    reporter: &'a dyn RunReporter,
}

impl Progress<'_> {
    fn advance(&mut self, to: RunState) -> Result<()> {
        let from = self.state;
        self.state = from.transition(to)?;
        self.reporter.report(RunEvent::PhaseChanged {
            address: self.address.clone(),
            from,
            to,
        });
        Ok(())
    }

    /// Move to Failed, log with host context, hand the error back
    fn fail(&mut self, err: ProvisionError) -> ProvisionError {
        let from = self.state;
        if let Ok(to) = from.transition(RunState::Failed) {
            self.state = to;
            self.reporter.report(RunEvent::PhaseChanged {
                address: self.address.clone(),
                from,
                to,
            });
        }
        let address = err
            .address()
            .map(str::to_string)
            .or_else(|| self.address.clone());
        error!(address = ?address, failed_in = %from, error = %err, "Run failed");
        self.reporter.report(RunEvent::RunFailed {
            address,
            reason: err.to_string(),
        });
        err
    }
}

/// What the provisioning phases produced
struct Provisioned {
    os_family: OsFamily,
    phases: Vec<PhaseRecord>,
    warnings: Vec<CommandWarning>,
    verify_output: String,
}

impl Orchestrator {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        reporter: Arc<dyn RunReporter>,
        time_provider: Arc<dyn TimeProvider>,
        planner: Planner,
        config: RunConfig,
    ) -> Self {
        Self {
            executor,
            reporter,
            time_provider,
            planner,
            config,
        }
    }

    fn selector(&self) -> Selector {
        Selector::new(
            Arc::clone(&self.executor),
            Arc::clone(&self.reporter),
            self.config.max_parallel_probes,
            self.config.probe_timeout,
        )
    }

    /// Probe and select without provisioning anything
    pub async fn select(&self, hosts: &[Host]) -> Result<SelectionReport> {
        self.config.validate()?;
        self.selector().select_least_loaded(hosts).await
    }

    /// Full run: select the least-loaded host and provision it
    ///
    /// # Errors
    /// - ProvisionError::NoHostsAvailable if every candidate failed probing
    /// - ProvisionError::Connection if the winner cannot be reached again
    /// - ProvisionError::UnsupportedOs before any install command runs
    /// - ProvisionError::CommandFailed under `StderrPolicy::Strict`
    /// - ProvisionError::VerificationFailed if the verify query does not answer
    pub async fn run(&self, hosts: &[Host]) -> Result<ProvisionReport> {
        let mut progress = Progress {
            state: RunState::Selecting,
            address: None,
            reporter: self.reporter.as_ref(),
        };

        let selection = match self.select(hosts).await {
            Ok(selection) => selection,
            Err(e) => return Err(progress.fail(e)),
        };

        let host = &hosts[selection.winner.index];
        progress.address = Some(host.address.clone());
        progress.advance(RunState::Detecting)?;

        // Probing closed its connection, open a fresh one
        let mut conn = match self
            .executor
            .open(&host.address, host.credentials.as_ref())
            .await
        {
            Ok(conn) => conn,
            Err(e) => return Err(progress.fail(ProvisionError::connection(&host.address, e))),
        };
        self.reporter.report(RunEvent::ConnectionOpened {
            address: host.address.clone(),
        });

        let outcome = self.provision(&mut progress, conn.as_mut()).await;

        conn.close().await;
        self.reporter.report(RunEvent::ConnectionClosed {
            address: host.address.clone(),
        });

        let provisioned = outcome.map_err(|e| progress.fail(e))?;

        info!(
            address = %host.address,
            os = %provisioned.os_family,
            warnings = provisioned.warnings.len(),
            "Provisioning complete"
        );
        self.reporter.report(RunEvent::RunSucceeded {
            address: host.address.clone(),
        });

        Ok(ProvisionReport {
            address: host.address.clone(),
            load: selection.winner.load,
            os_family: provisioned.os_family,
            final_state: progress.state,
            phases: provisioned.phases,
            warnings: provisioned.warnings,
            selection,
            verify_output: provisioned.verify_output,
        })
    }

    /// Detecting through Done against one open connection
    async fn provision(
        &self,
        progress: &mut Progress<'_>,
        conn: &mut dyn Connection,
    ) -> Result<Provisioned> {
        let address = conn.address().to_string();
        let mut phases = Vec::with_capacity(4);
        let mut warnings = Vec::new();

        // Detecting: computed once and threaded through the later phases
        let started_at = self.time_provider.now_millis();
        let os_family = detect(conn, self.reporter.as_ref()).await?;
        phases.push(PhaseRecord {
            phase: RunState::Detecting,
            commands: vec![OS_RELEASE_COMMAND.to_string()],
            started_at,
            finished_at: self.time_provider.now_millis(),
        });
        let plan = self.planner.plan_for(&address, &os_family)?;

        progress.advance(RunState::Installing)?;
        let install = self
            .run_phase(conn, RunState::Installing, plan.install_sequence(), &mut warnings)
            .await?;
        phases.push(install.record);

        progress.advance(RunState::Configuring)?;
        let configure = self.configure(conn, &plan, &mut warnings).await?;
        phases.push(configure);

        progress.advance(RunState::Verifying)?;
        let verify = self
            .run_phase(conn, RunState::Verifying, plan.verify_sequence(), &mut warnings)
            .await?;
        phases.push(verify.record);

        let verify_output = verify.last_stdout;
        if !verify_output_ok(&verify_output) {
            return Err(ProvisionError::VerificationFailed {
                address,
                output: verify_output.trim().to_string(),
            });
        }

        progress.advance(RunState::Done)?;
        Ok(Provisioned {
            os_family,
            phases,
            warnings,
            verify_output,
        })
    }

    /// Configuring phase: guarded initdb, then config edits and restart
    async fn configure(
        &self,
        conn: &mut dyn Connection,
        plan: &ProvisioningPlan,
        warnings: &mut Vec<CommandWarning>,
    ) -> Result<PhaseRecord> {
        let started_at = self.time_provider.now_millis();
        let mut commands = Vec::new();

        let guard = plan
            .initdb_precondition_check
            .as_ref()
            .filter(|_| plan.requires_initdb());
        let initialized = match guard {
            Some(check) => {
                let ran = self
                    .run_phase(conn, RunState::Configuring, vec![check.clone()], warnings)
                    .await?;
                commands.extend(ran.record.commands);
                sentinel_present(&ran.last_stdout)
            }
            None => !plan.requires_initdb(),
        };

        let ran = self
            .run_phase(
                conn,
                RunState::Configuring,
                plan.configure_sequence(initialized),
                warnings,
            )
            .await?;
        commands.extend(ran.record.commands);

        Ok(PhaseRecord {
            phase: RunState::Configuring,
            commands,
            started_at,
            finished_at: self.time_provider.now_millis(),
        })
    }

    /// Run commands in order, applying the stderr policy to each
    async fn run_phase(
        &self,
        conn: &mut dyn Connection,
        phase: RunState,
        commands: Vec<String>,
        warnings: &mut Vec<CommandWarning>,
    ) -> Result<PhaseRun> {
        let started_at = self.time_provider.now_millis();
        let mut last_stdout = String::new();

        for command in &commands {
            let result = run_reported(conn, self.reporter.as_ref(), command)
                .await
                .map_err(|e| ProvisionError::connection(conn.address(), e))?;

            if result.indicates_failure() {
                if self.config.stderr_policy == StderrPolicy::Strict {
                    return Err(ProvisionError::CommandFailed {
                        address: conn.address().to_string(),
                        phase,
                        command: command.clone(),
                        stderr: result.stderr.trim().to_string(),
                    });
                }
                warnings.push(CommandWarning {
                    phase,
                    command: command.clone(),
                    stderr: result.stderr.clone(),
                    exit_status: result.exit_status,
                });
            }
            last_stdout = result.stdout;
        }

        Ok(PhaseRun {
            record: PhaseRecord {
                phase,
                commands,
                started_at,
                finished_at: self.time_provider.now_millis(),
            },
            last_stdout,
        })
    }
}

struct PhaseRun {
    record: PhaseRecord,
    last_stdout: String,
}
