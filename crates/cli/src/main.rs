//! pgpilot - install PostgreSQL on the least-loaded host of a pool

mod args;
mod logging;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use args::{Cli, Commands};
use pgpilot_core::application::{Orchestrator, Planner, StderrPolicy};
use pgpilot_core::domain::PlanSettings;
use pgpilot_core::port::time_provider::SystemTimeProvider;
use pgpilot_core::port::TracingReporter;
use pgpilot_infra_ssh::SshExecutor;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(logging::LogFormat::from_env()) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "pgpilot failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("pgpilot v{} starting...", VERSION);

    // DI wiring
    let (target, plan_settings, stderr_policy) = match &cli.command {
        Commands::Probe { target } => (target, PlanSettings::default(), StderrPolicy::default()),
        Commands::Provision {
            target,
            postgres,
            strict,
        } => (
            target,
            postgres.plan_settings(),
            if *strict {
                StderrPolicy::Strict
            } else {
                StderrPolicy::Permissive
            },
        ),
    };

    let hosts = target.hosts();
    info!(candidates = hosts.len(), "Candidate hosts parsed");

    let orchestrator = Orchestrator::new(
        Arc::new(SshExecutor::new(target.ssh_settings())),
        Arc::new(TracingReporter),
        Arc::new(SystemTimeProvider),
        Planner::new(plan_settings),
        target.run_config(stderr_policy),
    );

    match &cli.command {
        Commands::Probe { .. } => {
            let selection = orchestrator
                .select(&hosts)
                .await
                .context("Host selection failed")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&selection)?);
            } else {
                output::print_selection(&selection);
            }
        }
        Commands::Provision { .. } => {
            let report = orchestrator
                .run(&hosts)
                .await
                .context("Provisioning failed")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_report(&report);
            }
        }
    }

    Ok(())
}
