//! Least-loaded selection end to end, through the Orchestrator

use std::sync::Arc;
use std::time::Duration;

use pgpilot_core::application::{Orchestrator, Planner, RunConfig};
use pgpilot_core::domain::{Credentials, Host, PlanSettings, ProbeOutcome};
use pgpilot_core::port::remote_executor::mocks::{ScriptedExecutor, ScriptedHost};
use pgpilot_core::port::reporter::mocks::RecordingReporter;
use pgpilot_core::port::time_provider::SystemTimeProvider;
use pgpilot_core::port::{ConnectionError, RemoteExecutor};
use pgpilot_core::ProvisionError;
use pgpilot_infra_ssh::{SshExecutor, SshSettings};

fn hosts(addresses: &[&str]) -> Vec<Host> {
    Host::from_addresses(
        addresses.iter().copied(),
        Arc::new(Credentials::new("root", "/keys/id_ed25519")),
    )
}

fn orchestrator(executor: Arc<dyn RemoteExecutor>, config: RunConfig) -> Orchestrator {
    Orchestrator::new(
        executor,
        Arc::new(RecordingReporter::new()),
        Arc::new(SystemTimeProvider),
        Planner::new(PlanSettings::default()),
        config,
    )
}

#[tokio::test]
async fn test_two_hosts_lower_load_wins() {
    let executor = ScriptedExecutor::new()
        .with_host("10.0.0.1", ScriptedHost::with_load(1.2))
        .with_host("10.0.0.2", ScriptedHost::with_load(0.5));

    let selection = orchestrator(Arc::new(executor.clone()), RunConfig::default())
        .select(&hosts(&["10.0.0.1", "10.0.0.2"]))
        .await
        .unwrap();

    assert_eq!(selection.winner.address, "10.0.0.2");
    assert_eq!(selection.winner.load, 0.5);
    assert_eq!(
        selection.outcomes,
        vec![
            ("10.0.0.1".to_string(), ProbeOutcome::Sampled { load: 1.2 }),
            ("10.0.0.2".to_string(), ProbeOutcome::Sampled { load: 0.5 }),
        ]
    );
    // Probing alone issues only the load command
    assert!(executor
        .commands()
        .iter()
        .all(|(_, c)| c == "cat /proc/loadavg"));
    assert!(executor.all_closed());
}

#[tokio::test]
async fn test_duplicate_minimum_picks_first_listed() {
    let executor = ScriptedExecutor::new()
        .with_host("a", ScriptedHost::with_load(0.7))
        .with_host("b", ScriptedHost::with_load(0.1))
        .with_host("c", ScriptedHost::with_load(0.1))
        .with_host("d", ScriptedHost::with_load(0.1));

    // Reverse input order must change the winner
    let forward = orchestrator(Arc::new(executor.clone()), RunConfig::default())
        .select(&hosts(&["a", "b", "c", "d"]))
        .await
        .unwrap();
    let backward = orchestrator(Arc::new(executor.clone()), RunConfig::default())
        .select(&hosts(&["d", "c", "b", "a"]))
        .await
        .unwrap();

    assert_eq!(forward.winner.address, "b");
    assert_eq!(backward.winner.address, "d");
}

#[tokio::test]
async fn test_mixed_failures_are_isolated() {
    let executor = ScriptedExecutor::new()
        .with_host(
            "auth-fail",
            ScriptedHost::unreachable(ConnectionError::AuthRejected("root".into())),
        )
        .with_host(
            "misconfigured",
            ScriptedHost::new().respond("/proc/loadavg", "permission denied"),
        )
        .with_host(
            "hung",
            ScriptedHost::with_load(0.0).command_delay(Duration::from_secs(30)),
        )
        .with_host("busy", ScriptedHost::with_load(8.0))
        .with_host("idle", ScriptedHost::with_load(0.3));

    let config = RunConfig {
        probe_timeout: Duration::from_millis(250),
        ..RunConfig::default()
    };
    let selection = orchestrator(Arc::new(executor.clone()), config)
        .select(&hosts(&["auth-fail", "misconfigured", "hung", "busy", "idle", "unknown"]))
        .await
        .unwrap();

    assert_eq!(selection.winner.address, "idle");
    assert_eq!(selection.failed_count(), 4);
    assert!(executor.all_closed());
}

#[tokio::test]
async fn test_empty_candidate_list() {
    let executor = ScriptedExecutor::new();

    let err = orchestrator(Arc::new(executor.clone()), RunConfig::default())
        .select(&[])
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::NoHostsAvailable { attempted: 0 }));
}

#[tokio::test]
async fn test_ssh_executor_with_missing_key_yields_no_hosts() {
    let executor = SshExecutor::new(SshSettings {
        connect_timeout: Duration::from_millis(500),
        ..SshSettings::default()
    });
    let candidates = Host::from_addresses(
        ["127.0.0.1", "127.0.0.2"],
        Arc::new(Credentials::new("root", "/nonexistent/pgpilot/key")),
    );

    let err = orchestrator(Arc::new(executor), RunConfig::default())
        .select(&candidates)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::NoHostsAvailable { attempted: 2 }));
}
