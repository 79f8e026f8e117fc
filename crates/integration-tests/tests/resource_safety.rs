//! Connection bookkeeping: bounded fan-out, release on every path

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pgpilot_core::application::{Orchestrator, Planner, RunConfig, StderrPolicy};
use pgpilot_core::domain::{ConnectionState, Credentials, Host, PlanSettings, ProbeOutcome};
use pgpilot_core::port::remote_executor::mocks::{ScriptedExecutor, ScriptedHost};
use pgpilot_core::port::reporter::mocks::RecordingReporter;
use pgpilot_core::port::time_provider::mocks::SteppingClock;
use pgpilot_core::port::{CommandResult, Connection, ConnectionError, RemoteExecutor};

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
        Arc::new(SteppingClock::new(1_700_000_000_000, 5)),
        Planner::new(PlanSettings::default()),
        config,
    )
}

/// Tracks how many connections are open at once
#[derive(Default)]
struct Gauge {
    open: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Every host answers the load probe slowly; addresses starting with
/// "panic" blow up inside the probe
struct GaugedExecutor {
    gauge: Arc<Gauge>,
}

#[async_trait]
impl RemoteExecutor for GaugedExecutor {
    async fn open(
        &self,
        address: &str,
        _credentials: &Credentials,
    ) -> Result<Box<dyn Connection>, ConnectionError> {
        self.gauge.enter();
        Ok(Box::new(GaugedConnection {
            address: address.to_string(),
            gauge: Arc::clone(&self.gauge),
            open: true,
        }))
    }
}

struct GaugedConnection {
    address: String,
    gauge: Arc<Gauge>,
    open: bool,
}

#[async_trait]
impl Connection for GaugedConnection {
    fn address(&self) -> &str {
        &self.address
    }

    fn state(&self) -> ConnectionState {
        if self.open {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    async fn execute(&mut self, _command: &str) -> Result<CommandResult, ConnectionError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.address.starts_with("panic") {
            panic!("probe task crashed for {}", self.address);
        }
        Ok(CommandResult::new("0.25 0.20 0.10 1/100 42\n", ""))
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.gauge.leave();
        }
    }
}

impl Drop for GaugedConnection {
    fn drop(&mut self) {
        // A panicking task never reaches close
        if self.open {
            self.gauge.leave();
        }
    }
}

#[tokio::test]
async fn test_fan_out_respects_parallel_limit() {
    let gauge = Arc::new(Gauge::default());
    let executor = GaugedExecutor {
        gauge: Arc::clone(&gauge),
    };
    let addresses: Vec<String> = (0..24).map(|i| format!("10.0.1.{}", i)).collect();
    let candidates = Host::from_addresses(
        addresses.iter().cloned(),
        Arc::new(Credentials::new("root", "/keys/id_ed25519")),
    );
    let config = RunConfig {
        max_parallel_probes: 4,
        ..RunConfig::default()
    };

    let selection = orchestrator(Arc::new(executor), config)
        .select(&candidates)
        .await
        .unwrap();

    assert_eq!(selection.failed_count(), 0);
    assert_eq!(selection.winner.address, "10.0.1.0");
    assert_eq!(gauge.total.load(Ordering::SeqCst), 24);
    assert!(gauge.peak.load(Ordering::SeqCst) <= 4);
    assert_eq!(gauge.open.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_panicking_probe_excludes_only_that_host() {
    let gauge = Arc::new(Gauge::default());
    let executor = GaugedExecutor {
        gauge: Arc::clone(&gauge),
    };

    let reporter = Arc::new(RecordingReporter::new());
    let orchestrator = Orchestrator::new(
        Arc::new(executor),
        reporter.clone(),
        Arc::new(SteppingClock::new(1_700_000_000_000, 5)),
        Planner::new(PlanSettings::default()),
        RunConfig::default(),
    );

    let selection = orchestrator
        .select(&hosts(&["panic-1", "steady"]))
        .await
        .unwrap();

    assert_eq!(selection.winner.address, "steady");
    assert!(matches!(
        &selection.outcomes[0].1,
        ProbeOutcome::Failed { reason } if reason.contains("probe task crashed for panic-1")
    ));
    assert_eq!(reporter.probe_failures(), vec!["panic-1".to_string()]);
    assert_eq!(gauge.open.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_every_opened_connection_is_closed() {
    // Success, warning, unsupported OS, strict abort and failed verification
    let scenarios: Vec<(ScriptedHost, StderrPolicy, bool)> = vec![
        (ScriptedHost::provisionable(0.1, "debian"), StderrPolicy::Permissive, true),
        (
            ScriptedHost::provisionable(0.1, "ubuntu").respond_with(
                "apt-get",
                CommandResult::new("", "debconf: falling back to frontend: Readline\n"),
            ),
            StderrPolicy::Permissive,
            true,
        ),
        (ScriptedHost::provisionable(0.1, "arch"), StderrPolicy::Permissive, false),
        (
            ScriptedHost::provisionable(0.1, "rhel").respond_with(
                "dnf",
                CommandResult::new("", "Error: Unable to find a match\n").with_exit_status(1),
            ),
            StderrPolicy::Strict,
            false,
        ),
        (
            ScriptedHost::provisionable(0.1, "centos").respond("psql", "psql: error: connection refused"),
            StderrPolicy::Permissive,
            false,
        ),
    ];

    for (host, policy, should_succeed) in scenarios {
        let executor = ScriptedExecutor::new()
            .with_host("db-a", host)
            .with_host("db-b", ScriptedHost::with_load(3.0));
        let config = RunConfig {
            stderr_policy: policy,
            ..RunConfig::default()
        };

        let result = orchestrator(Arc::new(executor.clone()), config)
            .run(&hosts(&["db-a", "db-b"]))
            .await;

        assert_eq!(result.is_ok(), should_succeed, "unexpected outcome: {:?}", result.err());
        // Probe plus provisioning session on the winner, probe only on the other
        assert_eq!(executor.open_count("db-a"), 2);
        assert_eq!(executor.open_count("db-b"), 1);
        assert!(executor.all_closed());
    }
}

#[tokio::test]
async fn test_timed_out_probe_still_closes() {
    let executor = ScriptedExecutor::new()
        .with_host(
            "stuck",
            ScriptedHost::with_load(0.0).command_delay(Duration::from_secs(60)),
        )
        .with_host("ok", ScriptedHost::with_load(1.0));
    let config = RunConfig {
        probe_timeout: Duration::from_millis(100),
        ..RunConfig::default()
    };

    let selection = orchestrator(Arc::new(executor.clone()), config)
        .select(&hosts(&["stuck", "ok"]))
        .await
        .unwrap();

    assert_eq!(selection.winner.address, "ok");
    assert_eq!(executor.open_count("stuck"), 1);
    assert_eq!(executor.close_count("stuck"), 1);
}
