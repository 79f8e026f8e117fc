// Selector - least-loaded host selection
//
// Probes run as a bounded fan-out: one tokio task per candidate on a
// JoinSet, gated by a semaphore. The reduction runs only after every task
// has finished, so failures and timeouts on one host never affect another.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use super::constants::PROBE_TASK_ABORTED;
use super::probe::probe;
use crate::domain::load::least_loaded;
use crate::domain::{Host, LoadSample, ProbeOutcome, SelectionReport};
use crate::error::{ProvisionError, Result};
use crate::port::{RemoteExecutor, RunEvent, RunReporter};

pub struct Selector {
    executor: Arc<dyn RemoteExecutor>,
    reporter: Arc<dyn RunReporter>,
    max_parallel: usize,
    probe_timeout: Duration,
}

impl Selector {
    /// Create a selector
    ///
    /// # Arguments
    /// * `max_parallel` - Upper bound on concurrently running probes (min 1)
    /// * `probe_timeout` - Bound on each of open and probe for one host
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        reporter: Arc<dyn RunReporter>,
        max_parallel: usize,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            reporter,
            max_parallel: max_parallel.max(1),
            probe_timeout,
        }
    }

    /// Probe every host and return the least-loaded one
    ///
    /// Ties go to the host that comes first in `hosts`.
    ///
    /// # Errors
    /// - ProvisionError::NoHostsAvailable if `hosts` is empty or every probe failed
    pub async fn select_least_loaded(&self, hosts: &[Host]) -> Result<SelectionReport> {
        if hosts.is_empty() {
            return Err(ProvisionError::NoHostsAvailable { attempted: 0 });
        }

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut set = JoinSet::new();

        for (index, host) in hosts.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let executor = Arc::clone(&self.executor);
            let reporter = Arc::clone(&self.reporter);
            let probe_timeout = self.probe_timeout;

            set.spawn(async move {
                // Hold the permit until the probe finishes; the semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                let address = host.address.clone();
                // Inner task so a panic surfaces as a JoinError tied to this host
                let probe_task = tokio::spawn(async move {
                    probe_host(executor, reporter.as_ref(), &host, probe_timeout).await
                });
                let outcome = match probe_task.await {
                    Ok(outcome) => outcome,
                    Err(join_err) => Err(ProvisionError::ProbeAborted {
                        address,
                        reason: abort_reason(join_err),
                    }),
                };
                (index, outcome)
            });
        }

        let mut outcomes: Vec<(String, ProbeOutcome)> = hosts
            .iter()
            .map(|h| {
                (
                    h.address.clone(),
                    ProbeOutcome::Failed {
                        reason: PROBE_TASK_ABORTED.to_string(),
                    },
                )
            })
            .collect();
        let mut samples = Vec::with_capacity(hosts.len());

        while let Some(joined) = set.join_next().await {
            let (index, outcome) = match joined {
                Ok(pair) => pair,
                Err(join_err) => {
                    // Only the permit wait runs out here; slot keeps its "aborted" outcome
                    error!(error = ?join_err, "Probe supervisor task failed");
                    continue;
                }
            };
            let address = hosts[index].address.clone();

            match outcome.and_then(|load| {
                LoadSample::new(address.clone(), index, load).map_err(ProvisionError::from)
            }) {
                Ok(sample) => {
                    outcomes[index].1 = ProbeOutcome::Sampled { load: sample.load };
                    samples.push(sample);
                }
                Err(e) => {
                    self.reporter.report(RunEvent::ProbeFailed {
                        address,
                        reason: e.to_string(),
                    });
                    outcomes[index].1 = ProbeOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            }
        }

        let winner = least_loaded(&samples)
            .cloned()
            .ok_or(ProvisionError::NoHostsAvailable {
                attempted: hosts.len(),
            })?;

        debug!(
            candidates = hosts.len(),
            sampled = samples.len(),
            "Probe fan-out complete"
        );
        self.reporter.report(RunEvent::HostSelected {
            address: winner.address.clone(),
            load: winner.load,
        });

        Ok(SelectionReport { outcomes, winner })
    }
}

/// Panic message of a crashed probe task, or why it was cancelled
fn abort_reason(join_err: JoinError) -> String {
    if !join_err.is_panic() {
        return join_err.to_string();
    }
    let payload = join_err.into_panic();
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    warn!(panic_msg = %message, "Probe task panicked");
    format!("panicked: {}", message)
}

/// Open, probe, close for one host. The connection is closed on every path
/// once it was opened, including a timed-out probe.
async fn probe_host(
    executor: Arc<dyn RemoteExecutor>,
    reporter: &dyn RunReporter,
    host: &Host,
    probe_timeout: Duration,
) -> Result<f64> {
    let timed_out = || ProvisionError::ProbeTimeout {
        address: host.address.clone(),
        timeout_ms: probe_timeout.as_millis() as u64,
    };

    let mut conn = match timeout(
        probe_timeout,
        executor.open(&host.address, host.credentials.as_ref()),
    )
    .await
    {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => return Err(ProvisionError::connection(&host.address, e)),
        Err(_) => return Err(timed_out()),
    };
    reporter.report(RunEvent::ConnectionOpened {
        address: host.address.clone(),
    });

    let result = match timeout(probe_timeout, probe(conn.as_mut(), reporter)).await {
        Ok(result) => result,
        Err(_) => Err(timed_out()),
    };

    conn.close().await;
    reporter.report(RunEvent::ConnectionClosed {
        address: host.address.clone(),
    });
    result
}
