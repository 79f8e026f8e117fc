// Host Prober - reads the 1-minute load average of a host

use super::command::run_reported;
use super::constants::LOAD_AVERAGE_COMMAND;
use crate::error::{ProvisionError, Result};
use crate::port::{Connection, RunEvent, RunReporter};

/// Parse the first whitespace-separated field of `/proc/loadavg` output
///
/// Returns None for empty, non-numeric, negative or non-finite values.
pub fn parse_load(output: &str) -> Option<f64> {
    let load: f64 = output.split_whitespace().next()?.parse().ok()?;
    (load.is_finite() && load >= 0.0).then_some(load)
}

/// Read the load signal over an open connection
///
/// # Errors
/// - ProvisionError::Connection if the command cannot be run
/// - ProvisionError::Parse if the output is not a usable number
pub async fn probe(conn: &mut dyn Connection, reporter: &dyn RunReporter) -> Result<f64> {
    let address = conn.address().to_string();
    let result = run_reported(conn, reporter, LOAD_AVERAGE_COMMAND)
        .await
        .map_err(|e| ProvisionError::connection(&address, e))?;

    let load = parse_load(&result.stdout).ok_or_else(|| ProvisionError::Parse {
        address: address.clone(),
        raw: result.stdout.trim().to_string(),
    })?;

    reporter.report(RunEvent::LoadObserved { address, load });
    Ok(load)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Credentials;
    use crate::port::remote_executor::mocks::{ScriptedExecutor, ScriptedHost};
    use crate::port::reporter::mocks::RecordingReporter;
    use crate::port::RemoteExecutor;

    #[test]
    fn test_parse_load() {
        assert_eq!(parse_load("0.52 0.58 0.59 1/389 12345\n"), Some(0.52));
        assert_eq!(parse_load("  3\n"), Some(3.0));
        assert_eq!(parse_load(""), None);
        assert_eq!(parse_load("cat: /proc/loadavg: No such file"), None);
        assert_eq!(parse_load("-1.0 0 0"), None);
        assert_eq!(parse_load("NaN 0 0"), None);
        assert_eq!(parse_load("inf"), None);
    }

    #[tokio::test]
    async fn test_probe_reports_load() {
        let executor = ScriptedExecutor::new().with_host("h1", ScriptedHost::with_load(1.25));
        let reporter = RecordingReporter::new();
        let mut conn = executor
            .open("h1", &Credentials::new("root", "/k"))
            .await
            .unwrap();

        let load = probe(conn.as_mut(), &reporter).await.unwrap();
        conn.close().await;

        assert_eq!(load, 1.25);
        assert!(reporter.events().contains(&RunEvent::LoadObserved {
            address: "h1".to_string(),
            load: 1.25
        }));
    }

    #[tokio::test]
    async fn test_probe_parse_error_carries_raw_output() {
        let executor = ScriptedExecutor::new().with_host(
            "h1",
            ScriptedHost::new().respond("/proc/loadavg", "garbage\n"),
        );
        let reporter = RecordingReporter::new();
        let mut conn = executor
            .open("h1", &Credentials::new("root", "/k"))
            .await
            .unwrap();

        let err = probe(conn.as_mut(), &reporter).await.unwrap_err();
        conn.close().await;

        match err {
            ProvisionError::Parse { address, raw } => {
                assert_eq!(address, "h1");
                assert_eq!(raw, "garbage");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
