// OS Detector - classifies the OS family of a host

use super::command::run_reported;
use super::constants::OS_RELEASE_COMMAND;
use crate::domain::OsFamily;
use crate::error::{ProvisionError, Result};
use crate::port::{Connection, RunEvent, RunReporter};

/// Read the release file and classify it
///
/// Unsupported identifiers are returned as `OsFamily::Unsupported`; turning
/// that into a run failure is the planner's job.
pub async fn detect(conn: &mut dyn Connection, reporter: &dyn RunReporter) -> Result<OsFamily> {
    let address = conn.address().to_string();
    let result = run_reported(conn, reporter, OS_RELEASE_COMMAND)
        .await
        .map_err(|e| ProvisionError::connection(&address, e))?;

    let family = OsFamily::classify(&result.stdout);
    reporter.report(RunEvent::OsDetected {
        address,
        family: family.clone(),
    });
    Ok(family)
}
