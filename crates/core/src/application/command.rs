// Reported command execution shared by every component that talks to a host

use crate::port::{CommandResult, Connection, ConnectionError, RunEvent, RunReporter};

/// Execute `command`, reporting it and surfacing any stderr
///
/// Stderr never turns into an error here; callers decide.
pub async fn run_reported(
    conn: &mut dyn Connection,
    reporter: &dyn RunReporter,
    command: &str,
) -> Result<CommandResult, ConnectionError> {
    reporter.report(RunEvent::CommandStarted {
        address: conn.address().to_string(),
        command: command.to_string(),
    });

    let result = conn.execute(command).await?;

    if result.has_stderr() {
        reporter.report(RunEvent::CommandStderr {
            address: conn.address().to_string(),
            command: command.to_string(),
            stderr: result.stderr.clone(),
        });
    }
    Ok(result)
}
