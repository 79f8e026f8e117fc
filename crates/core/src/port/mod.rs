// Port Layer - Interfaces for external dependencies

pub mod remote_executor;
pub mod reporter;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use remote_executor::{CommandResult, Connection, ConnectionError, RemoteExecutor};
pub use reporter::{RunEvent, RunReporter, TracingReporter};
pub use time_provider::TimeProvider;
