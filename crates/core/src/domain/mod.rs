// Domain Layer - Pure provisioning model

pub mod error;
pub mod host;
pub mod load;
pub mod os;
pub mod plan;
pub mod run;

// Re-exports
pub use error::DomainError;
pub use host::{ConnectionState, Credentials, Host};
pub use load::{LoadSample, ProbeOutcome, SelectionReport};
pub use os::OsFamily;
pub use plan::{AccessRule, PlanSettings, ProvisioningPlan};
pub use run::{CommandWarning, PhaseRecord, ProvisionReport, RunState};
