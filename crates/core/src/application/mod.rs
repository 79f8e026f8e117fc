// Application Layer - Use Cases and Orchestration

pub mod command;
pub mod config;
pub mod constants;
pub mod orchestrator;
pub mod os_detect;
pub mod planner;
pub mod probe;
pub mod selector;

// Re-exports
pub use config::{RunConfig, StderrPolicy};
pub use orchestrator::Orchestrator;
pub use planner::Planner;
pub use selector::Selector;
