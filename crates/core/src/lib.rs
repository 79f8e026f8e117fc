// pgpilot Core - Domain Logic & Ports
// NO transport dependencies: remote shells plug in through port::RemoteExecutor

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{ProvisionError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
