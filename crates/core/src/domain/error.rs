// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid run state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid load value: {0}")]
    InvalidLoad(f64),
}

pub type Result<T> = std::result::Result<T, DomainError>;
