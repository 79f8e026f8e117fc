// Load Sampling Domain Model

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};

/// One successful probe: the 1-minute load average of a host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSample {
    pub address: String,
    /// Position of the host in the candidate list (tie-break key)
    pub index: usize,
    pub load: f64,
}

impl LoadSample {
    /// Create a sample, rejecting negative or non-finite loads
    pub fn new(address: impl Into<String>, index: usize, load: f64) -> Result<Self> {
        if !load.is_finite() || load < 0.0 {
            return Err(DomainError::InvalidLoad(load));
        }
        Ok(Self {
            address: address.into(),
            index,
            load,
        })
    }
}

/// What happened to one candidate during probing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Sampled { load: f64 },
    Failed { reason: String },
}

/// Per-candidate probe results plus the winner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionReport {
    /// (address, outcome) in input order
    pub outcomes: Vec<(String, ProbeOutcome)>,
    pub winner: LoadSample,
}

impl SelectionReport {
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ProbeOutcome::Failed { .. }))
            .count()
    }
}

/// Pick the sample with the lowest load
///
/// Samples are compared in input order and only a strictly lower load
/// replaces the current best, so equal minima resolve to the earliest host.
pub fn least_loaded(samples: &[LoadSample]) -> Option<&LoadSample> {
    let mut ordered: Vec<&LoadSample> = samples.iter().collect();
    ordered.sort_by_key(|s| s.index);

    ordered.into_iter().fold(None, |best, sample| match best {
        Some(b) if b.load <= sample.load => Some(b),
        _ => Some(sample),
    })
}
