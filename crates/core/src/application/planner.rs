// Provisioning Planner - OsFamily to command plan

use crate::domain::{OsFamily, PlanSettings, ProvisioningPlan};
use crate::error::{ProvisionError, Result};

/// Builds plans from fixed settings
#[derive(Debug, Clone, Default)]
pub struct Planner {
    settings: PlanSettings,
}

impl Planner {
    pub fn new(settings: PlanSettings) -> Self {
        Self { settings }
    }

    /// Plan for a supported family
    ///
    /// # Errors
    /// - ProvisionError::UnsupportedOs for `OsFamily::Unsupported`
    pub fn plan_for(&self, address: &str, family: &OsFamily) -> Result<ProvisioningPlan> {
        match family {
            OsFamily::DebianLike => Ok(ProvisioningPlan::debian_like(&self.settings)),
            OsFamily::RhelLike => Ok(ProvisioningPlan::rhel_like(&self.settings)),
            OsFamily::Unsupported(id) => Err(ProvisionError::UnsupportedOs {
                address: address.to_string(),
                id: id.clone(),
            }),
        }
    }
}
