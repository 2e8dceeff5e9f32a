//! Registry configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::types::Address;

/// Parameters the registries are deployed with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Oracle liveness window for every assertion (seconds)
    pub liveness_secs: u64,
    /// Bond posted with unseal assertions
    #[serde(with = "crate::types::decimal")]
    pub unseal_bond: u128,
    /// Bond posted with slash assertions
    #[serde(with = "crate::types::decimal")]
    pub slash_bond: u128,
    /// Receives executed slashes; `None` burns them
    pub slash_beneficiary: Option<Address>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            liveness_secs: 7200, // 2 hours
            unseal_bond: 0,
            slash_bond: 0,
            slash_beneficiary: None,
        }
    }
}

impl RegistryConfig {
    pub fn liveness(&self) -> Duration {
        Duration::seconds(self.liveness_secs as i64)
    }

    pub fn with_liveness_secs(mut self, secs: u64) -> Self {
        self.liveness_secs = secs;
        self
    }

    pub fn with_slash_beneficiary(mut self, beneficiary: Address) -> Self {
        self.slash_beneficiary = Some(beneficiary);
        self
    }
}
