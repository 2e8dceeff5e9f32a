//! Assertion oracle collaborator
//!
//! The registries only need two things from the oracle: submit a bonded
//! claim and look one up. Resolution comes back later as a [`Delivery`]
//! that the ledger routes to the registry named as callback recipient.
//!
//! [`InMemoryOracle`] follows optimistic-oracle semantics: an undisputed
//! assertion settles true once its liveness window passes; a disputed one
//! waits for an explicit [`InMemoryOracle::settle`].

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{RegistryError, Result};
use crate::types::{Address, AssertionId};

/// Which registry receives an assertion's callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackRecipient {
    CryptRegistry,
    WardenRegistry,
}

/// A bonded claim submitted for adjudication.
#[derive(Debug, Clone)]
pub struct AssertionRequest {
    pub claim: Vec<u8>,
    pub asserter: Address,
    pub bond: u128,
    pub liveness: Duration,
    pub recipient: CallbackRecipient,
}

/// Oracle-side assertion record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    pub id: AssertionId,
    #[serde(with = "crate::types::hex_bytes")]
    pub claim: Vec<u8>,
    pub asserter: Address,
    #[serde(with = "crate::types::decimal")]
    pub bond: u128,
    pub assertion_time: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
    pub callback_recipient: CallbackRecipient,
    #[serde(default)]
    pub disputer: Option<Address>,
    #[serde(default)]
    pub settled: bool,
    #[serde(default)]
    pub settlement_resolution: bool,
}

/// A callback the oracle wants delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub assertion_id: AssertionId,
    pub recipient: CallbackRecipient,
    pub outcome: DeliveryOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Resolved { truthful: bool },
    Disputed,
}

/// What the registries require of an oracle.
pub trait AssertionOracle: Send {
    /// Identity the oracle uses when invoking registry callbacks.
    fn address(&self) -> &Address;

    fn assert_truth(&mut self, request: AssertionRequest) -> Result<AssertionId>;

    fn get_assertion(&self, id: &AssertionId) -> Option<&Assertion>;
}

// ============================================================================
// In-memory optimistic oracle
// ============================================================================

#[derive(Debug)]
pub struct InMemoryOracle {
    address: Address,
    assertions: HashMap<AssertionId, Assertion>,
    nonce: u64,
}

impl InMemoryOracle {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            assertions: HashMap::new(),
            nonce: 0,
        }
    }

    fn derive_id(&self, request: &AssertionRequest) -> AssertionId {
        let mut hasher = Sha256::new();
        hasher.update(&request.claim);
        hasher.update(request.asserter.as_str().as_bytes());
        hasher.update(self.nonce.to_be_bytes());
        AssertionId(hasher.finalize().into())
    }

    fn open_assertion(&mut self, id: &AssertionId) -> Result<&mut Assertion> {
        let assertion = self
            .assertions
            .get_mut(id)
            .ok_or(RegistryError::UnknownAssertion(*id))?;
        if assertion.settled {
            return Err(RegistryError::AssertionSettled(*id));
        }
        Ok(assertion)
    }

    /// Dispute an open assertion. It will no longer settle on expiry.
    pub fn dispute(&mut self, id: &AssertionId, disputer: Address) -> Result<Delivery> {
        let assertion = self.open_assertion(id)?;
        if assertion.disputer.is_some() {
            return Err(RegistryError::InvalidInput(format!(
                "assertion {id} is already disputed"
            )));
        }
        info!(assertion_id = %id, disputer = %disputer, "Assertion disputed");
        assertion.disputer = Some(disputer);
        Ok(Delivery {
            assertion_id: *id,
            recipient: assertion.callback_recipient,
            outcome: DeliveryOutcome::Disputed,
        })
    }

    /// Settle an assertion with an adjudicated resolution.
    pub fn settle(&mut self, id: &AssertionId, truthful: bool) -> Result<Delivery> {
        let assertion = self.open_assertion(id)?;
        assertion.settled = true;
        assertion.settlement_resolution = truthful;
        info!(assertion_id = %id, truthful, "Assertion settled");
        Ok(Delivery {
            assertion_id: *id,
            recipient: assertion.callback_recipient,
            outcome: DeliveryOutcome::Resolved { truthful },
        })
    }

    /// Settle every undisputed assertion whose liveness has passed as true.
    pub fn settle_expired(&mut self, now: DateTime<Utc>) -> Vec<Delivery> {
        let mut expired: Vec<AssertionId> = self
            .assertions
            .values()
            .filter(|a| !a.settled && a.disputer.is_none() && a.expiration_time <= now)
            .map(|a| a.id)
            .collect();
        expired.sort();

        expired
            .iter()
            .filter_map(|id| self.settle(id, true).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }
}

impl AssertionOracle for InMemoryOracle {
    fn address(&self) -> &Address {
        &self.address
    }

    fn assert_truth(&mut self, request: AssertionRequest) -> Result<AssertionId> {
        if request.claim.is_empty() {
            return Err(RegistryError::InvalidInput("empty claim".into()));
        }

        let id = self.derive_id(&request);
        self.nonce += 1;

        let now = Utc::now();
        let assertion = Assertion {
            id,
            claim: request.claim,
            asserter: request.asserter,
            bond: request.bond,
            assertion_time: now,
            expiration_time: now + request.liveness,
            callback_recipient: request.recipient,
            disputer: None,
            settled: false,
            settlement_resolution: false,
        };

        debug!(
            assertion_id = %id,
            recipient = ?assertion.callback_recipient,
            expires = %assertion.expiration_time,
            "Assertion opened"
        );
        self.assertions.insert(id, assertion);
        Ok(id)
    }

    fn get_assertion(&self, id: &AssertionId) -> Option<&Assertion> {
        self.assertions.get(id)
    }
}
