//! Warden registry - registration, staking and slash disputes
//!
//! Stake positions are keyed by `(warden, staker, token)`; aggregates are
//! summed on read. A slash request opens an oracle assertion and parks the
//! warden in slash-pending until the oracle calls back.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result, Role};
use crate::events::{EventLog, LedgerEvent};
use crate::lifecycle::{warden_transition, Rejection, WardenEvent};
use crate::oracle::{AssertionOracle, AssertionRequest, CallbackRecipient};
use crate::types::{Address, AssertionId, TokenId, Warden, WardenStatus};

type StakeKey = (Address, Address, TokenId);

fn rejection_error(warden: &Address, rejection: Rejection) -> RegistryError {
    match rejection {
        Rejection::NotRegistered => RegistryError::WardenNotFound(warden.clone()),
        Rejection::SlashPending => RegistryError::SlashPending(warden.clone()),
        Rejection::AlreadySlashed => RegistryError::AlreadySlashed(warden.clone()),
        _ => RegistryError::WardenNotSlashed(warden.clone()),
    }
}

/// Claim submitted to the oracle when a slash is requested.
pub fn slash_claim(warden: &Address) -> Vec<u8> {
    format!("Warden {warden} failed its custody duty and should be slashed").into_bytes()
}

#[derive(Debug)]
pub struct WardenRegistry {
    oracle: Address,
    wardens: BTreeMap<Address, Warden>,
    stakes: BTreeMap<StakeKey, u128>,
    by_assertion: HashMap<AssertionId, Address>,
    disputed: HashSet<AssertionId>,
    /// Executed slashes credited to a beneficiary, per (beneficiary, token)
    credited: HashMap<(Address, TokenId), u128>,
    /// Executed slashes with no beneficiary, per token
    burned: HashMap<TokenId, u128>,
}

impl WardenRegistry {
    pub fn new(oracle: Address) -> Self {
        Self {
            oracle,
            wardens: BTreeMap::new(),
            stakes: BTreeMap::new(),
            by_assertion: HashMap::new(),
            disputed: HashSet::new(),
            credited: HashMap::new(),
            burned: HashMap::new(),
        }
    }

    pub fn status(&self, warden: &Address) -> WardenStatus {
        self.wardens
            .get(warden)
            .map(Warden::status)
            .unwrap_or(WardenStatus::Unregistered)
    }

    fn check(&self, warden: &Address, event: WardenEvent) -> Result<WardenStatus> {
        warden_transition(self.status(warden), event).map_err(|r| rejection_error(warden, r))
    }

    fn require_oracle(&self, caller: &Address) -> Result<()> {
        if caller != &self.oracle {
            return Err(RegistryError::Unauthorized {
                caller: caller.clone(),
                role: Role::Oracle,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Registration & staking
    // ========================================================================

    /// Register `identity` as a warden, or update its metadata.
    pub fn register(
        &mut self,
        identity: &Address,
        info_pointer: String,
        secret_store_user_key: String,
        events: &mut EventLog,
    ) -> Result<()> {
        if identity.is_empty() {
            return Err(RegistryError::InvalidInput("empty warden identity".into()));
        }
        if secret_store_user_key.trim().is_empty() {
            return Err(RegistryError::InvalidInput("empty secret store user key".into()));
        }
        self.check(identity, WardenEvent::Register)?;

        let warden = self
            .wardens
            .entry(identity.clone())
            .or_insert_with(|| Warden {
                identity: identity.clone(),
                info_pointer: String::new(),
                secret_store_user_key: String::new(),
                pending_slash_assertion_id: None,
                slashed: false,
            });
        warden.info_pointer = info_pointer.clone();
        warden.secret_store_user_key = secret_store_user_key.clone();

        events.emit(
            LedgerEvent::WardenRegistered {
                warden: identity.clone(),
                info_pointer,
                secret_store_user_key,
            },
            None,
        );
        info!(warden = %identity, "Warden registered");
        Ok(())
    }

    pub fn stake(
        &mut self,
        warden: &Address,
        staker: &Address,
        token: &TokenId,
        amount: u128,
        events: &mut EventLog,
    ) -> Result<()> {
        if amount == 0 {
            return Err(RegistryError::InvalidInput("stake amount must be positive".into()));
        }
        self.check(warden, WardenEvent::Stake)?;
        // Positions never exceed the aggregate, so one check covers both.
        if self.total_stake(warden, token).checked_add(amount).is_none() {
            return Err(RegistryError::InvalidInput("stake overflow".into()));
        }

        let key = (warden.clone(), staker.clone(), token.clone());
        *self.stakes.entry(key).or_insert(0) += amount;

        events.emit(
            LedgerEvent::StakePlaced {
                warden: warden.clone(),
                staker: staker.clone(),
                token: token.clone(),
                amount,
            },
            None,
        );
        debug!(warden = %warden, staker = %staker, token = %token, amount, "Stake placed");
        Ok(())
    }

    pub fn withdraw(
        &mut self,
        warden: &Address,
        staker: &Address,
        token: &TokenId,
        amount: u128,
        events: &mut EventLog,
    ) -> Result<()> {
        if amount == 0 {
            return Err(RegistryError::InvalidInput("withdraw amount must be positive".into()));
        }
        self.check(warden, WardenEvent::Withdraw)?;

        let key = (warden.clone(), staker.clone(), token.clone());
        let available = self.stakes.get(&key).copied().unwrap_or(0);
        if amount > available {
            return Err(RegistryError::InsufficientStake {
                requested: amount,
                available,
            });
        }
        if amount == available {
            self.stakes.remove(&key);
        } else {
            self.stakes.insert(key, available - amount);
        }

        events.emit(
            LedgerEvent::StakeWithdrawn {
                warden: warden.clone(),
                staker: staker.clone(),
                token: token.clone(),
                amount,
            },
            None,
        );
        debug!(warden = %warden, staker = %staker, token = %token, amount, "Stake withdrawn");
        Ok(())
    }

    // ========================================================================
    // Slashing
    // ========================================================================

    /// Assert that `warden` misbehaved. Anyone but the warden may call.
    pub fn request_slash(
        &mut self,
        caller: &Address,
        warden: &Address,
        oracle: &mut dyn AssertionOracle,
        config: &RegistryConfig,
        events: &mut EventLog,
    ) -> Result<AssertionId> {
        if !self.wardens.contains_key(warden) {
            return Err(RegistryError::WardenNotFound(warden.clone()));
        }
        if caller == warden {
            return Err(RegistryError::SelfSlash(warden.clone()));
        }
        self.check(warden, WardenEvent::RequestSlash)?;

        let assertion_id = oracle.assert_truth(AssertionRequest {
            claim: slash_claim(warden),
            asserter: caller.clone(),
            bond: config.slash_bond,
            liveness: config.liveness(),
            recipient: CallbackRecipient::WardenRegistry,
        })?;

        let record = self
            .wardens
            .get_mut(warden)
            .ok_or_else(|| RegistryError::WardenNotFound(warden.clone()))?;
        record.pending_slash_assertion_id = Some(assertion_id);
        self.by_assertion.insert(assertion_id, warden.clone());

        events.emit(
            LedgerEvent::WardenSlashed {
                warden: warden.clone(),
                assertion_id,
                caller: caller.clone(),
            },
            None,
        );
        info!(warden = %warden, assertion_id = %assertion_id, caller = %caller, "Slash requested");
        Ok(assertion_id)
    }

    /// Oracle callback for a slash assertion.
    pub fn on_assertion_resolved(
        &mut self,
        caller: &Address,
        assertion_id: AssertionId,
        truthful: bool,
        events: &mut EventLog,
    ) -> Result<()> {
        self.require_oracle(caller)?;

        let Some(warden) = self.by_assertion.get(&assertion_id).cloned() else {
            debug!(assertion_id = %assertion_id, "Resolution for cleared slash assertion ignored");
            return Ok(());
        };
        let event = if truthful {
            WardenEvent::SlashConfirmed
        } else {
            WardenEvent::SlashRejected
        };
        let next = self.check(&warden, event)?;

        if let Some(record) = self.wardens.get_mut(&warden) {
            record.pending_slash_assertion_id = None;
            record.slashed = next == WardenStatus::Slashed;
        }
        self.by_assertion.remove(&assertion_id);
        self.disputed.remove(&assertion_id);

        events.emit(
            LedgerEvent::AssertionResolved {
                assertion_id,
                asserted_truthfully: truthful,
                caller: caller.clone(),
            },
            None,
        );
        if truthful {
            info!(warden = %warden, "Warden slashed");
        } else {
            info!(warden = %warden, "Slash rejected, warden back to staked");
        }
        Ok(())
    }

    pub fn on_assertion_disputed(
        &mut self,
        caller: &Address,
        assertion_id: AssertionId,
        events: &mut EventLog,
    ) -> Result<()> {
        self.require_oracle(caller)?;
        if !self.by_assertion.contains_key(&assertion_id) {
            return Ok(());
        }
        self.disputed.insert(assertion_id);
        events.emit(
            LedgerEvent::AssertionDisputed {
                assertion_id,
                caller: caller.clone(),
            },
            None,
        );
        info!(assertion_id = %assertion_id, "Slash assertion disputed");
        Ok(())
    }

    /// Seize a slashed warden's collateral in `token`.
    ///
    /// The aggregate goes to `config.slash_beneficiary`, or is burned when
    /// none is set. Returns the amount moved; a repeat call moves 0.
    pub fn execute_slash(
        &mut self,
        caller: &Address,
        warden: &Address,
        token: &TokenId,
        config: &RegistryConfig,
        events: &mut EventLog,
    ) -> Result<u128> {
        self.check(warden, WardenEvent::ExecuteSlash)?;

        let seized: Vec<StakeKey> = self
            .stakes
            .keys()
            .filter(|(w, _, t)| w == warden && t == token)
            .cloned()
            .collect();
        let mut amount: u128 = 0;
        for key in seized {
            if let Some(position) = self.stakes.remove(&key) {
                amount = amount.saturating_add(position);
            }
        }

        match &config.slash_beneficiary {
            Some(beneficiary) => {
                let credited = self
                    .credited
                    .entry((beneficiary.clone(), token.clone()))
                    .or_insert(0);
                *credited = credited.saturating_add(amount);
            }
            None => {
                let burned = self.burned.entry(token.clone()).or_insert(0);
                *burned = burned.saturating_add(amount);
            }
        }

        events.emit(
            LedgerEvent::SlashExecuted {
                warden: warden.clone(),
                token: token.clone(),
                amount,
                beneficiary: config.slash_beneficiary.clone(),
                caller: caller.clone(),
            },
            None,
        );
        info!(warden = %warden, token = %token, amount, "Slash executed");
        Ok(amount)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get_warden(&self, warden: &Address) -> Result<&Warden> {
        self.wardens
            .get(warden)
            .ok_or_else(|| RegistryError::WardenNotFound(warden.clone()))
    }

    pub fn list_wardens(&self) -> impl Iterator<Item = &Warden> {
        self.wardens.values()
    }

    pub fn stake_of(&self, warden: &Address, staker: &Address, token: &TokenId) -> u128 {
        self.stakes
            .get(&(warden.clone(), staker.clone(), token.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_stake(&self, warden: &Address, token: &TokenId) -> u128 {
        self.stakes
            .iter()
            .filter(|((w, _, t), _)| w == warden && t == token)
            .fold(0u128, |total, (_, amount)| total.saturating_add(*amount))
    }

    pub fn warden_for_assertion(&self, assertion_id: &AssertionId) -> Option<&Address> {
        self.by_assertion.get(assertion_id)
    }

    pub fn is_disputed(&self, assertion_id: &AssertionId) -> bool {
        self.disputed.contains(assertion_id)
    }

    /// Slashed collateral credited to `beneficiary` in `token`.
    pub fn credited(&self, beneficiary: &Address, token: &TokenId) -> u128 {
        self.credited
            .get(&(beneficiary.clone(), token.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn burned(&self, token: &TokenId) -> u128 {
        self.burned.get(token).copied().unwrap_or(0)
    }
}
