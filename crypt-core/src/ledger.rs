//! Ledger store object
//!
//! Owns both registries, the oracle and the event log. Every mutation takes
//! the calling identity explicitly; nothing is global. Oracle callbacks are
//! routed by the [`Delivery`] the oracle produced.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::RegistryConfig;
use crate::crypt_registry::CryptRegistry;
use crate::error::Result;
use crate::events::{EventLog, EventRecord, Notification};
use crate::oracle::{AssertionOracle, CallbackRecipient, Delivery, DeliveryOutcome, InMemoryOracle};
use crate::types::{Address, AssertionId, Crypt, CryptId, CryptView, NewCrypt, TokenId, Warden};
use crate::warden_registry::WardenRegistry;

pub struct Ledger<O = InMemoryOracle> {
    config: RegistryConfig,
    crypts: CryptRegistry,
    wardens: WardenRegistry,
    oracle: O,
    events: EventLog,
}

impl<O: AssertionOracle> Ledger<O> {
    pub fn new(oracle: O, config: RegistryConfig) -> Self {
        let trusted = oracle.address().clone();
        Self {
            config,
            crypts: CryptRegistry::new(trusted.clone()),
            wardens: WardenRegistry::new(trusted),
            oracle,
            events: EventLog::new(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_address(&self) -> &Address {
        self.oracle.address()
    }

    pub fn crypt_registry(&self) -> &CryptRegistry {
        &self.crypts
    }

    pub fn warden_registry(&self) -> &WardenRegistry {
        &self.wardens
    }

    // ========================================================================
    // Crypt operations
    // ========================================================================

    pub fn create_crypt(&mut self, caller: &Address, new: NewCrypt) -> Result<CryptId> {
        self.crypts.create(caller, new, &mut self.events)
    }

    pub fn initiate_decrypt(&mut self, caller: &Address, crypt_id: CryptId) -> Result<AssertionId> {
        self.crypts.initiate_unseal(
            caller,
            crypt_id,
            &mut self.oracle,
            &self.config,
            &mut self.events,
        )
    }

    pub fn set_decryption_key(
        &mut self,
        caller: &Address,
        crypt_id: CryptId,
        key: impl Into<String>,
    ) -> Result<()> {
        self.crypts
            .reveal(caller, crypt_id, key.into(), &mut self.events)
    }

    pub fn delete_crypt(&mut self, caller: &Address, crypt_id: CryptId) -> Result<()> {
        self.crypts.delete(caller, crypt_id, &mut self.events)
    }

    pub fn get_crypt(&self, crypt_id: CryptId) -> Result<&Crypt> {
        self.crypts.get(crypt_id)
    }

    /// Crypt plus derived status and the pending assertion's expiry.
    pub fn crypt_view(&self, crypt_id: CryptId) -> Result<CryptView> {
        let crypt = self.crypts.get(crypt_id)?;
        let assertion_expiration = crypt
            .assertion_id
            .as_ref()
            .and_then(|id| self.oracle.get_assertion(id))
            .map(|a| a.expiration_time);
        Ok(CryptView {
            crypt: crypt.clone(),
            status: crypt.status(),
            assertion_expiration,
        })
    }

    pub fn crypts(&self) -> impl Iterator<Item = &Crypt> {
        self.crypts.list()
    }

    pub fn crypts_by_warden<'a>(&'a self, warden: &'a Address) -> impl Iterator<Item = &'a Crypt> {
        self.crypts.by_warden(warden)
    }

    pub fn assertion_to_crypt(&self, assertion_id: &AssertionId) -> Option<CryptId> {
        self.crypts.crypt_for_assertion(assertion_id)
    }

    // ========================================================================
    // Warden operations
    // ========================================================================

    pub fn register_warden(
        &mut self,
        caller: &Address,
        info_pointer: impl Into<String>,
        secret_store_user_key: impl Into<String>,
    ) -> Result<()> {
        self.wardens.register(
            caller,
            info_pointer.into(),
            secret_store_user_key.into(),
            &mut self.events,
        )
    }

    pub fn stake_on_warden(
        &mut self,
        caller: &Address,
        warden: &Address,
        token: &TokenId,
        amount: u128,
    ) -> Result<()> {
        self.wardens
            .stake(warden, caller, token, amount, &mut self.events)
    }

    pub fn withdraw_stake(
        &mut self,
        caller: &Address,
        warden: &Address,
        token: &TokenId,
        amount: u128,
    ) -> Result<()> {
        self.wardens
            .withdraw(warden, caller, token, amount, &mut self.events)
    }

    pub fn slash_warden(&mut self, caller: &Address, warden: &Address) -> Result<AssertionId> {
        self.wardens.request_slash(
            caller,
            warden,
            &mut self.oracle,
            &self.config,
            &mut self.events,
        )
    }

    pub fn execute_slash(
        &mut self,
        caller: &Address,
        warden: &Address,
        token: &TokenId,
    ) -> Result<u128> {
        self.wardens
            .execute_slash(caller, warden, token, &self.config, &mut self.events)
    }

    pub fn get_warden(&self, warden: &Address) -> Result<&Warden> {
        self.wardens.get_warden(warden)
    }

    pub fn wardens(&self) -> impl Iterator<Item = &Warden> {
        self.wardens.list_wardens()
    }

    pub fn stake_of(&self, warden: &Address, staker: &Address, token: &TokenId) -> u128 {
        self.wardens.stake_of(warden, staker, token)
    }

    pub fn total_stake(&self, warden: &Address, token: &TokenId) -> u128 {
        self.wardens.total_stake(warden, token)
    }

    pub fn assertion_to_warden(&self, assertion_id: &AssertionId) -> Option<&Address> {
        self.wardens.warden_for_assertion(assertion_id)
    }

    // ========================================================================
    // Oracle callbacks
    // ========================================================================

    /// Deliver an oracle callback to the registry it names.
    pub fn deliver_callback(&mut self, caller: &Address, delivery: &Delivery) -> Result<()> {
        debug!(
            assertion_id = %delivery.assertion_id,
            recipient = ?delivery.recipient,
            outcome = ?delivery.outcome,
            "Delivering oracle callback"
        );
        match (delivery.recipient, delivery.outcome) {
            (CallbackRecipient::CryptRegistry, DeliveryOutcome::Resolved { truthful }) => self
                .crypts
                .on_assertion_resolved(caller, delivery.assertion_id, truthful, &mut self.events),
            (CallbackRecipient::CryptRegistry, DeliveryOutcome::Disputed) => self
                .crypts
                .on_assertion_disputed(caller, delivery.assertion_id, &mut self.events),
            (CallbackRecipient::WardenRegistry, DeliveryOutcome::Resolved { truthful }) => self
                .wardens
                .on_assertion_resolved(caller, delivery.assertion_id, truthful, &mut self.events),
            (CallbackRecipient::WardenRegistry, DeliveryOutcome::Disputed) => self
                .wardens
                .on_assertion_disputed(caller, delivery.assertion_id, &mut self.events),
        }
    }

    // ========================================================================
    // Event log
    // ========================================================================

    pub fn events(&self) -> &[EventRecord] {
        self.events.records()
    }

    pub fn events_since(&self, from: u64) -> &[EventRecord] {
        self.events.since(from)
    }

    pub fn notifications(&self) -> &[Notification] {
        self.events.notifications()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.events.drain_notifications()
    }
}

impl Ledger<InMemoryOracle> {
    /// Ledger backed by an in-memory optimistic oracle at `oracle`.
    pub fn in_memory(oracle: Address, config: RegistryConfig) -> Self {
        Self::new(InMemoryOracle::new(oracle), config)
    }

    /// Settle an assertion and deliver the result.
    pub fn resolve(&mut self, assertion_id: &AssertionId, truthful: bool) -> Result<()> {
        let delivery = self.oracle.settle(assertion_id, truthful)?;
        let caller = self.oracle.address().clone();
        self.deliver_callback(&caller, &delivery)
    }

    /// Dispute an assertion and notify its registry.
    pub fn dispute(&mut self, assertion_id: &AssertionId, disputer: Address) -> Result<()> {
        let delivery = self.oracle.dispute(assertion_id, disputer)?;
        let caller = self.oracle.address().clone();
        self.deliver_callback(&caller, &delivery)
    }

    /// Settle every undisputed assertion past its liveness window.
    ///
    /// Returns the number of callbacks delivered.
    pub fn settle_expired(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let deliveries = self.oracle.settle_expired(now);
        let caller = self.oracle.address().clone();
        for delivery in &deliveries {
            self.deliver_callback(&caller, delivery)?;
        }
        Ok(deliveries.len())
    }
}

impl<O> std::fmt::Debug for Ledger<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("crypts", &self.crypts.len())
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}
