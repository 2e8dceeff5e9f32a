//! Crypt registry - lifecycle of sealed crypts
//!
//! Crypts live in an arena keyed by [`CryptId`] with a secondary index from
//! pending [`AssertionId`] to crypt. Oracle callbacks are looked up through
//! that index, so a resolution for an id that was already cleared finds
//! nothing and is ignored.
//!
//! Every operation validates completely before touching state: an error
//! always leaves the registry exactly as it was.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result, Role};
use crate::events::{EventLog, LedgerEvent};
use crate::lifecycle::{crypt_transition, CryptEvent, Rejection};
use crate::oracle::{AssertionOracle, AssertionRequest, CallbackRecipient};
use crate::types::{Address, AssertionId, Crypt, CryptId, CryptStatus, NewCrypt};

/// Map a table rejection onto the error callers see.
fn rejection_error(crypt: &Crypt, rejection: Rejection) -> RegistryError {
    match rejection {
        Rejection::AlreadyPending => RegistryError::AlreadyPending(crypt.id),
        Rejection::AlreadyFinalized => RegistryError::AlreadyFinalized(crypt.id),
        Rejection::NotFinalized => RegistryError::NotFinalized(crypt.id),
        _ => RegistryError::WrongState {
            crypt_id: crypt.id,
            status: crypt.status(),
        },
    }
}

#[derive(Debug)]
pub struct CryptRegistry {
    /// Only this identity may deliver assertion callbacks
    oracle: Address,
    crypts: BTreeMap<CryptId, Crypt>,
    by_assertion: HashMap<AssertionId, CryptId>,
    disputed: HashSet<AssertionId>,
    next_id: u64,
}

impl CryptRegistry {
    pub fn new(oracle: Address) -> Self {
        Self {
            oracle,
            crypts: BTreeMap::new(),
            by_assertion: HashMap::new(),
            disputed: HashSet::new(),
            next_id: 0,
        }
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
    // Mutations
    // ========================================================================

    /// Store a new sealed crypt.
    ///
    /// The warden is not checked against the warden registry.
    pub fn create(
        &mut self,
        owner: &Address,
        new: NewCrypt,
        events: &mut EventLog,
    ) -> Result<CryptId> {
        if new.data_pointer.trim().is_empty() {
            return Err(RegistryError::InvalidInput("empty data pointer".into()));
        }
        if new.trigger_spec.is_empty() {
            return Err(RegistryError::InvalidInput("empty trigger spec".into()));
        }
        if new.secret_store_ref.trim().is_empty() {
            return Err(RegistryError::InvalidInput("empty secret store ref".into()));
        }
        if new.warden.is_empty() || owner.is_empty() {
            return Err(RegistryError::InvalidInput("empty owner or warden".into()));
        }

        let id = CryptId(self.next_id);
        self.next_id += 1;

        let crypt = Crypt {
            id,
            data_pointer: new.data_pointer,
            trigger_spec: new.trigger_spec,
            secret_store_ref: new.secret_store_ref,
            decryption_key: String::new(),
            owner: owner.clone(),
            warden: new.warden,
            callback_target: new.callback_target,
            assertion_id: None,
            finalized: false,
        };

        events.emit(
            LedgerEvent::CryptCreated {
                crypt_id: id,
                data_pointer: crypt.data_pointer.clone(),
                trigger_spec: crypt.trigger_spec.clone(),
                secret_store_ref: crypt.secret_store_ref.clone(),
                warden: crypt.warden.clone(),
                callback_target: crypt.callback_target.clone(),
                owner: crypt.owner.clone(),
            },
            crypt.callback_target.as_ref(),
        );
        info!(crypt_id = %id, owner = %crypt.owner, warden = %crypt.warden, "Crypt created");

        self.crypts.insert(id, crypt);
        Ok(id)
    }

    /// Ask the oracle to adjudicate the crypt's trigger. Anyone may call.
    pub fn initiate_unseal(
        &mut self,
        caller: &Address,
        crypt_id: CryptId,
        oracle: &mut dyn AssertionOracle,
        config: &RegistryConfig,
        events: &mut EventLog,
    ) -> Result<AssertionId> {
        let crypt = self.get(crypt_id)?;
        crypt_transition(crypt.status(), CryptEvent::InitiateUnseal)
            .map_err(|r| rejection_error(crypt, r))?;

        let assertion_id = oracle.assert_truth(AssertionRequest {
            claim: crypt.trigger_spec.clone(),
            asserter: caller.clone(),
            bond: config.unseal_bond,
            liveness: config.liveness(),
            recipient: CallbackRecipient::CryptRegistry,
        })?;

        let crypt = self
            .crypts
            .get_mut(&crypt_id)
            .ok_or(RegistryError::CryptNotFound(crypt_id))?;
        crypt.assertion_id = Some(assertion_id);
        let notify = crypt.callback_target.clone();
        self.by_assertion.insert(assertion_id, crypt_id);

        events.emit(
            LedgerEvent::DecryptInitiated {
                crypt_id,
                assertion_id,
                caller: caller.clone(),
            },
            notify.as_ref(),
        );
        info!(crypt_id = %crypt_id, assertion_id = %assertion_id, "Unseal initiated");

        Ok(assertion_id)
    }

    /// Oracle callback: the crypt's trigger assertion settled.
    pub fn on_assertion_resolved(
        &mut self,
        caller: &Address,
        assertion_id: AssertionId,
        truthful: bool,
        events: &mut EventLog,
    ) -> Result<()> {
        self.require_oracle(caller)?;

        let Some(crypt_id) = self.by_assertion.get(&assertion_id).copied() else {
            debug!(assertion_id = %assertion_id, "Resolution for cleared assertion ignored");
            return Ok(());
        };
        let Some(crypt) = self.crypts.get_mut(&crypt_id) else {
            warn!(crypt_id = %crypt_id, "Assertion index points at a missing crypt");
            self.by_assertion.remove(&assertion_id);
            return Ok(());
        };

        let event = if truthful {
            CryptEvent::AssertionTruthful
        } else {
            CryptEvent::AssertionFalse
        };
        let next = crypt_transition(crypt.status(), event).map_err(|r| rejection_error(crypt, r))?;

        crypt.assertion_id = None;
        crypt.finalized = next == CryptStatus::Unsealed;
        let notify = crypt.callback_target.clone();
        self.by_assertion.remove(&assertion_id);
        self.disputed.remove(&assertion_id);

        events.emit(
            LedgerEvent::AssertionResolved {
                assertion_id,
                asserted_truthfully: truthful,
                caller: caller.clone(),
            },
            notify.as_ref(),
        );
        if truthful {
            events.emit(LedgerEvent::DecryptFinalized { crypt_id }, notify.as_ref());
            info!(crypt_id = %crypt_id, "Crypt finalized");
        } else {
            info!(crypt_id = %crypt_id, "Unseal assertion rejected, crypt resealed");
        }

        Ok(())
    }

    /// Oracle callback: someone disputed the crypt's trigger assertion.
    pub fn on_assertion_disputed(
        &mut self,
        caller: &Address,
        assertion_id: AssertionId,
        events: &mut EventLog,
    ) -> Result<()> {
        self.require_oracle(caller)?;

        let Some(crypt_id) = self.by_assertion.get(&assertion_id).copied() else {
            return Ok(());
        };
        let notify = self
            .crypts
            .get(&crypt_id)
            .and_then(|c| c.callback_target.clone());

        self.disputed.insert(assertion_id);
        events.emit(
            LedgerEvent::AssertionDisputed {
                assertion_id,
                caller: caller.clone(),
            },
            notify.as_ref(),
        );
        info!(crypt_id = %crypt_id, assertion_id = %assertion_id, "Unseal assertion disputed");
        Ok(())
    }

    /// Publish the decryption key. Warden only, once, after finalization.
    pub fn reveal(
        &mut self,
        caller: &Address,
        crypt_id: CryptId,
        key: String,
        events: &mut EventLog,
    ) -> Result<()> {
        let crypt = self.get(crypt_id)?;
        if caller != &crypt.warden {
            return Err(RegistryError::Unauthorized {
                caller: caller.clone(),
                role: Role::Warden,
            });
        }
        crypt_transition(crypt.status(), CryptEvent::RevealKey)
            .map_err(|r| rejection_error(crypt, r))?;
        if crypt.is_revealed() {
            return Err(RegistryError::AlreadyRevealed(crypt_id));
        }
        if key.is_empty() {
            return Err(RegistryError::InvalidInput("empty decryption key".into()));
        }

        let crypt = self
            .crypts
            .get_mut(&crypt_id)
            .ok_or(RegistryError::CryptNotFound(crypt_id))?;
        crypt.decryption_key = key.clone();
        let notify = crypt.callback_target.clone();

        events.emit(
            LedgerEvent::DecryptionKeySet {
                crypt_id,
                decryption_key: key,
            },
            notify.as_ref(),
        );
        info!(crypt_id = %crypt_id, "Decryption key revealed");
        Ok(())
    }

    /// Remove a sealed crypt. Owner only.
    pub fn delete(
        &mut self,
        caller: &Address,
        crypt_id: CryptId,
        events: &mut EventLog,
    ) -> Result<()> {
        let crypt = self.get(crypt_id)?;
        if caller != &crypt.owner {
            return Err(RegistryError::Unauthorized {
                caller: caller.clone(),
                role: Role::Owner,
            });
        }
        crypt_transition(crypt.status(), CryptEvent::Delete)
            .map_err(|r| rejection_error(crypt, r))?;

        let removed = self.crypts.remove(&crypt_id);
        let notify = removed.and_then(|c| c.callback_target);
        events.emit(LedgerEvent::CryptDeleted { crypt_id }, notify.as_ref());
        info!(crypt_id = %crypt_id, "Crypt deleted");
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get(&self, crypt_id: CryptId) -> Result<&Crypt> {
        self.crypts
            .get(&crypt_id)
            .ok_or(RegistryError::CryptNotFound(crypt_id))
    }

    /// All crypts in id order.
    pub fn list(&self) -> impl Iterator<Item = &Crypt> {
        self.crypts.values()
    }

    pub fn by_warden<'a>(&'a self, warden: &'a Address) -> impl Iterator<Item = &'a Crypt> {
        self.crypts.values().filter(move |c| &c.warden == warden)
    }

    pub fn crypt_for_assertion(&self, assertion_id: &AssertionId) -> Option<CryptId> {
        self.by_assertion.get(assertion_id).copied()
    }

    pub fn is_disputed(&self, assertion_id: &AssertionId) -> bool {
        self.disputed.contains(assertion_id)
    }

    pub fn len(&self) -> usize {
        self.crypts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crypts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::InMemoryOracle;

    struct Fixture {
        registry: CryptRegistry,
        oracle: InMemoryOracle,
        config: RegistryConfig,
        events: EventLog,
    }

    fn owner() -> Address {
        Address::new("0xowner")
    }

    fn warden() -> Address {
        Address::new("0xwarden")
    }

    fn oracle_addr() -> Address {
        Address::new("0xoracle")
    }

    fn fixture() -> Fixture {
        Fixture {
            registry: CryptRegistry::new(oracle_addr()),
            oracle: InMemoryOracle::new(oracle_addr()),
            config: RegistryConfig::default(),
            events: EventLog::new(),
        }
    }

    fn new_crypt() -> NewCrypt {
        NewCrypt {
            data_pointer: "bafymeta".into(),
            trigger_spec: b"the owner has not checked in".to_vec(),
            secret_store_ref: "store-1".into(),
            warden: warden(),
            callback_target: None,
        }
    }

    impl Fixture {
        fn create(&mut self) -> CryptId {
            self.registry
                .create(&owner(), new_crypt(), &mut self.events)
                .unwrap()
        }

        fn initiate(&mut self, id: CryptId) -> Result<AssertionId> {
            self.registry.initiate_unseal(
                &Address::new("0xanyone"),
                id,
                &mut self.oracle,
                &self.config,
                &mut self.events,
            )
        }

        fn resolve(&mut self, assertion: AssertionId, truthful: bool) -> Result<()> {
            self.registry
                .on_assertion_resolved(&oracle_addr(), assertion, truthful, &mut self.events)
        }
    }

    #[test]
    fn test_create_assigns_monotonic_ids() {
        let mut f = fixture();
        assert_eq!(f.create(), CryptId(0));
        assert_eq!(f.create(), CryptId(1));
        assert_eq!(f.registry.len(), 2);
        assert!(matches!(
            f.events.records()[0].event,
            LedgerEvent::CryptCreated { crypt_id: CryptId(0), .. }
        ));
    }

    #[test]
    fn test_create_rejects_empty_references() {
        let mut f = fixture();
        let mut bad = new_crypt();
        bad.data_pointer = " ".into();
        assert!(f.registry.create(&owner(), bad, &mut f.events).is_err());

        let mut bad = new_crypt();
        bad.trigger_spec.clear();
        assert!(f.registry.create(&owner(), bad, &mut f.events).is_err());

        assert!(f.registry.is_empty());
        assert!(f.events.is_empty());
    }

    #[test]
    fn test_initiate_records_assertion() {
        let mut f = fixture();
        let id = f.create();
        let assertion = f.initiate(id).unwrap();

        let crypt = f.registry.get(id).unwrap();
        assert_eq!(crypt.assertion_id, Some(assertion));
        assert_eq!(crypt.status(), CryptStatus::UnsealInitiated);
        assert_eq!(f.registry.crypt_for_assertion(&assertion), Some(id));
        assert_eq!(
            f.oracle.get_assertion(&assertion).unwrap().claim,
            new_crypt().trigger_spec
        );
    }

    #[test]
    fn test_initiate_twice_fails_without_mutation() {
        let mut f = fixture();
        let id = f.create();
        let first = f.initiate(id).unwrap();
        let before = f.registry.get(id).unwrap().clone();

        assert_eq!(f.initiate(id), Err(RegistryError::AlreadyPending(id)));
        assert_eq!(f.registry.get(id).unwrap(), &before);
        assert_eq!(f.registry.get(id).unwrap().assertion_id, Some(first));
        assert_eq!(f.oracle.len(), 1);
    }

    #[test]
    fn test_initiate_unknown_crypt() {
        let mut f = fixture();
        assert_eq!(
            f.initiate(CryptId(42)),
            Err(RegistryError::CryptNotFound(CryptId(42)))
        );
    }

    #[test]
    fn test_truthful_resolution_finalizes() {
        let mut f = fixture();
        let id = f.create();
        let assertion = f.initiate(id).unwrap();
        f.resolve(assertion, true).unwrap();

        let crypt = f.registry.get(id).unwrap();
        assert!(crypt.finalized);
        assert!(crypt.assertion_id.is_none());
        assert_eq!(f.registry.crypt_for_assertion(&assertion), None);
        assert_eq!(f.initiate(id), Err(RegistryError::AlreadyFinalized(id)));
    }

    #[test]
    fn test_false_resolution_reseals() {
        let mut f = fixture();
        let id = f.create();
        let assertion = f.initiate(id).unwrap();
        f.resolve(assertion, false).unwrap();

        let crypt = f.registry.get(id).unwrap();
        assert_eq!(crypt.status(), CryptStatus::Sealed);
        assert!(crypt.assertion_id.is_none());
        assert!(f.initiate(id).is_ok());
    }

    #[test]
    fn test_duplicate_resolution_is_noop() {
        let mut f = fixture();
        let id = f.create();
        let assertion = f.initiate(id).unwrap();
        f.resolve(assertion, true).unwrap();
        let events_after_first = f.events.len();

        // A late false delivery for the same id must not reseal.
        f.resolve(assertion, false).unwrap();
        assert!(f.registry.get(id).unwrap().finalized);
        assert_eq!(f.events.len(), events_after_first);
    }

    #[test]
    fn test_resolution_requires_oracle() {
        let mut f = fixture();
        let id = f.create();
        let assertion = f.initiate(id).unwrap();

        let err = f
            .registry
            .on_assertion_resolved(&owner(), assertion, true, &mut f.events)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized { role: Role::Oracle, .. }));
        assert!(!f.registry.get(id).unwrap().finalized);
    }

    #[test]
    fn test_dispute_is_bookkeeping_only() {
        let mut f = fixture();
        let id = f.create();
        let assertion = f.initiate(id).unwrap();
        f.registry
            .on_assertion_disputed(&oracle_addr(), assertion, &mut f.events)
            .unwrap();

        assert!(f.registry.is_disputed(&assertion));
        assert_eq!(f.registry.get(id).unwrap().status(), CryptStatus::UnsealInitiated);

        f.resolve(assertion, false).unwrap();
        assert!(!f.registry.is_disputed(&assertion));
    }

    #[test]
    fn test_reveal_guards() {
        let mut f = fixture();
        let id = f.create();

        assert_eq!(
            f.registry.reveal(&warden(), id, "k".into(), &mut f.events),
            Err(RegistryError::NotFinalized(id))
        );

        let assertion = f.initiate(id).unwrap();
        f.resolve(assertion, true).unwrap();

        let err = f
            .registry
            .reveal(&owner(), id, "k".into(), &mut f.events)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Authorization);

        assert!(f
            .registry
            .reveal(&warden(), id, String::new(), &mut f.events)
            .is_err());

        f.registry
            .reveal(&warden(), id, "k".into(), &mut f.events)
            .unwrap();
        assert_eq!(
            f.registry.reveal(&warden(), id, "k2".into(), &mut f.events),
            Err(RegistryError::AlreadyRevealed(id))
        );
        assert_eq!(f.registry.get(id).unwrap().decryption_key, "k");
    }

    #[test]
    fn test_delete_guards() {
        let mut f = fixture();
        let id = f.create();

        assert!(matches!(
            f.registry.delete(&warden(), id, &mut f.events),
            Err(RegistryError::Unauthorized { role: Role::Owner, .. })
        ));

        let assertion = f.initiate(id).unwrap();
        assert!(matches!(
            f.registry.delete(&owner(), id, &mut f.events),
            Err(RegistryError::WrongState { status: CryptStatus::UnsealInitiated, .. })
        ));
        assert!(f.registry.get(id).is_ok());

        f.resolve(assertion, false).unwrap();
        f.registry.delete(&owner(), id, &mut f.events).unwrap();
        assert_eq!(f.registry.get(id), Err(RegistryError::CryptNotFound(id)));
    }

    #[test]
    fn test_callback_target_receives_lifecycle() {
        let mut f = fixture();
        let target = Address::new("0xhook");
        let mut input = new_crypt();
        input.callback_target = Some(target.clone());
        let id = f.registry.create(&owner(), input, &mut f.events).unwrap();
        let assertion = f.initiate(id).unwrap();
        f.resolve(assertion, true).unwrap();

        let names: Vec<&str> = f
            .events
            .notifications()
            .iter()
            .map(|n| n.event.name())
            .collect();
        assert_eq!(
            names,
            ["CryptCreated", "DecryptInitiated", "AssertionResolved", "DecryptFinalized"]
        );
        assert!(f.events.notifications().iter().all(|n| n.recipient == target));
    }
}
