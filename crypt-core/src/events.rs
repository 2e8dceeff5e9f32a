//! Ledger events
//!
//! Every successful mutation appends one or more events. Off-chain indexers
//! (including the custody worker) only ever need what is in these payloads.
//! Events touching a crypt with a `callback_target` are also queued as
//! notifications for that recipient.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Address, AssertionId, CryptId, TokenId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum LedgerEvent {
    #[serde(rename_all = "camelCase")]
    CryptCreated {
        crypt_id: CryptId,
        data_pointer: String,
        #[serde(with = "crate::types::hex_bytes")]
        trigger_spec: Vec<u8>,
        secret_store_ref: String,
        warden: Address,
        callback_target: Option<Address>,
        owner: Address,
    },
    #[serde(rename_all = "camelCase")]
    DecryptInitiated {
        crypt_id: CryptId,
        assertion_id: AssertionId,
        caller: Address,
    },
    #[serde(rename_all = "camelCase")]
    DecryptFinalized { crypt_id: CryptId },
    #[serde(rename_all = "camelCase")]
    DecryptionKeySet {
        crypt_id: CryptId,
        decryption_key: String,
    },
    #[serde(rename_all = "camelCase")]
    CryptDeleted { crypt_id: CryptId },
    #[serde(rename_all = "camelCase")]
    AssertionResolved {
        assertion_id: AssertionId,
        asserted_truthfully: bool,
        caller: Address,
    },
    #[serde(rename_all = "camelCase")]
    AssertionDisputed {
        assertion_id: AssertionId,
        caller: Address,
    },
    #[serde(rename_all = "camelCase")]
    WardenRegistered {
        warden: Address,
        info_pointer: String,
        secret_store_user_key: String,
    },
    #[serde(rename_all = "camelCase")]
    StakePlaced {
        warden: Address,
        staker: Address,
        token: TokenId,
        #[serde(with = "crate::types::decimal")]
        amount: u128,
    },
    #[serde(rename_all = "camelCase")]
    StakeWithdrawn {
        warden: Address,
        staker: Address,
        token: TokenId,
        #[serde(with = "crate::types::decimal")]
        amount: u128,
    },
    #[serde(rename_all = "camelCase")]
    WardenSlashed {
        warden: Address,
        assertion_id: AssertionId,
        caller: Address,
    },
    #[serde(rename_all = "camelCase")]
    SlashExecuted {
        warden: Address,
        token: TokenId,
        #[serde(with = "crate::types::decimal")]
        amount: u128,
        beneficiary: Option<Address>,
        caller: Address,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::CryptCreated { .. } => "CryptCreated",
            LedgerEvent::DecryptInitiated { .. } => "DecryptInitiated",
            LedgerEvent::DecryptFinalized { .. } => "DecryptFinalized",
            LedgerEvent::DecryptionKeySet { .. } => "DecryptionKeySet",
            LedgerEvent::CryptDeleted { .. } => "CryptDeleted",
            LedgerEvent::AssertionResolved { .. } => "AssertionResolved",
            LedgerEvent::AssertionDisputed { .. } => "AssertionDisputed",
            LedgerEvent::WardenRegistered { .. } => "WardenRegistered",
            LedgerEvent::StakePlaced { .. } => "StakePlaced",
            LedgerEvent::StakeWithdrawn { .. } => "StakeWithdrawn",
            LedgerEvent::WardenSlashed { .. } => "WardenSlashed",
            LedgerEvent::SlashExecuted { .. } => "SlashExecuted",
        }
    }

    /// Crypt this event concerns, if any.
    pub fn crypt_id(&self) -> Option<CryptId> {
        match self {
            LedgerEvent::CryptCreated { crypt_id, .. }
            | LedgerEvent::DecryptInitiated { crypt_id, .. }
            | LedgerEvent::DecryptFinalized { crypt_id }
            | LedgerEvent::DecryptionKeySet { crypt_id, .. }
            | LedgerEvent::CryptDeleted { crypt_id } => Some(*crypt_id),
            _ => None,
        }
    }
}

/// An event with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub event: LedgerEvent,
}

/// A lifecycle event addressed to a crypt's callback target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub recipient: Address,
    pub seq: u64,
    pub event: LedgerEvent,
}

/// Append-only event log plus the callback outbox.
#[derive(Debug, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
    outbox: Vec<Notification>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, queueing a notification when `notify` is set.
    pub fn emit(&mut self, event: LedgerEvent, notify: Option<&Address>) -> u64 {
        let seq = self.records.len() as u64;
        if let Some(recipient) = notify {
            self.outbox.push(Notification {
                recipient: recipient.clone(),
                seq,
                event: event.clone(),
            });
        }
        tracing::debug!(seq, event = event.name(), "Ledger event emitted");
        self.records.push(EventRecord {
            seq,
            timestamp: Utc::now(),
            event,
        });
        seq
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Events with `seq >= from`.
    pub fn since(&self, from: u64) -> &[EventRecord] {
        let start = (from as usize).min(self.records.len());
        &self.records[start..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.outbox
    }

    /// Hand queued notifications to a deliverer.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }
}
