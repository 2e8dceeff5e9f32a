//! Crypt Core - ledger model for sealed crypts and staked wardens
//!
//! A crypt seals a decryption key behind a trigger condition. Anyone can
//! claim the trigger happened; an optimistic oracle adjudicates the claim;
//! once it resolves true the crypt's warden reveals the key.
//!
//! ```text
//! ┌────────────────────────────── Ledger ──────────────────────────────┐
//! │                                                                    │
//! │  ┌───────────────┐   assert_truth    ┌────────────────┐            │
//! │  │ CryptRegistry │ ─────────────────▶│ AssertionOracle│            │
//! │  │  (crypts)     │ ◀──── Delivery ───│                │            │
//! │  └───────────────┘                   └────────────────┘            │
//! │  ┌───────────────┐   assert_truth           ▲                      │
//! │  │WardenRegistry │ ─────────────────────────┘                      │
//! │  │ (stakes,slash)│ ◀──── Delivery                                  │
//! │  └───────────────┘                                                 │
//! │                                                                    │
//! │  EventLog: CryptCreated, DecryptInitiated, DecryptFinalized, ...   │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation validates before it writes, so an error leaves the ledger
//! untouched. Statuses are derived from record fields and checked against the
//! transition tables in [`lifecycle`].

pub mod config;
pub mod crypt_registry;
pub mod error;
pub mod events;
pub mod ledger;
pub mod lifecycle;
pub mod oracle;
pub mod types;
pub mod warden_registry;

pub use config::RegistryConfig;
pub use crypt_registry::CryptRegistry;
pub use error::{ErrorKind, RegistryError, Result, Role};
pub use events::{EventLog, EventRecord, LedgerEvent, Notification};
pub use ledger::Ledger;
pub use oracle::{
    Assertion, AssertionOracle, AssertionRequest, CallbackRecipient, Delivery, DeliveryOutcome,
    InMemoryOracle,
};
pub use types::{
    Address, AssertionId, Crypt, CryptId, CryptStatus, CryptView, NewCrypt, TokenId, Warden,
    WardenStatus,
};
pub use warden_registry::WardenRegistry;
