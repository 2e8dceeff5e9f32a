//! crypt-warden: the warden's key custody worker
//!
//! A warden agrees to hold the decryption key of a crypt until the
//! crypt's trigger is confirmed by the oracle. This crate is the process
//! that keeps that promise: it watches the ledger for crypts it guards
//! that have been finalized, pulls each key from the secret store and
//! publishes it with `setDecryptionKey`.
//!
//! Failures are isolated per crypt and retried on the next poll; a run of
//! mostly failing cycles backs the poll interval off exponentially.

pub mod config;
pub mod error;
pub mod worker;

pub use config::{Args, FileConfig, Settings};
pub use error::{Result, WorkerError};
pub use worker::{CycleReport, KeyCustodyWorker, RevealOutcome, WorkerConfig};
