//! Error types for the crypt and warden registries

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, AssertionId, CryptId, CryptStatus};

/// Coarse classification shared by every error type in the workspace.
///
/// Drives retry policy: only `ExternalService` is ever retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller lacks the required role
    Authorization,
    /// Operation invalid for the current lifecycle state
    State,
    /// Collaborator unreachable or timed out
    ExternalService,
    /// Payload failed validation
    DataIntegrity,
}

/// Role a caller must hold for a guarded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Warden,
    Oracle,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Owner => "owner",
            Role::Warden => "warden",
            Role::Oracle => "oracle",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error", content = "detail", rename_all = "snake_case")]
pub enum RegistryError {
    #[error("Crypt not found: {0}")]
    CryptNotFound(CryptId),

    #[error("Warden not registered: {0}")]
    WardenNotFound(Address),

    #[error("Unauthorized: {caller} is not the {role}")]
    Unauthorized { caller: Address, role: Role },

    #[error("Crypt {0} already has a pending unseal assertion")]
    AlreadyPending(CryptId),

    #[error("Crypt {0} is already finalized")]
    AlreadyFinalized(CryptId),

    #[error("Crypt {0} is not finalized")]
    NotFinalized(CryptId),

    #[error("Crypt {0} already has a revealed key")]
    AlreadyRevealed(CryptId),

    #[error("Crypt {crypt_id} is {status}, operation requires sealed")]
    WrongState { crypt_id: CryptId, status: CryptStatus },

    #[error("Insufficient stake: requested {requested}, available {available}")]
    InsufficientStake { requested: u128, available: u128 },

    #[error("Warden {0} has a pending slash assertion")]
    SlashPending(Address),

    #[error("Warden {0} is already slashed")]
    AlreadySlashed(Address),

    #[error("Warden {0} is not slashed")]
    WardenNotSlashed(Address),

    #[error("Warden {0} cannot request its own slash")]
    SelfSlash(Address),

    #[error("Unknown assertion: {0}")]
    UnknownAssertion(AssertionId),

    #[error("Assertion {0} is already settled")]
    AssertionSettled(AssertionId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Oracle error: {0}")]
    Oracle(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Unauthorized { .. } | RegistryError::SelfSlash(_) => {
                ErrorKind::Authorization
            }
            RegistryError::Oracle(_) => ErrorKind::ExternalService,
            _ => ErrorKind::State,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::ExternalService
    }

    /// True when a reveal lost a race that someone else already won.
    pub fn is_already_revealed(&self) -> bool {
        matches!(self, RegistryError::AlreadyRevealed(_))
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
