//! Transition tables for crypt and warden lifecycles.
//!
//! Registries never flip status fields directly. Each operation names the
//! event it represents and asks the table for the next state; anything not
//! listed is rejected with a reason the registry turns into an error.
//!
//! ```text
//! Crypt:   sealed ──initiate──▶ unseal-initiated ──resolved(true)──▶ unsealed
//!            ▲                        │
//!            └────resolved(false)─────┘
//!          sealed ──delete──▶ deleted
//!
//! Warden:  unregistered ──register──▶ staked ──request slash──▶ slash-pending
//!                                       ▲                          │
//!                                       └──────resolved(false)─────┤
//!                                                                  ▼
//!                                                     slashed ◀─resolved(true)
//! ```

use crate::types::{CryptStatus, WardenStatus};

/// Why a transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadyPending,
    AlreadyFinalized,
    NotFinalized,
    NotSealed,
    NotPending,
    NotRegistered,
    SlashPending,
    AlreadySlashed,
    NotSlashed,
}

// ============================================================================
// Crypt
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptEvent {
    InitiateUnseal,
    AssertionTruthful,
    AssertionFalse,
    RevealKey,
    Delete,
}

/// Next crypt status for `(status, event)`.
pub fn crypt_transition(
    status: CryptStatus,
    event: CryptEvent,
) -> Result<CryptStatus, Rejection> {
    use CryptEvent::*;
    use CryptStatus::*;

    match (status, event) {
        (Sealed, InitiateUnseal) => Ok(UnsealInitiated),
        (UnsealInitiated, InitiateUnseal) => Err(Rejection::AlreadyPending),
        (Unsealed, InitiateUnseal) => Err(Rejection::AlreadyFinalized),

        (UnsealInitiated, AssertionTruthful) => Ok(Unsealed),
        (UnsealInitiated, AssertionFalse) => Ok(Sealed),
        (_, AssertionTruthful | AssertionFalse) => Err(Rejection::NotPending),

        (Unsealed, RevealKey) => Ok(Unsealed),
        (_, RevealKey) => Err(Rejection::NotFinalized),

        (Sealed, Delete) => Ok(Deleted),
        (_, Delete) => Err(Rejection::NotSealed),

        (Deleted, _) => Err(Rejection::NotSealed),
    }
}

// ============================================================================
// Warden
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WardenEvent {
    Register,
    Stake,
    Withdraw,
    RequestSlash,
    SlashConfirmed,
    SlashRejected,
    ExecuteSlash,
}

/// Next warden status for `(status, event)`.
pub fn warden_transition(
    status: WardenStatus,
    event: WardenEvent,
) -> Result<WardenStatus, Rejection> {
    use WardenEvent::*;
    use WardenStatus::*;

    match (status, event) {
        // Re-registration only rewrites metadata.
        (Unregistered, Register) => Ok(Staked),
        (s, Register) => Ok(s),

        (Unregistered, _) => Err(Rejection::NotRegistered),

        (Staked, Stake | Withdraw) => Ok(Staked),
        (SlashPending, Stake | Withdraw | RequestSlash) => Err(Rejection::SlashPending),
        (Slashed, Stake | Withdraw | RequestSlash) => Err(Rejection::AlreadySlashed),

        (Staked, RequestSlash) => Ok(SlashPending),

        (SlashPending, SlashConfirmed) => Ok(Slashed),
        (SlashPending, SlashRejected) => Ok(Staked),
        (_, SlashConfirmed | SlashRejected) => Err(Rejection::NotPending),

        (Slashed, ExecuteSlash) => Ok(Slashed),
        (_, ExecuteSlash) => Err(Rejection::NotSlashed),
    }
}
