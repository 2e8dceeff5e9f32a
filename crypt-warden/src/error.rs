//! Error types for the custody worker

use std::time::Duration;

use crypt_clients::ClientError;
use crypt_core::{CryptId, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Settings missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// A collaborator call failed
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A collaborator call exceeded the per-call timeout
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The secret store handed back something that cannot be a key
    #[error("Crypt {crypt_id}: {reason}")]
    DataIntegrity { crypt_id: CryptId, reason: String },
}

impl WorkerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::Config(_) | WorkerError::DataIntegrity { .. } => ErrorKind::DataIntegrity,
            WorkerError::Client(e) => e.kind(),
            WorkerError::Timeout { .. } => ErrorKind::ExternalService,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::ExternalService
    }

    pub fn is_already_revealed(&self) -> bool {
        matches!(self, WorkerError::Client(e) if e.is_already_revealed())
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
