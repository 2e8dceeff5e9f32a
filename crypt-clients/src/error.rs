//! Error types for collaborator clients

use crypt_core::{ErrorKind, RegistryError};
use thiserror::Error;

use crate::secret_store::StoreId;

/// Client error
#[derive(Debug, Error)]
pub enum ClientError {
    /// The ledger rejected the operation
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// JSON-RPC error object that does not carry a registry error
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// No secret with that name in the store
    #[error("Secret not found: {name} in store {store_id}")]
    SecretNotFound { store_id: StoreId, name: String },

    /// Requester key is not authorized for the store
    #[error("Not authorized to read store {0}")]
    SecretUnauthorized(StoreId),

    /// Payload failed validation
    #[error("Data integrity: {0}")]
    DataIntegrity(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Registry(e) => e.kind(),
            ClientError::Http(_) | ClientError::Rpc { .. } => ErrorKind::ExternalService,
            ClientError::Server { status, .. } => match status {
                401 | 403 => ErrorKind::Authorization,
                500..=599 | 408 | 429 => ErrorKind::ExternalService,
                _ => ErrorKind::State,
            },
            ClientError::SecretNotFound { .. } => ErrorKind::State,
            ClientError::SecretUnauthorized(_) => ErrorKind::Authorization,
            ClientError::Json(_) | ClientError::DataIntegrity(_) => ErrorKind::DataIntegrity,
        }
    }

    /// Worth retrying on a later attempt.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::ExternalService
    }

    pub fn is_already_revealed(&self) -> bool {
        matches!(self, ClientError::Registry(e) if e.is_already_revealed())
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
