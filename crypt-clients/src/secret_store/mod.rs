//! Secret store clients
//!
//! The store holds named secret values grouped under a store id. Reads
//! are restricted to the user keys authorized when the values were stored;
//! the store enforces this, not the client.

mod http;
mod memory;

pub use http::{HttpSecretStore, SecretStoreConfig};
pub use memory::InMemorySecretStore;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Prefix of the secret name a crypt's decryption key is stored under.
pub const SECRET_NAME_PREFIX: &str = "crypt_key_";

/// Name of the secret holding the decryption key for `data_pointer`.
///
/// Derived only from public crypt fields so the warden can find the key
/// without any side channel.
pub fn secret_name(data_pointer: &str) -> String {
    format!("{SECRET_NAME_PREFIX}{data_pointer}")
}

/// Identifier of a group of stored secrets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
    /// Fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoreId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StoreId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A named secret value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretValue {
    pub name: String,
    pub value: String,
}

impl SecretValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
pub trait SecretStoreClient: Send + Sync {
    /// Store `values` readable by `authorized_keys`; returns the new store id.
    async fn store(&self, values: Vec<SecretValue>, authorized_keys: Vec<String>)
        -> Result<StoreId>;

    /// Read one secret as `requester_key`.
    async fn retrieve(&self, store_id: &StoreId, name: &str, requester_key: &str)
        -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_name_from_data_pointer() {
        assert_eq!(
            secret_name("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"),
            "crypt_key_bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"
        );
    }

    #[test]
    fn test_generated_store_ids_differ() {
        assert_ne!(StoreId::generate(), StoreId::generate());
        assert_eq!(StoreId::from("abc").to_string(), "abc");
    }
}
