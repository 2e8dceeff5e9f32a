//! In-memory secret store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{SecretStoreClient, SecretValue, StoreId};
use crate::error::{ClientError, Result};

#[derive(Debug)]
struct StoredSecrets {
    values: HashMap<String, String>,
    authorized: HashSet<String>,
}

/// Secret store kept in process memory. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct InMemorySecretStore {
    stores: Arc<DashMap<StoreId, StoredSecrets>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

#[async_trait]
impl SecretStoreClient for InMemorySecretStore {
    async fn store(
        &self,
        values: Vec<SecretValue>,
        authorized_keys: Vec<String>,
    ) -> Result<StoreId> {
        if values.is_empty() {
            return Err(ClientError::DataIntegrity("no secret values to store".into()));
        }
        if authorized_keys.iter().all(|k| k.trim().is_empty()) {
            return Err(ClientError::DataIntegrity("no authorized keys".into()));
        }

        let mut stored = HashMap::with_capacity(values.len());
        for SecretValue { name, value } in values {
            if stored.insert(name.clone(), value).is_some() {
                return Err(ClientError::DataIntegrity(format!(
                    "duplicate secret name: {name}"
                )));
            }
        }

        let store_id = StoreId::generate();
        self.stores.insert(
            store_id.clone(),
            StoredSecrets {
                values: stored,
                authorized: authorized_keys.into_iter().collect(),
            },
        );
        debug!(store_id = %store_id, "Secrets stored");
        Ok(store_id)
    }

    async fn retrieve(&self, store_id: &StoreId, name: &str, requester_key: &str) -> Result<String> {
        let not_found = || ClientError::SecretNotFound {
            store_id: store_id.clone(),
            name: name.to_string(),
        };

        let entry = self.stores.get(store_id).ok_or_else(not_found)?;
        if !entry.authorized.contains(requester_key) {
            return Err(ClientError::SecretUnauthorized(store_id.clone()));
        }
        entry.values.get(name).cloned().ok_or_else(not_found)
    }
}
