//! Owner-side sealing flow
//!
//! ```text
//! getWardenInfo(warden) ──▶ store {crypt_key_<data_pointer>: key}
//!                              authorized to [warden key, owner key]
//!                       ──▶ createCrypt(..., secretStoreRef = store id)
//! ```
//!
//! Encrypting the payload and pinning it are done by the caller beforehand;
//! the sealer only needs the resulting data pointer and key.

use std::sync::Arc;

use crypt_core::{Address, CryptId, NewCrypt, RegistryError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ClientError, Result};
use crate::ledger::LedgerClient;
use crate::secret_store::{secret_name, SecretStoreClient, SecretValue, StoreId};

/// Everything needed to seal one crypt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealRequest {
    /// Blob-store reference of the already encrypted payload
    pub data_pointer: String,
    pub trigger_spec: Vec<u8>,
    /// Decryption key, as it should be revealed
    pub decryption_key: String,
    pub warden: Address,
    #[serde(default)]
    pub callback_target: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedCrypt {
    pub crypt_id: CryptId,
    pub store_id: StoreId,
    pub secret_name: String,
}

pub struct CryptSealer {
    ledger: Arc<dyn LedgerClient>,
    secrets: Arc<dyn SecretStoreClient>,
    /// Owner's own secret-store key, authorized alongside the warden's
    owner_key: Option<String>,
}

impl CryptSealer {
    pub fn new(ledger: Arc<dyn LedgerClient>, secrets: Arc<dyn SecretStoreClient>) -> Self {
        Self {
            ledger,
            secrets,
            owner_key: None,
        }
    }

    /// Also authorize the owner to read the key back.
    pub fn with_owner_key(mut self, key: impl Into<String>) -> Self {
        self.owner_key = Some(key.into());
        self
    }

    pub async fn seal(&self, request: SealRequest) -> Result<SealedCrypt> {
        if request.decryption_key.is_empty() {
            return Err(ClientError::DataIntegrity("empty decryption key".into()));
        }

        // The ledger accepts unregistered wardens; the sealer does not, since
        // nobody could ever be authorized to read the key.
        let warden = match self.ledger.get_warden_info(&request.warden).await {
            Ok(w) => w,
            Err(ClientError::Registry(RegistryError::WardenNotFound(addr))) => {
                return Err(ClientError::DataIntegrity(format!(
                    "warden {addr} is not registered"
                )))
            }
            Err(e) => return Err(e),
        };

        let name = secret_name(&request.data_pointer);
        let mut authorized = vec![warden.secret_store_user_key];
        authorized.extend(self.owner_key.iter().cloned());

        let store_id = self
            .secrets
            .store(
                vec![SecretValue::new(name.clone(), request.decryption_key)],
                authorized,
            )
            .await?;

        let crypt_id = self
            .ledger
            .create_crypt(NewCrypt {
                data_pointer: request.data_pointer,
                trigger_spec: request.trigger_spec,
                secret_store_ref: store_id.to_string(),
                warden: request.warden,
                callback_target: request.callback_target,
            })
            .await?;

        info!(crypt_id = %crypt_id, store_id = %store_id, "Crypt sealed");
        Ok(SealedCrypt {
            crypt_id,
            store_id,
            secret_name: name,
        })
    }
}
