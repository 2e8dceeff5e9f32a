//! In-process ledger client.

use std::sync::Arc;

use async_trait::async_trait;
use crypt_core::{Address, AssertionId, Crypt, CryptId, Ledger, NewCrypt, TokenId, Warden};
use tokio::sync::Mutex;

use super::LedgerClient;
use crate::error::Result;

/// A ledger shared between clients. One lock serializes every operation.
pub type SharedLedger = Arc<Mutex<Ledger>>;

/// [`LedgerClient`] over a [`SharedLedger`], signing as one identity.
#[derive(Clone)]
pub struct LocalLedger {
    ledger: SharedLedger,
    identity: Address,
}

impl LocalLedger {
    pub fn new(ledger: SharedLedger, identity: Address) -> Self {
        Self { ledger, identity }
    }

    /// Wrap a ledger for sharing.
    pub fn share(ledger: Ledger) -> SharedLedger {
        Arc::new(Mutex::new(ledger))
    }

    /// Another client on the same ledger signing as `identity`.
    pub fn signer(&self, identity: Address) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            identity,
        }
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }
}

#[async_trait]
impl LedgerClient for LocalLedger {
    fn identity(&self) -> &Address {
        &self.identity
    }

    async fn create_crypt(&self, new: NewCrypt) -> Result<CryptId> {
        Ok(self.ledger.lock().await.create_crypt(&self.identity, new)?)
    }

    async fn initiate_decrypt(&self, crypt_id: CryptId) -> Result<AssertionId> {
        Ok(self
            .ledger
            .lock()
            .await
            .initiate_decrypt(&self.identity, crypt_id)?)
    }

    async fn set_decryption_key(&self, crypt_id: CryptId, key: &str) -> Result<()> {
        Ok(self
            .ledger
            .lock()
            .await
            .set_decryption_key(&self.identity, crypt_id, key)?)
    }

    async fn delete_crypt(&self, crypt_id: CryptId) -> Result<()> {
        Ok(self.ledger.lock().await.delete_crypt(&self.identity, crypt_id)?)
    }

    async fn get_crypt(&self, crypt_id: CryptId) -> Result<Crypt> {
        Ok(self.ledger.lock().await.get_crypt(crypt_id)?.clone())
    }

    async fn get_crypts(&self) -> Result<Vec<Crypt>> {
        Ok(self.ledger.lock().await.crypts().cloned().collect())
    }

    async fn crypts_for_warden(&self, warden: &Address) -> Result<Vec<Crypt>> {
        Ok(self
            .ledger
            .lock()
            .await
            .crypts_by_warden(warden)
            .cloned()
            .collect())
    }

    async fn register_warden(&self, info_pointer: &str, secret_store_user_key: &str) -> Result<()> {
        Ok(self.ledger.lock().await.register_warden(
            &self.identity,
            info_pointer,
            secret_store_user_key,
        )?)
    }

    async fn stake_on_warden(&self, warden: &Address, token: &TokenId, amount: u128) -> Result<()> {
        Ok(self
            .ledger
            .lock()
            .await
            .stake_on_warden(&self.identity, warden, token, amount)?)
    }

    async fn withdraw_stake(&self, warden: &Address, token: &TokenId, amount: u128) -> Result<()> {
        Ok(self
            .ledger
            .lock()
            .await
            .withdraw_stake(&self.identity, warden, token, amount)?)
    }

    async fn slash_warden(&self, warden: &Address) -> Result<AssertionId> {
        Ok(self.ledger.lock().await.slash_warden(&self.identity, warden)?)
    }

    async fn execute_slash(&self, warden: &Address, token: &TokenId) -> Result<u128> {
        Ok(self
            .ledger
            .lock()
            .await
            .execute_slash(&self.identity, warden, token)?)
    }

    async fn get_warden_info(&self, warden: &Address) -> Result<Warden> {
        Ok(self.ledger.lock().await.get_warden(warden)?.clone())
    }

    async fn get_user_stake_on_warden(
        &self,
        warden: &Address,
        user: &Address,
        token: &TokenId,
    ) -> Result<u128> {
        Ok(self.ledger.lock().await.stake_of(warden, user, token))
    }

    async fn get_warden_stake_in_token(&self, warden: &Address, token: &TokenId) -> Result<u128> {
        Ok(self.ledger.lock().await.total_stake(warden, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypt_core::RegistryConfig;

    fn shared() -> SharedLedger {
        LocalLedger::share(Ledger::in_memory(
            Address::new("0xoracle"),
            RegistryConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_signers_share_state() {
        let owner = LocalLedger::new(shared(), Address::new("0xowner"));
        let warden = owner.signer(Address::new("0xwarden"));

        warden.register_warden("bafyprofile", "warden-key").await.unwrap();
        let id = owner
            .create_crypt(NewCrypt {
                data_pointer: "bafymeta".into(),
                trigger_spec: b"t".to_vec(),
                secret_store_ref: "s".into(),
                warden: warden.identity().clone(),
                callback_target: None,
            })
            .await
            .unwrap();

        let info = owner.get_warden_info(warden.identity()).await.unwrap();
        assert_eq!(info.secret_store_user_key, "warden-key");
        assert_eq!(
            warden.crypts_for_warden(warden.identity()).await.unwrap()[0].id,
            id
        );

        // The warden is not the owner.
        let err = warden.delete_crypt(id).await.unwrap_err();
        assert_eq!(err.kind(), crypt_core::ErrorKind::Authorization);
    }
}
