//! Ledger clients
//!
//! [`LedgerClient`] is the typed surface every off-ledger component talks
//! to. A client value is bound to one signing identity: every mutation is
//! sent as that identity.
//!
//! - [`LocalLedger`] shares an in-process [`crypt_core::Ledger`]
//! - [`JsonRpcLedger`] talks JSON-RPC to a ledger node

mod local;
mod rpc;

pub use local::{LocalLedger, SharedLedger};
pub use rpc::JsonRpcLedger;

use async_trait::async_trait;
use crypt_core::{Address, AssertionId, Crypt, CryptId, NewCrypt, TokenId, Warden};

use crate::error::Result;

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Identity this client signs as.
    fn identity(&self) -> &Address;

    // Crypt registry

    async fn create_crypt(&self, new: NewCrypt) -> Result<CryptId>;

    async fn initiate_decrypt(&self, crypt_id: CryptId) -> Result<AssertionId>;

    async fn set_decryption_key(&self, crypt_id: CryptId, key: &str) -> Result<()>;

    async fn delete_crypt(&self, crypt_id: CryptId) -> Result<()>;

    async fn get_crypt(&self, crypt_id: CryptId) -> Result<Crypt>;

    async fn get_crypts(&self) -> Result<Vec<Crypt>>;

    /// Crypts in custody of `warden`.
    async fn crypts_for_warden(&self, warden: &Address) -> Result<Vec<Crypt>> {
        Ok(self
            .get_crypts()
            .await?
            .into_iter()
            .filter(|c| &c.warden == warden)
            .collect())
    }

    // Warden registry

    async fn register_warden(&self, info_pointer: &str, secret_store_user_key: &str)
        -> Result<()>;

    async fn stake_on_warden(&self, warden: &Address, token: &TokenId, amount: u128)
        -> Result<()>;

    async fn withdraw_stake(&self, warden: &Address, token: &TokenId, amount: u128)
        -> Result<()>;

    async fn slash_warden(&self, warden: &Address) -> Result<AssertionId>;

    async fn execute_slash(&self, warden: &Address, token: &TokenId) -> Result<u128>;

    async fn get_warden_info(&self, warden: &Address) -> Result<Warden>;

    async fn get_user_stake_on_warden(
        &self,
        warden: &Address,
        user: &Address,
        token: &TokenId,
    ) -> Result<u128>;

    async fn get_warden_stake_in_token(&self, warden: &Address, token: &TokenId) -> Result<u128>;
}
