//! JSON-RPC ledger client.

use std::sync::Arc;

use async_trait::async_trait;
use crypt_core::{Address, AssertionId, Crypt, CryptId, NewCrypt, TokenId, Warden};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::LedgerClient;
use crate::error::Result;
use crate::rpc::{Amount, RpcConfig, RpcTransport};

/// [`LedgerClient`] speaking JSON-RPC; every mutation carries `from`, and
/// every call carries `to` when the registry address is configured.
#[derive(Clone)]
pub struct JsonRpcLedger {
    transport: Arc<RpcTransport>,
    identity: Address,
    crypt_registry: Option<Address>,
    warden_registry: Option<Address>,
}

impl JsonRpcLedger {
    pub fn new(config: &RpcConfig, identity: Address) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(RpcTransport::new(config)?), identity)
            .with_registries(config.crypt_registry.clone(), config.warden_registry.clone()))
    }

    pub fn with_transport(transport: Arc<RpcTransport>, identity: Address) -> Self {
        Self {
            transport,
            identity,
            crypt_registry: None,
            warden_registry: None,
        }
    }

    pub fn with_registries(
        mut self,
        crypt_registry: Option<Address>,
        warden_registry: Option<Address>,
    ) -> Self {
        self.crypt_registry = crypt_registry;
        self.warden_registry = warden_registry;
        self
    }

    pub fn signer(&self, identity: Address) -> Self {
        Self {
            identity,
            ..self.clone()
        }
    }

    async fn crypt_call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        self.transport
            .call(method, targeted(self.crypt_registry.as_ref(), params))
            .await
    }

    async fn warden_call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        self.transport
            .call(method, targeted(self.warden_registry.as_ref(), params))
            .await
    }
}

fn targeted(registry: Option<&Address>, mut params: Value) -> Value {
    if let (Some(to), Value::Object(map)) = (registry, &mut params) {
        map.insert("to".into(), json!(to));
    }
    params
}

#[async_trait]
impl LedgerClient for JsonRpcLedger {
    fn identity(&self) -> &Address {
        &self.identity
    }

    async fn create_crypt(&self, new: NewCrypt) -> Result<CryptId> {
        let mut params = serde_json::to_value(&new)?;
        params["from"] = json!(self.identity);
        self.crypt_call("createCrypt", params).await
    }

    async fn initiate_decrypt(&self, crypt_id: CryptId) -> Result<AssertionId> {
        self.crypt_call(
            "initiateDecrypt",
            json!({ "from": self.identity, "cryptId": crypt_id }),
        )
        .await
    }

    async fn set_decryption_key(&self, crypt_id: CryptId, key: &str) -> Result<()> {
        self.crypt_call(
            "setDecryptionKey",
            json!({ "from": self.identity, "cryptId": crypt_id, "key": key }),
        )
        .await
    }

    async fn delete_crypt(&self, crypt_id: CryptId) -> Result<()> {
        self.crypt_call(
            "deleteCrypt",
            json!({ "from": self.identity, "cryptId": crypt_id }),
        )
        .await
    }

    async fn get_crypt(&self, crypt_id: CryptId) -> Result<Crypt> {
        self.crypt_call("getCrypt", json!({ "cryptId": crypt_id }))
            .await
    }

    async fn get_crypts(&self) -> Result<Vec<Crypt>> {
        self.crypt_call("getCrypts", json!({})).await
    }

    async fn crypts_for_warden(&self, warden: &Address) -> Result<Vec<Crypt>> {
        self.crypt_call("getCrypts", json!({ "warden": warden }))
            .await
    }

    async fn register_warden(&self, info_pointer: &str, secret_store_user_key: &str) -> Result<()> {
        self.warden_call(
            "registerWarden",
            json!({
                "from": self.identity,
                "infoPointer": info_pointer,
                "secretStoreUserKey": secret_store_user_key,
            }),
        )
        .await
    }

    async fn stake_on_warden(&self, warden: &Address, token: &TokenId, amount: u128) -> Result<()> {
        self.warden_call(
            "stakeOnWarden",
            json!({
                "from": self.identity,
                "warden": warden,
                "token": token,
                "amount": amount.to_string(),
            }),
        )
        .await
    }

    async fn withdraw_stake(&self, warden: &Address, token: &TokenId, amount: u128) -> Result<()> {
        self.warden_call(
            "withdrawStake",
            json!({
                "from": self.identity,
                "warden": warden,
                "token": token,
                "amount": amount.to_string(),
            }),
        )
        .await
    }

    async fn slash_warden(&self, warden: &Address) -> Result<AssertionId> {
        self.warden_call(
            "slashWarden",
            json!({ "from": self.identity, "warden": warden }),
        )
        .await
    }

    async fn execute_slash(&self, warden: &Address, token: &TokenId) -> Result<u128> {
        let amount: Amount = self
            .warden_call(
                "executeSlash",
                json!({ "from": self.identity, "warden": warden, "token": token }),
            )
            .await?;
        Ok(amount.0)
    }

    async fn get_warden_info(&self, warden: &Address) -> Result<Warden> {
        self.warden_call("getWardenInfo", json!({ "warden": warden }))
            .await
    }

    async fn get_user_stake_on_warden(
        &self,
        warden: &Address,
        user: &Address,
        token: &TokenId,
    ) -> Result<u128> {
        let amount: Amount = self
            .warden_call(
                "getUserStakeOnWarden",
                json!({ "warden": warden, "user": user, "token": token }),
            )
            .await?;
        Ok(amount.0)
    }

    async fn get_warden_stake_in_token(&self, warden: &Address, token: &TokenId) -> Result<u128> {
        let amount: Amount = self
            .warden_call(
                "getWardenStakeInToken",
                json!({ "warden": warden, "token": token }),
            )
            .await?;
        Ok(amount.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_added_only_when_configured() {
        let params = targeted(Some(&Address::new("0xCrypts")), json!({ "cryptId": 1 }));
        assert_eq!(params, json!({ "cryptId": 1, "to": "0xcrypts" }));
        assert_eq!(targeted(None, json!({ "cryptId": 1 })), json!({ "cryptId": 1 }));
    }
}
