//! Assertion oracle clients
//!
//! Assertions are opened by the registries themselves; off-ledger parties
//! only read them, dispute them, or (for the in-memory oracle and test
//! nodes) push a settlement through.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use crypt_core::{Address, Assertion, AssertionId, AssertionOracle};
use serde_json::json;
use tracing::info;

use crate::error::Result;
use crate::ledger::SharedLedger;
use crate::rpc::{RpcConfig, RpcTransport};

#[async_trait]
pub trait OracleClient: Send + Sync {
    async fn get_assertion(&self, id: &AssertionId) -> Result<Option<Assertion>>;

    /// Dispute an open assertion. It will wait for adjudication instead of
    /// settling at expiry.
    async fn dispute(&self, id: &AssertionId, disputer: &Address) -> Result<()>;

    /// Push an adjudicated resolution and deliver the registry callback.
    async fn settle(&self, id: &AssertionId, truthful: bool) -> Result<()>;

    /// Settle every undisputed assertion past its liveness window.
    async fn settle_expired(&self) -> Result<usize>;
}

// ============================================================================
// In-process
// ============================================================================

/// Oracle client over the oracle embedded in a [`SharedLedger`].
#[derive(Clone)]
pub struct LocalOracle {
    ledger: SharedLedger,
}

impl LocalOracle {
    pub fn new(ledger: SharedLedger) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl OracleClient for LocalOracle {
    async fn get_assertion(&self, id: &AssertionId) -> Result<Option<Assertion>> {
        Ok(self.ledger.lock().await.oracle().get_assertion(id).cloned())
    }

    async fn dispute(&self, id: &AssertionId, disputer: &Address) -> Result<()> {
        Ok(self.ledger.lock().await.dispute(id, disputer.clone())?)
    }

    async fn settle(&self, id: &AssertionId, truthful: bool) -> Result<()> {
        Ok(self.ledger.lock().await.resolve(id, truthful)?)
    }

    async fn settle_expired(&self) -> Result<usize> {
        let settled = self.ledger.lock().await.settle_expired(Utc::now())?;
        if settled > 0 {
            info!(settled, "Expired assertions settled");
        }
        Ok(settled)
    }
}

// ============================================================================
// JSON-RPC
// ============================================================================

#[derive(Clone)]
pub struct JsonRpcOracle {
    transport: Arc<RpcTransport>,
}

impl JsonRpcOracle {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        Ok(Self {
            transport: Arc::new(RpcTransport::new(config)?),
        })
    }

    pub fn with_transport(transport: Arc<RpcTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl OracleClient for JsonRpcOracle {
    async fn get_assertion(&self, id: &AssertionId) -> Result<Option<Assertion>> {
        self.transport
            .call("getAssertion", json!({ "assertionId": id }))
            .await
    }

    async fn dispute(&self, id: &AssertionId, disputer: &Address) -> Result<()> {
        self.transport
            .call(
                "disputeAssertion",
                json!({ "assertionId": id, "disputer": disputer }),
            )
            .await
    }

    async fn settle(&self, id: &AssertionId, truthful: bool) -> Result<()> {
        self.transport
            .call(
                "settleAssertion",
                json!({ "assertionId": id, "resolution": truthful }),
            )
            .await
    }

    async fn settle_expired(&self) -> Result<usize> {
        self.transport.call("settleExpired", json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerClient, LocalLedger};
    use crypt_core::{Ledger, NewCrypt, RegistryConfig};

    #[tokio::test]
    async fn test_local_oracle_settles_through_ledger() {
        let shared = LocalLedger::share(Ledger::in_memory(
            Address::new("0xoracle"),
            RegistryConfig::default(),
        ));
        let owner = LocalLedger::new(shared.clone(), Address::new("0xowner"));
        let oracle = LocalOracle::new(shared);

        let id = owner
            .create_crypt(NewCrypt {
                data_pointer: "bafymeta".into(),
                trigger_spec: b"t".to_vec(),
                secret_store_ref: "s".into(),
                warden: Address::new("0xw"),
                callback_target: None,
            })
            .await
            .unwrap();
        let assertion = owner.initiate_decrypt(id).await.unwrap();

        let record = oracle.get_assertion(&assertion).await.unwrap().unwrap();
        assert_eq!(record.asserter, Address::new("0xowner"));
        assert!(!record.settled);

        oracle.settle(&assertion, true).await.unwrap();
        assert!(owner.get_crypt(id).await.unwrap().finalized);
        assert!(oracle.settle(&assertion, true).await.is_err());
    }
}
