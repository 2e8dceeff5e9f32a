//! Typed clients for the systems a crypt touches
//!
//! One narrow async trait per collaborator, each with an in-process
//! implementation (for tests and embedded use) and a network one:
//!
//! | Trait | In-process | Network |
//! |---|---|---|
//! | [`LedgerClient`] | [`LocalLedger`] | [`JsonRpcLedger`] |
//! | [`OracleClient`] | [`LocalOracle`] | [`JsonRpcOracle`] |
//! | [`SecretStoreClient`] | [`InMemorySecretStore`] | [`HttpSecretStore`] |
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use crypt_clients::{CryptSealer, JsonRpcLedger, HttpSecretStore, RpcConfig, SealRequest,
//!     SecretStoreConfig};
//! use crypt_core::Address;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = JsonRpcLedger::new(&RpcConfig::default(), Address::new("0xowner"))?;
//! let secrets = HttpSecretStore::new(&SecretStoreConfig::default())?;
//!
//! let sealer = CryptSealer::new(Arc::new(ledger), Arc::new(secrets));
//! let sealed = sealer
//!     .seal(SealRequest {
//!         data_pointer: "bafybeigdyrzt".into(),
//!         trigger_spec: b"no check-in for 30 days".to_vec(),
//!         decryption_key: "c2VjcmV0".into(),
//!         warden: Address::new("0xwarden"),
//!         callback_target: None,
//!     })
//!     .await?;
//! println!("sealed crypt {}", sealed.crypt_id);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ledger;
pub mod oracle;
pub mod rpc;
pub mod sealer;
pub mod secret_store;
pub mod view;

pub use error::{ClientError, Result};
pub use ledger::{JsonRpcLedger, LedgerClient, LocalLedger, SharedLedger};
pub use oracle::{JsonRpcOracle, LocalOracle, OracleClient};
pub use rpc::{RpcConfig, RpcTransport};
pub use sealer::{CryptSealer, SealRequest, SealedCrypt};
pub use secret_store::{
    secret_name, HttpSecretStore, InMemorySecretStore, SecretStoreClient, SecretStoreConfig,
    SecretValue, StoreId,
};
pub use view::crypt_view;
