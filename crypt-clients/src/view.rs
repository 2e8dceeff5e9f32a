//! Crypt status projection across ledger and oracle.

use crypt_core::{CryptId, CryptView};

use crate::error::Result;
use crate::ledger::LedgerClient;
use crate::oracle::OracleClient;

/// Fetch a crypt with its derived status and, while an unseal assertion is
/// pending, the time that assertion can settle.
pub async fn crypt_view(
    ledger: &dyn LedgerClient,
    oracle: &dyn OracleClient,
    crypt_id: CryptId,
) -> Result<CryptView> {
    let crypt = ledger.get_crypt(crypt_id).await?;
    let assertion_expiration = match &crypt.assertion_id {
        Some(id) => oracle.get_assertion(id).await?.map(|a| a.expiration_time),
        None => None,
    };
    Ok(CryptView {
        status: crypt.status(),
        crypt,
        assertion_expiration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LocalLedger;
    use crate::oracle::LocalOracle;
    use crypt_core::{Address, CryptStatus, Ledger, NewCrypt, RegistryConfig};

    #[tokio::test]
    async fn test_view_follows_lifecycle() {
        let shared = LocalLedger::share(Ledger::in_memory(
            Address::new("0xoracle"),
            RegistryConfig::default().with_liveness_secs(600),
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

        let view = crypt_view(&owner, &oracle, id).await.unwrap();
        assert_eq!(view.status, CryptStatus::Sealed);
        assert!(view.assertion_expiration.is_none());

        let assertion = owner.initiate_decrypt(id).await.unwrap();
        let view = crypt_view(&owner, &oracle, id).await.unwrap();
        assert_eq!(view.status, CryptStatus::UnsealInitiated);
        assert!(view.assertion_expiration.is_some());

        oracle.settle(&assertion, true).await.unwrap();
        let view = crypt_view(&owner, &oracle, id).await.unwrap();
        assert_eq!(view.status, CryptStatus::Unsealed);
        assert!(view.assertion_expiration.is_none());
    }
}
