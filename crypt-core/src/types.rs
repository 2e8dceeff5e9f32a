//! Core record types for the crypt ledger.
//!
//! Crypts and wardens live in arenas keyed by their ids. Cross references
//! (crypt → assertion, warden → assertion) are stored as plain ids and
//! resolved through secondary indexes inside the registries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{RegistryError, Result};

// ============================================================================
// Identifiers
// ============================================================================

/// Ledger identity (account address).
///
/// Stored lower-cased so that `0xAbC` and `0xabc` compare equal, the way
/// checksummed and plain hex addresses refer to the same account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Create an address, normalizing case and surrounding whitespace.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        let address = Address::new(s);
        if address.is_empty() {
            return Err(RegistryError::InvalidInput("empty address".into()));
        }
        Ok(address)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address::new(s)
    }
}

/// Tokens are identified by their contract address.
pub type TokenId = Address;

/// Monotonically assigned crypt identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CryptId(pub u64);

impl fmt::Display for CryptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 32-byte assertion identifier issued by the oracle.
///
/// Serialized as `0x`-prefixed hex on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssertionId(pub [u8; 32]);

impl AssertionId {
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw)
            .map_err(|e| RegistryError::InvalidInput(format!("assertion id: {e}")))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            RegistryError::InvalidInput(format!("assertion id must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for AssertionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssertionId({})", self.to_hex())
    }
}

impl fmt::Display for AssertionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for AssertionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_hex().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AssertionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AssertionId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Hex encoding for opaque byte fields
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        format!("0x{}", hex::encode(bytes)).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s))
            .map_err(|e| serde::de::Error::custom(format!("hex decode error: {e}")))
    }
}

/// Token amounts travel as decimal strings so they survive JSON consumers
/// that only have 53-bit integers.
pub mod decimal {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid amount {s:?}: {e}")))
    }
}

// ============================================================================
// Crypt
// ============================================================================

/// Lifecycle status of a crypt.
///
/// Never stored: derived from `finalized` and `assertion_id`. `Deleted`
/// only appears in the transition table, since deleted records are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CryptStatus {
    Sealed,
    UnsealInitiated,
    Unsealed,
    Deleted,
}

impl CryptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CryptStatus::Sealed => "sealed",
            CryptStatus::UnsealInitiated => "unseal-initiated",
            CryptStatus::Unsealed => "unsealed",
            CryptStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for CryptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sealed record pairing an encrypted payload with a trigger and a warden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crypt {
    pub id: CryptId,
    /// Blob-store reference (CID) of the encrypted payload metadata
    pub data_pointer: String,
    /// Condition that must be asserted true to unseal
    #[serde(with = "hex_bytes")]
    pub trigger_spec: Vec<u8>,
    /// Secret-store id holding the decryption key
    pub secret_store_ref: String,
    /// Empty until the warden reveals it
    #[serde(default)]
    pub decryption_key: String,
    pub owner: Address,
    pub warden: Address,
    #[serde(default)]
    pub callback_target: Option<Address>,
    #[serde(default)]
    pub assertion_id: Option<AssertionId>,
    #[serde(default)]
    pub finalized: bool,
}

impl Crypt {
    pub fn status(&self) -> CryptStatus {
        if self.finalized {
            CryptStatus::Unsealed
        } else if self.assertion_id.is_some() {
            CryptStatus::UnsealInitiated
        } else {
            CryptStatus::Sealed
        }
    }

    pub fn is_revealed(&self) -> bool {
        !self.decryption_key.is_empty()
    }

    /// Finalized but still waiting on its warden.
    pub fn awaiting_reveal(&self) -> bool {
        self.finalized && !self.is_revealed()
    }
}

/// Input for creating a crypt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCrypt {
    pub data_pointer: String,
    #[serde(with = "hex_bytes")]
    pub trigger_spec: Vec<u8>,
    pub secret_store_ref: String,
    pub warden: Address,
    #[serde(default)]
    pub callback_target: Option<Address>,
}

/// Read projection joining a crypt with its pending assertion's expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptView {
    pub crypt: Crypt,
    pub status: CryptStatus,
    pub assertion_expiration: Option<DateTime<Utc>>,
}

// ============================================================================
// Warden
// ============================================================================

/// Lifecycle status of a warden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WardenStatus {
    Unregistered,
    Staked,
    SlashPending,
    Slashed,
}

impl fmt::Display for WardenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WardenStatus::Unregistered => "unregistered",
            WardenStatus::Staked => "staked",
            WardenStatus::SlashPending => "slash-pending",
            WardenStatus::Slashed => "slashed",
        };
        f.write_str(s)
    }
}

/// A staked custodian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warden {
    pub identity: Address,
    /// Blob-store reference to the warden's public profile
    pub info_pointer: String,
    /// Key the secret store uses to authorize this warden
    pub secret_store_user_key: String,
    #[serde(default)]
    pub pending_slash_assertion_id: Option<AssertionId>,
    #[serde(default)]
    pub slashed: bool,
}

impl Warden {
    pub fn status(&self) -> WardenStatus {
        if self.slashed {
            WardenStatus::Slashed
        } else if self.pending_slash_assertion_id.is_some() {
            WardenStatus::SlashPending
        } else {
            WardenStatus::Staked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_crypt() -> Crypt {
        Crypt {
            id: CryptId(7),
            data_pointer: "bafymeta".into(),
            trigger_spec: b"owner silent for 30 days".to_vec(),
            secret_store_ref: "store-1".into(),
            decryption_key: String::new(),
            owner: Address::new("0xA"),
            warden: Address::new("0xW"),
            callback_target: None,
            assertion_id: None,
            finalized: false,
        }
    }

    #[test]
    fn test_address_normalizes_case() {
        assert_eq!(Address::new("0xAbCd"), Address::new("0xabcd"));
        assert_eq!(Address::new(" 0xAB ").as_str(), "0xab");
        assert!("".parse::<Address>().is_err());
    }

    #[test]
    fn test_assertion_id_hex() {
        let id = AssertionId([0xab; 32]);
        let hex = id.to_hex();
        assert!(hex.starts_with("0xabab"));
        assert_eq!(AssertionId::from_hex(&hex).unwrap(), id);
        assert!(AssertionId::from_hex("0x1234").is_err());
    }

    #[test]
    fn test_crypt_status_derivation() {
        let mut crypt = sample_crypt();
        assert_eq!(crypt.status(), CryptStatus::Sealed);

        crypt.assertion_id = Some(AssertionId([1; 32]));
        assert_eq!(crypt.status(), CryptStatus::UnsealInitiated);

        crypt.assertion_id = None;
        crypt.finalized = true;
        assert_eq!(crypt.status(), CryptStatus::Unsealed);
        assert!(crypt.awaiting_reveal());

        crypt.decryption_key = "k".into();
        assert!(!crypt.awaiting_reveal());
    }

    #[test]
    fn test_crypt_json_shape() {
        let json = serde_json::to_value(sample_crypt()).unwrap();
        assert_eq!(json["dataPointer"], "bafymeta");
        assert_eq!(json["secretStoreRef"], "store-1");
        assert!(json["triggerSpec"].as_str().unwrap().starts_with("0x"));

        let back: Crypt = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample_crypt());
    }
}
