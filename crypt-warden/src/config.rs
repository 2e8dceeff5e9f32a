//! Configuration for the custody worker
//!
//! CLI arguments and environment variables via clap, layered over an
//! optional TOML file. Anything given on the command line or in the
//! environment wins over the file; anything in neither falls back to
//! [`WorkerConfig::default`].

use std::path::{Path, PathBuf};

use clap::Parser;
use crypt_clients::{RpcConfig, SecretStoreConfig};
use crypt_core::Address;
use serde::Deserialize;

use crate::error::{Result, WorkerError};
use crate::worker::WorkerConfig;

/// crypt-warden - reveals decryption keys for crypts this warden guards
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "crypt-warden")]
#[command(about = "Key custody worker for the crypt vault")]
pub struct Args {
    /// TOML configuration file
    #[arg(long, env = "CRYPT_WARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Ledger JSON-RPC endpoint
    #[arg(long, env = "LEDGER_URL")]
    pub ledger_url: Option<String>,

    /// Bearer token for the ledger endpoint
    #[arg(long, env = "LEDGER_API_KEY")]
    pub ledger_api_key: Option<String>,

    /// Crypt registry contract address
    #[arg(long, env = "CRYPT_REGISTRY_ADDRESS")]
    pub crypt_registry_address: Option<String>,

    /// Warden registry contract address
    #[arg(long, env = "WARDEN_REGISTRY_ADDRESS")]
    pub warden_registry_address: Option<String>,

    /// This warden's ledger identity
    #[arg(long, env = "WARDEN_ADDRESS")]
    pub warden_address: Option<String>,

    /// Secret store base URL
    #[arg(long, env = "SECRET_STORE_URL")]
    pub secret_store_url: Option<String>,

    /// Key the secret store authorizes this warden by
    #[arg(long, env = "SECRET_STORE_USER_KEY")]
    pub secret_store_user_key: Option<String>,

    /// Delay between poll cycles in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Maximum reveals in flight
    #[arg(long, env = "MAX_CONCURRENT")]
    pub max_concurrent: Option<usize>,

    /// Timeout for each external call in milliseconds
    #[arg(long, env = "CALL_TIMEOUT_MS")]
    pub call_timeout_ms: Option<u64>,

    /// Cap on the backed-off poll interval in milliseconds
    #[arg(long, env = "MAX_BACKOFF_MS")]
    pub max_backoff_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

// ============================================================================
// File layer
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub ledger: LedgerSection,
    pub secret_store: SecretStoreSection,
    pub warden: WardenSection,
    pub worker: WorkerSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerSection {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub crypt_registry: Option<String>,
    pub warden_registry: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecretStoreSection {
    pub url: Option<String>,
    pub user_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WardenSection {
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerSection {
    pub poll_interval_ms: Option<u64>,
    pub max_concurrent: Option<usize>,
    pub call_timeout_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| WorkerError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&raw)
            .map_err(|e| WorkerError::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

// ============================================================================
// Resolved settings
// ============================================================================

/// Everything the binary needs, after layering
#[derive(Debug, Clone)]
pub struct Settings {
    pub rpc: RpcConfig,
    pub secret_store: SecretStoreConfig,
    pub worker: WorkerConfig,
    pub log_json: bool,
}

impl Settings {
    /// Layer `args` over the file named by `args.config`, if any.
    pub fn from_args(args: &Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file)
    }

    pub fn resolve(args: &Args, file: FileConfig) -> Result<Self> {
        let rpc_defaults = RpcConfig::default();
        let store_defaults = SecretStoreConfig::default();
        let worker_defaults = WorkerConfig::default();

        let crypt_registry = pick(&args.crypt_registry_address, file.ledger.crypt_registry)
            .ok_or_else(|| WorkerError::Config("crypt registry address is required".into()))?;
        let rpc = RpcConfig {
            endpoint: pick(&args.ledger_url, file.ledger.url).unwrap_or(rpc_defaults.endpoint),
            timeout_secs: file.ledger.timeout_secs.unwrap_or(rpc_defaults.timeout_secs),
            api_key: pick(&args.ledger_api_key, file.ledger.api_key),
            crypt_registry: Some(Address::new(crypt_registry)),
            warden_registry: pick(&args.warden_registry_address, file.ledger.warden_registry)
                .map(Address::new),
        };

        let secret_store = SecretStoreConfig {
            base_url: pick(&args.secret_store_url, file.secret_store.url)
                .unwrap_or(store_defaults.base_url),
            timeout_secs: file
                .secret_store
                .timeout_secs
                .unwrap_or(store_defaults.timeout_secs),
        };

        let warden = pick(&args.warden_address, file.warden.address)
            .ok_or_else(|| WorkerError::Config("warden address is required".into()))?;
        let secret_store_user_key = pick(&args.secret_store_user_key, file.secret_store.user_key)
            .ok_or_else(|| WorkerError::Config("secret store user key is required".into()))?;

        let worker = WorkerConfig {
            warden: Address::new(warden),
            secret_store_user_key,
            poll_interval_ms: pick(&args.poll_interval_ms, file.worker.poll_interval_ms)
                .unwrap_or(worker_defaults.poll_interval_ms),
            max_concurrent: pick(&args.max_concurrent, file.worker.max_concurrent)
                .unwrap_or(worker_defaults.max_concurrent),
            call_timeout_ms: pick(&args.call_timeout_ms, file.worker.call_timeout_ms)
                .unwrap_or(worker_defaults.call_timeout_ms),
            max_backoff_ms: pick(&args.max_backoff_ms, file.worker.max_backoff_ms)
                .unwrap_or(worker_defaults.max_backoff_ms),
        };
        worker.validate().map_err(WorkerError::Config)?;

        Ok(Self {
            rpc,
            secret_store,
            worker,
            log_json: args.log_json,
        })
    }
}

fn pick<T: Clone>(arg: &Option<T>, file: Option<T>) -> Option<T> {
    arg.clone().or(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args() -> Args {
        Args {
            crypt_registry_address: Some("0xCrypts".into()),
            warden_address: Some("0xWarden".into()),
            secret_store_user_key: Some("warden-key".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_fill_the_gaps() {
        let settings = Settings::resolve(&args(), FileConfig::default()).unwrap();
        assert_eq!(settings.rpc.endpoint, RpcConfig::default().endpoint);
        assert_eq!(settings.worker.warden, Address::new("0xwarden"));
        assert_eq!(settings.rpc.crypt_registry, Some(Address::new("0xcrypts")));
        assert_eq!(settings.rpc.warden_registry, None);
        assert_eq!(settings.worker.poll_interval_ms, WorkerConfig::default().poll_interval_ms);
        assert!(!settings.log_json);
    }

    #[test]
    fn test_missing_identity_rejected() {
        let args = Args {
            warden_address: None,
            ..args()
        };
        let err = Settings::resolve(&args, FileConfig::default()).unwrap_err();
        assert!(matches!(err, WorkerError::Config(msg) if msg.contains("warden address")));
    }

    #[test]
    fn test_missing_crypt_registry_rejected() {
        let args = Args {
            crypt_registry_address: None,
            ..args()
        };
        let err = Settings::resolve(&args, FileConfig::default()).unwrap_err();
        assert!(matches!(err, WorkerError::Config(msg) if msg.contains("crypt registry")));
    }

    #[test]
    fn test_invalid_worker_values_rejected() {
        let mut args = args();
        args.max_concurrent = Some(0);
        assert!(Settings::resolve(&args, FileConfig::default()).is_err());
    }

    #[test]
    fn test_file_then_args_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[ledger]
url = "http://ledger.internal:8545"
api_key = "file-token"
crypt_registry = "0xfilecrypts"
warden_registry = "0xfilewardens"

[secret_store]
url = "http://vault.internal:8090"
user_key = "file-key"

[warden]
address = "0xfilewarden"

[worker]
poll_interval_ms = 2000
max_concurrent = 3
"#
        )
        .unwrap();

        let args = Args {
            config: Some(file.path().to_path_buf()),
            warden_address: Some("0xcliwarden".into()),
            crypt_registry_address: Some("0xclicrypts".into()),
            max_concurrent: Some(5),
            ..Default::default()
        };
        let settings = Settings::from_args(&args).unwrap();

        assert_eq!(settings.rpc.endpoint, "http://ledger.internal:8545");
        assert_eq!(settings.rpc.api_key.as_deref(), Some("file-token"));
        assert_eq!(settings.rpc.crypt_registry, Some(Address::new("0xclicrypts")));
        assert_eq!(settings.rpc.warden_registry, Some(Address::new("0xfilewardens")));
        assert_eq!(settings.secret_store.base_url, "http://vault.internal:8090");
        assert_eq!(settings.worker.secret_store_user_key, "file-key");
        assert_eq!(settings.worker.warden, Address::new("0xcliwarden"));
        assert_eq!(settings.worker.poll_interval_ms, 2000);
        assert_eq!(settings.worker.max_concurrent, 5);
    }

    #[test]
    fn test_unknown_file_keys_rejected() {
        assert!(FileConfig::parse("[worker]\npoll_interval = 5").is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let args = Args {
            config: Some(PathBuf::from("/nonexistent/crypt-warden.toml")),
            ..args()
        };
        assert!(matches!(
            Settings::from_args(&args),
            Err(WorkerError::Config(_))
        ));
    }
}
