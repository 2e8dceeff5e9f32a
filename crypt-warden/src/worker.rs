//! Key custody worker
//!
//! Polls the ledger for crypts this warden guards, and for every crypt that
//! is finalized but still has no key on record, fetches the key from the
//! secret store and reveals it.
//!
//! ```text
//!   ┌──────────── cycle ────────────┐
//!   │ crypts_for_warden(self)       │
//!   │   └─ filter awaiting_reveal   │
//!   │      minus quarantined        │
//!   │        │                      │
//!   │        ▼   (≤ max_concurrent) │
//!   │   retrieve(crypt_key_{dp})    │
//!   │        ▼                      │
//!   │   set_decryption_key          │
//!   └───────────────┬───────────────┘
//!                   ▼
//!        sleep(interval, backoff)
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crypt_clients::{secret_name, LedgerClient, SecretStoreClient, StoreId};
use crypt_core::{Address, Crypt, CryptId};
use futures::future::join_all;
use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{debug, error, info, warn};

use crate::error::{Result, WorkerError};

// ============================================================================
// Configuration
// ============================================================================

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identity this worker reveals for
    pub warden: Address,
    /// Key the secret store knows this warden by
    pub secret_store_user_key: String,
    /// Delay between healthy cycles in milliseconds
    pub poll_interval_ms: u64,
    /// Maximum reveal pipelines in flight
    pub max_concurrent: usize,
    /// Timeout for each ledger or secret store call in milliseconds
    pub call_timeout_ms: u64,
    /// Upper bound for the backed-off interval in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            warden: Address::new(""),
            secret_store_user_key: String::new(),
            poll_interval_ms: 10_000,
            max_concurrent: 8,
            call_timeout_ms: 15_000,
            max_backoff_ms: 300_000,
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.warden.is_empty() {
            return Err("warden address is required".into());
        }
        if self.secret_store_user_key.trim().is_empty() {
            return Err("secret store user key is required".into());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll interval must be greater than zero".into());
        }
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be at least 1".into());
        }
        if self.call_timeout_ms == 0 {
            return Err("call timeout must be greater than zero".into());
        }
        if self.max_backoff_ms < self.poll_interval_ms {
            return Err("max backoff must not be shorter than the poll interval".into());
        }
        Ok(())
    }
}

// ============================================================================
// Cycle results
// ============================================================================

/// How a single crypt's pipeline ended
#[derive(Debug)]
pub enum RevealOutcome {
    Revealed,
    /// Another worker got there first
    AlreadyRevealed,
    /// Shutdown arrived before the pipeline started
    Skipped,
    Failed(WorkerError),
}

/// Tally of one poll cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub candidates: usize,
    pub revealed: usize,
    pub already_revealed: usize,
    /// Transient, authorization and state failures; retried next cycle
    pub failed: usize,
    /// Bad payloads; quarantined and never counted toward backoff
    pub integrity_failures: usize,
    pub skipped: usize,
    pub discovery_failed: bool,
}

impl CycleReport {
    fn record(&mut self, outcome: &RevealOutcome) {
        match outcome {
            RevealOutcome::Revealed => self.revealed += 1,
            RevealOutcome::AlreadyRevealed => self.already_revealed += 1,
            RevealOutcome::Skipped => self.skipped += 1,
            RevealOutcome::Failed(WorkerError::DataIntegrity { .. }) => {
                self.integrity_failures += 1
            }
            RevealOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Discovery failed, or a strict majority of candidates failed.
    pub fn is_degraded(&self) -> bool {
        self.discovery_failed || self.failed * 2 > self.candidates
    }
}

// ============================================================================
// Worker
// ============================================================================

pub struct KeyCustodyWorker {
    config: WorkerConfig,
    ledger: Arc<dyn LedgerClient>,
    secrets: Arc<dyn SecretStoreClient>,
    semaphore: Arc<Semaphore>,
    /// Crypts whose secret failed validation; not attempted again
    quarantine: Mutex<HashSet<CryptId>>,
}

impl KeyCustodyWorker {
    pub fn new(
        config: WorkerConfig,
        ledger: Arc<dyn LedgerClient>,
        secrets: Arc<dyn SecretStoreClient>,
    ) -> Result<Self> {
        config.validate().map_err(WorkerError::Config)?;
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Ok(Self {
            config,
            ledger,
            secrets,
            semaphore,
            quarantine: Mutex::new(HashSet::new()),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Poll until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// A shutdown during a cycle lets pipelines already holding a permit
    /// finish; the rest are skipped and the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            warden = %self.config.warden,
            interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent,
            "Key custody worker started"
        );

        let mut interval = self.config.poll_interval();
        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            let report = self.run_cycle_until(&shutdown).await;
            interval = self.next_interval(interval, &report);
            if report.is_degraded() {
                warn!(next_poll_ms = interval.as_millis() as u64, "Cycle degraded, backing off");
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(warden = %self.config.warden, "Key custody worker stopped");
        Ok(())
    }

    /// Run one poll cycle to completion.
    pub async fn run_cycle(&self) -> CycleReport {
        let (_tx, rx) = watch::channel(false);
        self.run_cycle_until(&rx).await
    }

    /// Crypts skipped for the lifetime of this worker after an integrity failure.
    pub async fn quarantined(&self) -> Vec<CryptId> {
        let mut ids: Vec<CryptId> = self.quarantine.lock().await.iter().copied().collect();
        ids.sort();
        ids
    }

    /// Interval to wait after a cycle: doubled (capped) when degraded,
    /// reset to the poll interval otherwise.
    pub fn next_interval(&self, previous: Duration, report: &CycleReport) -> Duration {
        if report.is_degraded() {
            previous
                .max(self.config.poll_interval())
                .saturating_mul(2)
                .min(self.config.max_backoff())
        } else {
            self.config.poll_interval()
        }
    }

    /// Run one poll cycle, starting no new pipeline once `shutdown` is `true`.
    pub async fn run_cycle_until(&self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let mut report = CycleReport::default();

        let candidates = match self.discover().await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(warden = %self.config.warden, error = %e, "Crypt discovery failed");
                report.discovery_failed = true;
                return report;
            }
        };
        report.candidates = candidates.len();
        if candidates.is_empty() {
            debug!("No crypts awaiting reveal");
            return report;
        }

        let outcomes = join_all(candidates.iter().map(|crypt| async move {
            let _permit = match self.semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return RevealOutcome::Skipped,
            };
            let stopping = *shutdown.borrow();
            if stopping {
                return RevealOutcome::Skipped;
            }
            self.process(crypt).await
        }))
        .await;

        for (crypt, outcome) in candidates.iter().zip(&outcomes) {
            match outcome {
                RevealOutcome::Revealed => {
                    info!(crypt_id = %crypt.id, "Decryption key revealed");
                }
                RevealOutcome::AlreadyRevealed => {
                    debug!(crypt_id = %crypt.id, "Key already revealed");
                }
                RevealOutcome::Skipped => {}
                RevealOutcome::Failed(e @ WorkerError::DataIntegrity { .. }) => {
                    error!(crypt_id = %crypt.id, error = %e, "Unusable secret, quarantining crypt");
                    self.quarantine.lock().await.insert(crypt.id);
                }
                RevealOutcome::Failed(e) => {
                    warn!(
                        crypt_id = %crypt.id,
                        transient = e.is_transient(),
                        error = %e,
                        "Reveal failed, will retry next cycle"
                    );
                }
            }
            report.record(outcome);
        }

        info!(
            candidates = report.candidates,
            revealed = report.revealed,
            already_revealed = report.already_revealed,
            failed = report.failed,
            integrity_failures = report.integrity_failures,
            skipped = report.skipped,
            "Custody cycle complete"
        );
        report
    }

    async fn discover(&self) -> Result<Vec<Crypt>> {
        let crypts = self
            .call("crypts_for_warden", self.ledger.crypts_for_warden(&self.config.warden))
            .await?;
        let quarantine = self.quarantine.lock().await;
        // Nodes may ignore the warden filter.
        Ok(crypts
            .into_iter()
            .filter(|c| c.warden == self.config.warden && c.awaiting_reveal())
            .filter(|c| !quarantine.contains(&c.id))
            .collect())
    }

    async fn process(&self, crypt: &Crypt) -> RevealOutcome {
        match self.reveal(crypt).await {
            Ok(()) => RevealOutcome::Revealed,
            Err(e) if e.is_already_revealed() => RevealOutcome::AlreadyRevealed,
            Err(e) => RevealOutcome::Failed(e),
        }
    }

    async fn reveal(&self, crypt: &Crypt) -> Result<()> {
        let name = secret_name(&crypt.data_pointer);
        let store_id = StoreId::from(crypt.secret_store_ref.as_str());

        let key = self
            .call(
                "secret retrieval",
                self.secrets
                    .retrieve(&store_id, &name, &self.config.secret_store_user_key),
            )
            .await?;
        if key.trim().is_empty() {
            return Err(integrity(crypt.id, format!("secret {name} is empty")));
        }

        self.call("reveal", self.ledger.set_decryption_key(crypt.id, &key))
            .await
    }

    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = crypt_clients::Result<T>>,
    {
        let timeout = self.config.call_timeout();
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result.map_err(WorkerError::from),
            Err(_) => Err(WorkerError::Timeout { operation, timeout }),
        }
    }
}

fn integrity(crypt_id: CryptId, reason: String) -> WorkerError {
    WorkerError::DataIntegrity { crypt_id, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypt_clients::{InMemorySecretStore, LocalLedger};
    use crypt_core::{Ledger, RegistryConfig};

    fn config() -> WorkerConfig {
        WorkerConfig {
            warden: Address::new("0xwarden"),
            secret_store_user_key: "warden-key".into(),
            poll_interval_ms: 100,
            max_concurrent: 2,
            call_timeout_ms: 1_000,
            max_backoff_ms: 1_000,
        }
    }

    fn worker(config: WorkerConfig) -> KeyCustodyWorker {
        let shared = LocalLedger::share(Ledger::in_memory(
            Address::new("0xoracle"),
            RegistryConfig::default(),
        ));
        KeyCustodyWorker::new(
            config.clone(),
            Arc::new(LocalLedger::new(shared, config.warden)),
            Arc::new(InMemorySecretStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());
        assert!(WorkerConfig::default().validate().is_err());

        let mut bad = config();
        bad.poll_interval_ms = 0;
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.max_concurrent = 0;
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.max_backoff_ms = 50;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_degraded_needs_strict_majority() {
        let half = CycleReport {
            candidates: 4,
            failed: 2,
            ..Default::default()
        };
        assert!(!half.is_degraded());

        let most = CycleReport {
            candidates: 3,
            failed: 2,
            ..Default::default()
        };
        assert!(most.is_degraded());

        let integrity_only = CycleReport {
            candidates: 2,
            integrity_failures: 2,
            ..Default::default()
        };
        assert!(!integrity_only.is_degraded());

        let blind = CycleReport {
            discovery_failed: true,
            ..Default::default()
        };
        assert!(blind.is_degraded());
    }

    #[test]
    fn test_backoff_doubles_caps_and_resets() {
        let worker = worker(config());
        let degraded = CycleReport {
            discovery_failed: true,
            ..Default::default()
        };
        let healthy = CycleReport::default();

        let base = Duration::from_millis(100);
        let mut interval = base;
        interval = worker.next_interval(interval, &degraded);
        assert_eq!(interval, Duration::from_millis(200));
        interval = worker.next_interval(interval, &degraded);
        interval = worker.next_interval(interval, &degraded);
        assert_eq!(interval, Duration::from_millis(800));
        interval = worker.next_interval(interval, &degraded);
        assert_eq!(interval, Duration::from_millis(1_000));

        assert_eq!(worker.next_interval(interval, &healthy), base);
    }

    #[tokio::test]
    async fn test_empty_cycle() {
        let report = worker(config()).run_cycle().await;
        assert_eq!(report, CycleReport::default());
        assert!(!report.is_degraded());
    }
}
