//! crypt-warden - key custody worker binary

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crypt_clients::{HttpSecretStore, JsonRpcLedger};
use crypt_warden::{Args, KeyCustodyWorker, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.log_json);

    let settings = match Settings::from_args(&args) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!("Warden: {}", settings.worker.warden);
    info!("Ledger: {}", settings.rpc.endpoint);
    if let Some(registry) = &settings.rpc.crypt_registry {
        info!("Crypt registry: {}", registry);
    }
    info!("Secret store: {}", settings.secret_store.base_url);
    info!(
        "Poll interval: {}ms (backoff cap {}ms), max concurrent: {}",
        settings.worker.poll_interval_ms,
        settings.worker.max_backoff_ms,
        settings.worker.max_concurrent
    );

    let ledger = JsonRpcLedger::new(&settings.rpc, settings.worker.warden.clone())?;
    let secrets = HttpSecretStore::new(&settings.secret_store)?;
    let worker = KeyCustodyWorker::new(settings.worker, Arc::new(ledger), Arc::new(secrets))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal, finishing in-flight reveals");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        }
    });

    worker.run(shutdown_rx).await?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,crypt_warden=debug"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
