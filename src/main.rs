//! Vigil - Entry Point
//!
//! Starts the API server and the background stale sweep with graceful
//! shutdown support.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vigil::api::{ApiServer, AppState};
use vigil::config::{LogConfig, StoreBackend};
use vigil::health::{BatchProber, HttpHealthProbe, HttpImportSource, RefreshOrchestrator};
use vigil::repository::{KvStore, MemoryKvStore, PgKvStore, ProxyRecordStore};
use vigil::services::{StaleSweepHandle, StaleSweepService};
use vigil::{Config, Database};

#[tokio::main]
async fn main() -> vigil::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log);

    info!("Starting Vigil");

    // Pick the persisted store
    let mut database = None;
    let kv: Arc<dyn KvStore> = match config.store.backend {
        StoreBackend::Postgres => {
            let db = Database::connect(&config.database).await?;
            db.run_migrations().await?;
            let kv: Arc<dyn KvStore> = Arc::new(PgKvStore::new(db.pool().clone()));
            database = Some(db);
            kv
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; the proxy list is lost on restart");
            Arc::new(MemoryKvStore::new())
        }
    };

    let store = Arc::new(ProxyRecordStore::load(kv, config.store.proxies_key.clone()).await?);
    info!("Loaded {} proxies", store.len());

    let probe = Arc::new(HttpHealthProbe::new(&config.health)?);
    let prober = BatchProber::new(
        probe,
        config.health.batch_size,
        config.health.probe_timeout,
    );
    let orchestrator = Arc::new(RefreshOrchestrator::new(store, prober));
    let importer = Arc::new(HttpImportSource::new(&config.import)?);

    // Start the stale sweep
    let (sweep_handle, sweep_shutdown) = StaleSweepHandle::new();
    let sweep_task = match config.health.sweep_interval {
        Some(interval) => {
            let service = StaleSweepService::new(orchestrator.clone(), interval);
            Some(tokio::spawn(async move {
                service.run(sweep_shutdown).await;
            }))
        }
        None => {
            info!("Background stale sweep disabled");
            None
        }
    };

    // Start the API server
    let (shutdown_tx, api_shutdown) = watch::channel(false);
    let api_server = ApiServer::new(
        config.api.clone(),
        AppState::new(orchestrator.clone(), importer),
    );
    let api_task = tokio::spawn(async move {
        if let Err(e) = api_server.run(api_shutdown).await {
            error!("API server error: {}", e);
        }
    });

    info!(
        "Vigil started - API: {}, probe service: {}",
        config.api_addr(),
        config.health.api_base_url
    );

    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    sweep_handle.shutdown();

    let _ = api_task.await;
    if let Some(task) = sweep_task {
        let _ = task.await;
    }

    if orchestrator.is_cycle_in_progress() {
        warn!("Exiting with a cycle in flight; completed batches are already persisted");
    }

    if let Some(db) = database {
        db.close().await;
    }

    info!("Vigil stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("vigil={},tower_http=info", log.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
