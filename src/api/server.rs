//! API server using Axum

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::config::ApiServerConfig;
use crate::error::{Result, VigilError};
use crate::health::{ImportSource, RefreshOrchestrator};
use crate::repository::ProxyRecordStore;

use super::middleware::{cors_layer, log_request};
use super::routes;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ProxyRecordStore>,
    pub orchestrator: Arc<RefreshOrchestrator>,
    pub importer: Arc<dyn ImportSource>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<RefreshOrchestrator>, importer: Arc<dyn ImportSource>) -> Self {
        Self {
            store: orchestrator.store().clone(),
            orchestrator,
            importer,
            started_at: Instant::now(),
        }
    }
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    fn build_router(&self) -> Router {
        let cors = cors_layer(&self.config.cors_origins);

        routes::create_router(self.state.clone(), &self.config.static_dir)
            .layer(axum::middleware::from_fn(log_request))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` changes
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| VigilError::InvalidConfig(format!("Invalid API server address: {}", e)))?;

        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server listening on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| VigilError::Internal(e.to_string()))?;

        info!("API server shut down");
        Ok(())
    }
}
