//! HTTP façade for encrypted data vaults.
//!
//! Maps the vault and document operations onto REST routes under `/edvs`,
//! with failures reported as `{"type": ..., "message": ...}` bodies.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use edvault_common::{Error, Result};
use edvault_storage::{DocumentStorage, MemoryDocumentStore};
use edvault_vault::VaultManager;

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

pub use auth::{AuthResolver, Caller, FixedIdentityResolver, HeaderIdentityResolver};
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use routes::router;

/// State shared across handlers.
pub struct AppState {
    pub manager: Arc<VaultManager>,
    pub storage: Arc<dyn DocumentStorage>,
    pub auth: Arc<dyn AuthResolver>,
}

impl AppState {
    pub fn new(manager: Arc<VaultManager>, auth: Arc<dyn AuthResolver>) -> Self {
        Self {
            storage: manager.storage(),
            manager,
            auth,
        }
    }

    /// Build state backed by in-memory storage.
    pub fn in_memory(config: &ServerConfig) -> Result<Self> {
        let storage: Arc<dyn DocumentStorage> = Arc::new(MemoryDocumentStore::new());
        let manager = Arc::new(VaultManager::new(config.base_uri.clone(), storage));
        Ok(Self::new(manager, config.resolver()?))
    }
}

/// Serve the API until `shutdown` resolves.
pub async fn serve(
    config: ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    config.validate()?;
    let state = Arc::new(AppState::in_memory(&config)?);
    let app = router(state, &config);

    let listener = TcpListener::bind(config.bind).await?;
    info!(bind = %config.bind, base_uri = %config.base_uri, "Vault server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Internal(format!("Server error: {e}")))?;

    info!("Vault server stopped");
    Ok(())
}
