//! Server setup and lifecycle management

use crate::api::{create_router, AppState};
use crate::config::{LinkmapConfig, StorageConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::storage::{InMemoryStorage, PostgresStorage, SessionStorage, Storage};
use linkmap_core::SecretBox;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Linkmap HTTP server
pub struct Server {
    config: LinkmapConfig,
    state: AppState,
}

impl Server {
    /// Connect storage, register configured tokens and load the encryption key.
    pub async fn new(config: LinkmapConfig) -> ServiceResult<Self> {
        let key = config.resolve_encryption_key().ok_or_else(|| {
            ServiceError::Config(
                "encryption key missing: set crypto.encryption_key or ENCRYPTION_KEY".to_string(),
            )
        })?;
        let secrets = SecretBox::from_hex_key(&key)?;

        let storage: Arc<dyn Storage> = match &config.storage {
            StorageConfig::Memory => Arc::new(InMemoryStorage::new()),
            StorageConfig::Postgres {
                url,
                max_connections,
                connect_timeout_secs,
            } => Arc::new(
                PostgresStorage::new(url, *max_connections, *connect_timeout_secs).await?,
            ),
        };

        for (token, user_id) in &config.auth.static_tokens {
            storage.upsert_session(token, *user_id).await?;
        }
        tracing::info!(
            backend = storage.backend_label(),
            tokens = config.auth.static_tokens.len(),
            "storage ready"
        );

        Ok(Self {
            state: AppState::new(storage, secrets),
            config,
        })
    }

    /// Shared state handed to request handlers
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until Ctrl+C or SIGTERM
    pub async fn run(self) -> ServiceResult<()> {
        let addr = self.config.server.listen_addr;
        let app = create_router(self.state, &self.config.server);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "linkmap listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServiceError::Server(e.to_string()))?;

        tracing::info!("linkmap shutting down");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn registers_static_tokens() {
        let mut config = LinkmapConfig::default();
        config.crypto.encryption_key = "0f".repeat(32);
        let user = Uuid::new_v4();
        config.auth.static_tokens.insert("dev-token".to_string(), user);

        let server = Server::new(config).await.unwrap();
        assert_eq!(
            server
                .state()
                .storage
                .resolve_session("dev-token")
                .await
                .unwrap(),
            Some(user)
        );
    }

    #[tokio::test]
    async fn rejects_malformed_key() {
        let mut config = LinkmapConfig::default();
        config.crypto.encryption_key = "not-hex".to_string();
        assert!(matches!(
            Server::new(config).await,
            Err(ServiceError::Crypto(_))
        ));
    }
}
