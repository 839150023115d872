//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the forwarder on every path
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener, serve until shutdown
//! - Start the admin API when enabled
//! - Apply reloaded configuration to the pool

use axum::{routing::any, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::config::watcher::apply_backend_update;
use crate::config::BalancerConfig;
use crate::http::forwarder::{proxy_handler, AppState};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::shutdown::recv_shutdown;
use crate::load_balancer::{PoolError, ServerPool};

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: BalancerConfig,
    pool: Arc<ServerPool>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Fails if any configured backend address is invalid.
    pub fn new(config: BalancerConfig) -> Result<Self, PoolError> {
        let pool = Arc::new(ServerPool::from_config(&config)?);
        let state = AppState { pool: pool.clone() };
        let router = Self::build_router(&config, state);

        Ok(Self {
            router,
            config,
            pool,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &BalancerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Returns once `shutdown` fires and in-flight requests have drained.
    /// All health checkers are stopped before returning.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<BalancerConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.pool.len(),
            "HTTP server starting"
        );

        if self.config.admin.enabled {
            let admin_router = admin::setup_admin_router(self.pool.clone(), &self.config.admin.api_key);
            let admin_shutdown = shutdown.resubscribe();
            let bind_address = self.config.admin.bind_address.clone();
            tokio::spawn(async move {
                match TcpListener::bind(&bind_address).await {
                    Ok(admin_listener) => {
                        tracing::info!(address = %bind_address, "Admin API listening");
                        if let Err(e) = axum::serve(admin_listener, admin_router)
                            .with_graceful_shutdown(recv_shutdown(admin_shutdown))
                            .await
                        {
                            tracing::error!(error = %e, "Admin API stopped");
                        }
                    }
                    Err(e) => tracing::error!(address = %bind_address, error = %e, "Failed to bind admin API"),
                }
            });
        }

        let updates_pool = self.pool.clone();
        let updates = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                let added = apply_backend_update(&updates_pool, &new_config);
                tracing::info!(added, backends = updates_pool.len(), "Configuration reloaded");
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(recv_shutdown(shutdown))
            .await;

        updates.abort();
        self.pool.shutdown();
        served?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    /// The pool shared by all request handlers.
    pub fn pool(&self) -> Arc<ServerPool> {
        self.pool.clone()
    }
}
