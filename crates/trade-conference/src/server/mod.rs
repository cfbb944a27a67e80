//! HTTP server for the conference pipeline

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ConferenceConfig;
use crate::error::{Error, Result};
use state::AppState;

/// How long in-flight files get to finish after shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Conference HTTP server
pub struct ConferenceServer {
    config: ConferenceConfig,
    state: AppState,
    shutdown: CancellationToken,
}

impl ConferenceServer {
    /// Create a new server; workers start immediately
    pub async fn new(config: ConferenceConfig, shutdown: CancellationToken) -> Result<Self> {
        let state = AppState::new(config.clone(), shutdown.clone()).await?;
        Ok(Self {
            config,
            state,
            shutdown,
        })
    }

    /// Build the router with all routes
    fn build_router(&self) -> Router {
        router(self.state.clone(), self.config.server.enable_cors)
    }

    /// Serve until the shutdown token fires, then drain the workers
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting conference server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        let shutdown = self.shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        tracing::info!("HTTP server stopped, waiting for workers");
        self.state.wait_for_workers(SHUTDOWN_GRACE).await;
        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Router over an existing state
pub fn router(state: AppState, enable_cors: bool) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .nest("/api", routes::api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(state: axum::extract::State<AppState>) -> axum::http::StatusCode {
    if state.is_ready() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}
