//! csvfill API server implementation
//!
//! HTTP server using Axum. One template on disk, one fresh copy of it per
//! conversion.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::handlers;
use crate::convert::Converter;
use crate::types::DEFAULT_TEMPLATE_PATH;

/// Default upload limit (20 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// API Server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub template_path: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub version: String,
    pub converter: Converter,
}

impl AppState {
    pub fn new(converter: Converter) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            converter,
        }
    }
}

/// Build the router without binding a socket
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        .route("/api/v1/preview", post(handlers::preview))
        .route("/api/v1/convert", post(handlers::convert))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig) -> anyhow::Result<()> {
    // A host process may already own the global subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "csvfill_server=info,csvfill=info,tower_http=info".into()),
        )
        .try_init();

    // No template, no server
    let converter = match Converter::new(&config.template_path) {
        Ok(converter) => converter,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    let state = Arc::new(AppState::new(converter));
    let app = router(state, config.max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("📄 csvfill server starting on http://{}", addr);
    info!("   Template: {}", config.template_path.display());
    info!("   Endpoints: /api/v1/preview, /api/v1/convert");
    info!("   Health: /health, Version: /version");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("csvfill server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
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
                error!("failed to install signal handler: {}", e);
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

    info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== ApiConfig Tests ====================

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.template_path, PathBuf::from("template.xlsx"));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_config_address_format() {
        let config = ApiConfig {
            host: "192.168.1.100".to_string(),
            port: 9090,
            ..ApiConfig::default()
        };
        let addr_str = format!("{}:{}", config.host, config.port);
        let addr: SocketAddr = addr_str.parse().unwrap();
        assert_eq!(addr.port(), 9090);
    }

    // ==================== Startup Tests ====================

    #[tokio::test]
    async fn test_server_refuses_to_start_without_template() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ApiConfig {
            port: 0,
            template_path: dir.path().join("missing.xlsx"),
            ..ApiConfig::default()
        };
        let err = run_api_server(config).await.unwrap_err();
        assert!(err.to_string().contains("missing.xlsx"));
    }
}
