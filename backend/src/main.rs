//! Kvitt Backend Service
//!
//! Main entry point for the Kvitt settlement backend.
//! This service provides:
//! - REST API for settlements, disputes, ledger views and payment hand-off
//! - WebSocket server for live settlement and ledger updates

use kvitt_backend::api;
use kvitt_backend::config::{AppConfig, LogFormat, StoreBackend};
use kvitt_backend::database::{self, run_migrations};
use kvitt_backend::repositories::{InMemoryStore, PgStore, SettlementStore};
use kvitt_backend::services::{
    AuditTrailService, HttpPaymentGateway, PaymentGateway, UnconfiguredGateway,
};
use kvitt_backend::websocket::WebSocketServer;
use kvitt_backend::{AppError, AppResult, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_filter().into());

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    init_tracing(&config);

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Kvitt Backend Service Starting                  ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("HTTP port: {}", config.http_port);
    if let Some(ws_port) = config.ws_port {
        info!("WebSocket port: {}", ws_port);
    }

    // =========================================================================
    // STORE SETUP
    // =========================================================================
    let store: Arc<dyn SettlementStore> = match config.store {
        StoreBackend::Postgres => {
            info!("Connecting to database...");

            let db = database::connect(&config).await.map_err(|e| {
                error!("Failed to create database pool: {}", e);
                AppError::Database(e)
            })?;

            info!("Database connection pool created successfully");

            // Run migrations
            info!("Running database migrations...");
            run_migrations(db.pool(), None).await.map_err(|e| {
                error!("Database migration failed: {}", e);
                AppError::Database(e)
            })?;
            info!("Database migrations completed successfully");

            Arc::new(PgStore::new(db.into_pool()))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is lost on shutdown");
            Arc::new(InMemoryStore::new())
        }
    };

    // =========================================================================
    // CORE SERVICES INITIALIZATION
    // =========================================================================
    info!("Initializing core services...");

    let gateway: Arc<dyn PaymentGateway> = match &config.payment_gateway_url {
        Some(url) => {
            info!("✓ Payment gateway at {}", url);
            Arc::new(
                HttpPaymentGateway::new(url.clone())
                    .with_timeout(config.payment_gateway_timeout()),
            )
        }
        None => {
            warn!("PAYMENT_GATEWAY_URL not configured - checkout requests will fail");
            Arc::new(UnconfiguredGateway)
        }
    };

    let audit = match &config.audit_log_dir {
        Some(dir) => Arc::new(AuditTrailService::new(dir).map_err(|e| {
            error!("Failed to initialize audit trail: {}", e);
            AppError::Message(format!("Audit trail initialization failed: {}", e))
        })?),
        None => {
            info!("AUDIT_LOG_DIR not configured - audit trail disabled");
            Arc::new(AuditTrailService::disabled())
        }
    };

    let ws_server = Arc::new(WebSocketServer::new());
    info!("✓ WebSocket server initialized");

    let app_state = Arc::new(AppState::new(store, gateway, ws_server.clone(), audit));
    info!("✓ Application state initialized");

    // =========================================================================
    // START SERVERS
    // =========================================================================
    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let http_listener = TcpListener::bind(http_addr)
        .await
        .map_err(|e| AppError::Message(format!("Failed to bind HTTP server: {}", e)))?;

    let router = api::create_router(app_state.clone());
    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, router).await {
            error!("HTTP server error: {}", e);
        }
    });
    info!("✓ HTTP server started on {}", http_addr);

    // Start WebSocket server (if WS port is configured)
    let ws_handle = if let Some(ws_port) = config.ws_port {
        let ws_addr = SocketAddr::from(([0, 0, 0, 0], ws_port));

        let ws_server_clone = ws_server.clone();
        let listener = TcpListener::bind(ws_addr).await.map_err(|e| {
            AppError::Message(format!("Failed to bind WebSocket server: {}", e))
        })?;

        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        info!("New WebSocket connection from {}", addr);
                        let ws = ws_server_clone.clone();
                        tokio::spawn(async move {
                            if let Err(e) = ws.handle_connection(stream).await {
                                error!("WebSocket connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("WebSocket accept error: {}", e);
                    }
                }
            }
        });

        info!("✓ WebSocket server started on {}", ws_addr);
        Some(handle)
    } else {
        warn!("WS_PORT not configured - WebSocket server not started");
        None
    };

    // =========================================================================
    // READY
    // =========================================================================
    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Kvitt Backend Service Ready!                    ║");
    info!("╠══════════════════════════════════════════════════════════╣");
    info!("║  REST API:     0.0.0.0:{}                              ║", config.http_port);
    if let Some(ws_port) = config.ws_port {
        info!("║  WebSocket:    0.0.0.0:{}                              ║", ws_port);
    }
    info!("║  Environment:  {}                                    ║", config.environment);
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = http_handle => {
            error!("HTTP server exited unexpectedly");
        }
        _ = async {
            if let Some(handle) = ws_handle {
                handle.await.ok();
            } else {
                // Never completes if WebSocket is not running
                futures::future::pending::<()>().await;
            }
        } => {
            error!("WebSocket server exited unexpectedly");
        }
    }

    info!("Kvitt backend service shutdown complete");
    Ok(())
}
