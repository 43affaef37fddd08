//! csvflow Server - Main entry point

use anyhow::Result;
use csvflow_common::logging::{init_logging, LogConfig};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{info, warn};

use csvflow_server::{
    api::{self, AppState},
    config::Config,
    db,
    ingest::{JobStore, MemoryJobStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Defaults for this binary; LOG_* environment variables take precedence
    let log_config = LogConfig::builder()
        .log_file_prefix("csvflow-server")
        .filter_directives("csvflow_server=debug,tower_http=debug,sqlx=info")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting csvflow server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let store = connect_store(&config).await?;
    let state = AppState::new(store, &config);
    let dispatcher = state.dispatcher.clone();

    let app = api::create_router(state, &config);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let dispatcher = dispatcher.clone();
            async move {
                shutdown_signal().await;
                // Open progress streams end once their jobs reach a terminal state
                dispatcher.cancel_all();
            }
        })
        .await?;

    // Stop accepting work, cancel running pipelines and let them record their terminal state
    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    info!(
        in_flight = dispatcher.in_flight(),
        "Waiting up to {} seconds for CSV pipelines to stop",
        timeout.as_secs()
    );
    if !dispatcher.shutdown(timeout).await {
        warn!("Some CSV pipelines did not stop before the shutdown timeout");
    }

    info!("Server shut down gracefully");

    Ok(())
}

/// Connect to PostgreSQL when configured, otherwise keep jobs in memory
async fn connect_store(config: &Config) -> Result<Arc<dyn JobStore>> {
    if config.database.url.is_none() {
        info!("Using in-memory job store");
        return Ok(Arc::new(MemoryJobStore::new()));
    }

    let pool = db::create_pool(&config.database).await?;
    info!("Database connection pool established");

    db::run_migrations(&pool).await?;
    info!("Database migrations completed");

    Ok(Arc::new(db::PgJobStore::new(pool)))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = signal_or_pending("Ctrl+C", signal::ctrl_c());

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}

/// Resolve when `signal` fires; a handler that failed to install never resolves
async fn signal_or_pending<F, E>(name: &str, signal: F)
where
    F: std::future::Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    if let Err(e) = signal.await {
        tracing::error!("Failed to install {} handler: {}", name, e);
        std::future::pending::<()>().await;
    }
}
