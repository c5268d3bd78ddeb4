// flrts-gateway - Telegram automation gateway for BigSir FLRTS

use anyhow::Result;
use clap::Parser;
use flrts_gateway::cli::Args;
use flrts_gateway::config::AppConfig;
use flrts_gateway::monitor::{self, AlertSink};
use flrts_gateway::parser_log::{InMemoryParserLogStore, ParserLogStore};
use flrts_gateway::server::create_router;
use flrts_gateway::telegram::TelegramClient;
use flrts_gateway::utils::logging;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let config = AppConfig::load(args.config.as_deref())?;

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!(
        "Starting flrts-gateway v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.logging.environment
    );

    // Phase 3: Construct the Telegram client and the parser log store
    let telegram = Arc::new(TelegramClient::new(
        &config.telegram,
        config.retry.policy(),
    )?);
    let parser_logs: Arc<dyn ParserLogStore> = Arc::new(InMemoryParserLogStore::new());

    // Phase 4: Spawn the scheduled monitors
    let alert_sink = Arc::new(AlertSink::from_config(&config.monitor, telegram.clone()));
    let _monitors = monitor::spawn(parser_logs.clone(), config.monitor.clone(), alert_sink);

    // Phase 5: Build and start the HTTP server
    let app = create_router(config.clone(), telegram, parser_logs)?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Phase 6: Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
