use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use slogx::{AppState, Attr, Config, CountingAllocator, build_router, utils};

#[global_allocator]
static ALLOC: CountingAllocator = CountingAllocator;

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics of the logging stack itself
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting slogx demo v{}", env!("CARGO_PKG_VERSION"));

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        log_format = %config.log_format,
        log_file = %config.log_file,
        "Configuration loaded"
    );

    // Exits with CANTCREAT if the log file cannot be opened
    let logger = config.logger_builder().build();

    let state = AppState::new(logger.clone(), config.clone());
    let app = build_router(state.clone());

    // Start server
    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    logger.info(
        "Server listening",
        vec![Attr::string("addr", format!("http://{addr}"))],
    );

    // Peer addresses feed the access log's IP fallback
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(utils::shutdown_signal(CancellationToken::new()))
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    info!("HTTP server stopped, shutting down background tasks...");
    state.shutdown().await;

    logger.info("Server shutdown complete", vec![]);
    Ok(())
}
