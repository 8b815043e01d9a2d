use anyhow::Result;
use clap::Parser;
use clickstat::config::AppConfig;
use clickstat::http::app_server::AppServer;
use clickstat::telemetry;
use clickstat::ClickEngine;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "clickstat-server", about = "Banner click counter HTTP server")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let now = Instant::now();
    telemetry::init_telemetry().map_err(|e| anyhow::anyhow!(e))?;

    let cli = Cli::parse();

    tracing::info!("Starting clickstat server");

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;

    // Storage must be reachable before we accept any clicks.
    let engine = ClickEngine::from_config(&config).await?;

    tracing::info!(storage = %config.storage.storage_type, "Engine initialized");

    let app = AppServer::new(engine);
    let engine = app.engine.clone();

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server started in {}ms", now.elapsed().as_millis());
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app.router)
        .with_graceful_shutdown(shutdown())
        .await?;

    // Ingress is closed; drain the queue and flush before releasing the pool.
    if let Err(e) = engine.shutdown().await {
        tracing::error!("Error during engine shutdown: {}", e);
    }

    tracing::info!("Server shutdown complete");
    telemetry::shutdown_telemetry();

    Ok(())
}

async fn shutdown() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server...");
}
