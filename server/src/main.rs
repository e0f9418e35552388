mod api;
mod logging;
mod state;

use std::path::PathBuf;

use log::info;
use tokio::net::TcpListener;
use whatif::load_config;

use state::AppState;

/// Environment variable naming the YAML configuration file.
const CONFIG_ENV_VAR: &str = "WHATIF_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    let config = load_config(config_path.as_deref())?;
    logging::init(&config.logging)?;

    info!("Starting whatif-server v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Using configuration {}", path.display()),
        None => info!("No {} set; using defaults", CONFIG_ENV_VAR),
    }

    let state = AppState::build(&config)?;
    if config.runner.auto_start {
        state.runner.start();
        info!("Job runner started");
    }

    let listener = TcpListener::bind(&config.server.bind).await?;
    info!("Listening on {}", listener.local_addr()?);

    let runner = state.runner.clone();
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runner.stop();
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
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
                log::error!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received, draining connections");
}
