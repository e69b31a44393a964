use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use audit_proxy::cli::Cli;
use audit_proxy::http::{HyperTransport, ProxyServer};
use audit_proxy::lifecycle::{signals, Shutdown};
use audit_proxy::net::Listener;
use audit_proxy::observability::{logging, metrics};
use audit_proxy::persistence::open_sink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    logging::init_logging(&config.observability);

    tracing::info!("audit-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        sink = ?config.persistence.backend,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let sink = open_sink(&config.persistence)?;
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_listener(shutdown.clone());

    let server = ProxyServer::new(config, sink, Arc::new(HyperTransport::new()));
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
