use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::info;

use geo_server::{
    config::Config, create_routes, hub::RoomHub, signing::JoinSigner, websocket::ConnectionManager,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    info!("Starting geo-arena server...");

    let config = Config::new();
    let connection_manager = Arc::new(ConnectionManager::new());
    let hub = Arc::new(RoomHub::new(
        config.room_defaults(),
        config.public_url.clone(),
        connection_manager.clone(),
    ));

    if config.signing_secret.is_none() {
        info!("SIGNING_SECRET unset; joins are accepted unverified");
    }
    let signer = Arc::new(JoinSigner::new(config.signing_secret.clone()));

    let routes = create_routes(hub.clone(), connection_manager.clone(), signer);

    // Periodic sweep of dead connections and idle rooms
    let sweep_connections = connection_manager.clone();
    let sweep_hub = hub.clone();
    let sweep_config = config.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            sweep_connections
                .cleanup_inactive_connections(Duration::from_secs(
                    sweep_config.connection_timeout_seconds,
                ))
                .await;
            sweep_hub
                .sweep_idle(Duration::from_secs(sweep_config.room_idle_seconds))
                .await;
        }
    });

    info!("Server starting on {}:{}", config.host, config.port);

    let addr = (
        config.host.parse::<std::net::IpAddr>().expect("Invalid HOST"),
        config.port,
    );

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        #[cfg(unix)]
        {
            let mut sigint =
                signal::unix::signal(signal::unix::SignalKind::interrupt()).expect("signal handler");
            let mut sigterm =
                signal::unix::signal(signal::unix::SignalKind::terminate()).expect("signal handler");

            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    });

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}
