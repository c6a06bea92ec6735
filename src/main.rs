//! Tank Arena Server - authoritative multiplayer game server
//!
//! Entry point wiring: configuration, the session manager, the game
//! controller's tick loop, the master heartbeat and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tank_arena_server::app::AppState;
use tank_arena_server::config::Config;
use tank_arena_server::game::controller::ControllerConfig;
use tank_arena_server::game::world::{ArenaData, World};
use tank_arena_server::game::{GameController, LoadMetrics};
use tank_arena_server::http::build_router;
use tank_arena_server::master::{HeartbeatClient, HttpMasterClient};
use tank_arena_server::net::NetworkManager;
use tank_arena_server::store::HttpProfileStore;
use tank_arena_server::util::shutdown::Shutdown;
use tank_arena_server::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(Config::from_env()?);

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    let server_id = Uuid::new_v4();
    info!("Starting Tank Arena Server");
    info!("Server id: {}", server_id);
    info!("Server address: {}", config.server_addr);

    let shutdown = Shutdown::new();

    // Cross-task plumbing: one inbound command queue, one load-metrics watch
    let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_queue_capacity);
    let (metrics_tx, metrics_rx) = watch::channel(LoadMetrics {
        tick: 0,
        current_players: 0,
        capacity: config.max_players as u32,
    });

    let manager = NetworkManager::new(inbound_tx, config.clone());
    let profiles = Arc::new(HttpProfileStore::new(&config));

    // The controller exclusively owns the world
    let arena_seed = config.arena_seed.unwrap_or_else(rand::random);
    let world = World::new(arena_seed, ArenaData::default());
    let controller = GameController::new(
        world,
        ControllerConfig::from_config(&config),
        inbound_rx,
        manager.clone(),
        profiles,
        metrics_tx,
        shutdown.subscribe(),
    );

    let controller_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let result = controller.run().await;
            if let Err(err) = &result {
                // Invariant violations mean undefined simulation state;
                // bring the whole process down
                error!(error = %err, "simulation fault, terminating");
            }
            shutdown.trigger();
            result
        }
    });

    // Heartbeat to the master server for discovery/matchmaking
    let heartbeat = HeartbeatClient::new(
        HttpMasterClient::new(&config.master_url),
        &config,
        server_id,
        metrics_rx.clone(),
        shutdown.subscribe(),
    );
    tokio::spawn(heartbeat.run());

    // HTTP surface: health endpoint plus the WebSocket entry point
    let state = AppState::new(config.clone(), manager.clone(), metrics_rx);
    let router = build_router(state);

    let listener = TcpListener::bind(config.server_addr).await?;
    info!("Server listening on {}", config.server_addr);
    info!("Health check: http://{}/health", config.server_addr);
    info!("WebSocket endpoint: ws://{}/ws", config.server_addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

    // Drain session writes, then wait for the controller's final tick
    shutdown.trigger();
    manager
        .shutdown(Duration::from_millis(config.shutdown_grace_ms))
        .await;

    match controller_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => return Err(err.into()),
        Err(err) => error!(error = %err, "controller task panicked"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolve when the process should stop: a termination signal from the
/// outside or an internal shutdown trigger (controller fault)
async fn shutdown_signal(shutdown: Shutdown) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let mut triggered = shutdown.subscribe();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
        _ = triggered.wait_for(|stop| *stop) => {
            info!("Internal shutdown requested");
        }
    }

    // Idempotent: signal-driven and internal paths converge here
    shutdown.trigger();
}
