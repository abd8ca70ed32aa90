//! Maze Authority Server
//!
//! Runs the WebSocket room server and the HTTP boundary side by side.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use maze_authority::network::{serve_http, AppState, GameServer, ServerConfig};
use maze_authority::store::Store;
use maze_authority::{TICK_RATE, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config = ServerConfig::from_env();
    info!("Maze Authority Server v{}", VERSION);
    info!(
        "Tick Rate: {} Hz (default {}), maze {}x{}",
        config.room.tick_rate, TICK_RATE, config.room.maze_width, config.room.maze_height
    );

    let store = match config.redis_url.as_deref() {
        Some(url) => match Store::dragonfly(url).await {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "Dragonfly unavailable, falling back to in-memory store");
                Store::memory()
            }
        },
        None => Store::memory(),
    };
    info!(backend = store.backend(), "store ready");

    let state = Arc::new(AppState::new(config, store).context("building server state")?);

    let http_listener = TcpListener::bind(state.config.http_addr)
        .await
        .with_context(|| format!("binding HTTP on {}", state.config.http_addr))?;
    let server = GameServer::new(Arc::clone(&state));

    tokio::select! {
        result = server.run() => result.context("WebSocket server")?,
        result = serve_http(Arc::clone(&state), http_listener) => result.context("HTTP server")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            server.shutdown();
        }
    }

    Ok(())
}
