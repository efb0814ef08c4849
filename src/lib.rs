//! Arena Sync - authoritative state synchronization for multiplayer arena combat
//!
//! The server side (`game`, `ws`, `http`) owns the true state of every player
//! and projectile and broadcasts it at a fixed tick rate. The client side
//! (`prediction`) applies local input immediately and reconciles against
//! those broadcasts.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod prediction;
pub mod util;
pub mod ws;

use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;

use crate::app::AppState;
use crate::config::Config;
use crate::game::Arena;
use crate::http::build_router;

/// Serve the arena on `listener` until `shutdown` resolves.
///
/// Spawns the arena task, then runs the HTTP/WebSocket server on the
/// current runtime.
pub async fn run<F>(listener: TcpListener, config: Config, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (arena, handle) = Arena::new(&config);
    let arena_task = tokio::spawn(arena.run());

    let router = build_router(AppState::new(config, handle));

    info!(addr = %listener.local_addr()?, "Server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    // The router (and every handle it held) is gone; the arena winds down.
    arena_task.abort();
    Ok(())
}
