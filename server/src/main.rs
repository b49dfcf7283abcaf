//! Arena Combat Server
//!
//! Authoritative matchmaking and battle simulation for trainer duels.

mod arena;
mod commands;
mod config;
mod context;
mod gate;
mod network;
mod persistence;
mod scheduler;
mod store;

use log::{error, info};
use tokio::sync::watch;

use arena_shared::{BATTLE_TICKS, SCHEDULER_TICK_RATE};

use crate::config::ArenaConfig;
use crate::context::ArenaContext;
use crate::network::Server;
use crate::store::Roster;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ArenaConfig::from_env();

    info!("Starting Arena Server...");
    info!("Tick rate: {} Hz, {} ticks per battle", SCHEDULER_TICK_RATE, BATTLE_TICKS);
    info!("Listening on port {}", config.port);

    // Initialize persistence (database + cache)
    let (roster, persistence) = match persistence::init(&config).await {
        Ok((handle, task, snapshot)) => {
            info!("Persistence layer initialized");
            (Roster::from_snapshot(snapshot).with_persistence(handle.clone()), Some((handle, task)))
        }
        Err(e) => {
            error!("Failed to initialize persistence: {}", e);
            error!("Server will run on the demo roster without saving");
            (Roster::demo(), None)
        }
    };

    let port = config.port;
    let grace = config.shutdown_grace;
    let handle = persistence.as_ref().map(|(handle, _)| handle.clone());
    let ctx = ArenaContext::new(config, Box::new(roster), handle);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create the network server
    let server = match Server::new(port, ctx.clone()).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to start server: {}", e);
            if let Some((handle, task)) = persistence {
                handle.shutdown(task, grace).await;
            }
            return;
        }
    };

    let scheduler = tokio::spawn(scheduler::run(ctx, shutdown_rx.clone()));
    let server = tokio::spawn(server.run(shutdown_rx));

    info!("Server started successfully!");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    if let Err(e) = scheduler.await {
        error!("Scheduler task failed: {}", e);
    }
    if let Err(e) = server.await {
        error!("Server task failed: {}", e);
    }

    if let Some((handle, task)) = persistence {
        if handle.shutdown(task, grace).await {
            info!("Pending writes flushed");
        }
    }
    info!("Server stopped");
}
