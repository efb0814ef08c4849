//! Arena task and authoritative tick loop
//!
//! One task owns the `World`. Connection handlers never touch state directly;
//! they send `GameCommand`s, and the task interleaves those with the tick and
//! the heartbeat sweep. Nothing else mutates the world, so no locks.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, PlayerId, ServerMsg};

use super::world::World;

/// Requests from connection handlers to the arena task
#[derive(Debug)]
pub enum GameCommand {
    Connect {
        player_id: PlayerId,
        outbound: mpsc::Sender<ServerMsg>,
    },
    Message {
        player_id: PlayerId,
        msg: ClientMsg,
    },
    /// Inbound traffic that carried no message (transport ping, rate-limited frame)
    Activity { player_id: PlayerId },
    Disconnect { player_id: PlayerId },
}

/// The arena task is gone; nothing more can be delivered
#[derive(Debug, thiserror::Error)]
#[error("arena task has stopped")]
pub struct ArenaClosed;

/// Handle to the running arena
#[derive(Clone)]
pub struct ArenaHandle {
    command_tx: mpsc::Sender<GameCommand>,
    player_count: Arc<AtomicUsize>,
    tick: Arc<AtomicU64>,
}

impl ArenaHandle {
    pub async fn send(&self, command: GameCommand) -> Result<(), ArenaClosed> {
        self.command_tx.send(command).await.map_err(|_| ArenaClosed)
    }

    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Last completed tick
    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }
}

/// The authoritative arena
pub struct Arena {
    world: World,
    command_rx: mpsc::Receiver<GameCommand>,
    tick_interval: Duration,
    heartbeat_sweep: Duration,
    heartbeat_timeout_ms: u64,
    player_count: Arc<AtomicUsize>,
    tick: Arc<AtomicU64>,
    /// Simulation step run each tick
    step: fn(&mut World, u64),
}

impl Arena {
    pub fn new(config: &Config) -> (Self, ArenaHandle) {
        Self::with_world(config, World::new(config.game, unix_millis()))
    }

    pub fn with_world(config: &Config, world: World) -> (Self, ArenaHandle) {
        let (command_tx, command_rx) = mpsc::channel(1024);
        let player_count = Arc::new(AtomicUsize::new(0));
        let tick = Arc::new(AtomicU64::new(0));

        let handle = ArenaHandle {
            command_tx,
            player_count: player_count.clone(),
            tick: tick.clone(),
        };

        let arena = Self {
            world,
            command_rx,
            tick_interval: config.tick_interval(),
            heartbeat_sweep: config.heartbeat_sweep,
            heartbeat_timeout_ms: config.heartbeat_timeout.as_millis() as u64,
            player_count,
            tick,
            step: World::tick,
        };

        (arena, handle)
    }

    #[cfg(test)]
    fn with_step(mut self, step: fn(&mut World, u64)) -> Self {
        self.step = step;
        self
    }

    /// Run until every handle has been dropped
    pub async fn run(mut self) {
        info!(tick_ms = self.tick_interval.as_millis() as u64, "Arena started");

        let mut tick_interval = interval(self.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut sweep_interval = interval_at(
            Instant::now() + self.heartbeat_sweep,
            self.heartbeat_sweep,
        );
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle_command(command);
                }
                _ = tick_interval.tick() => {
                    self.run_tick();
                }
                _ = sweep_interval.tick() => {
                    let removed = self
                        .world
                        .sweep_idle(unix_millis(), self.heartbeat_timeout_ms);
                    if removed > 0 {
                        info!(removed, "Heartbeat sweep dropped idle connections");
                    }
                }
            }

            self.player_count
                .store(self.world.player_count(), Ordering::Relaxed);
        }

        info!("Arena stopped");
    }

    fn handle_command(&mut self, command: GameCommand) {
        let now = unix_millis();
        match command {
            GameCommand::Connect {
                player_id,
                outbound,
            } => self.world.connect(player_id, outbound, now),
            GameCommand::Message { player_id, msg } => {
                debug!(player_id = %player_id, kind = msg.kind(), "Client message");
                self.world.handle_message(player_id, msg, now);
            }
            GameCommand::Activity { player_id } => self.world.touch(player_id, now),
            GameCommand::Disconnect { player_id } => {
                self.world.disconnect(player_id, now);
            }
        }
    }

    /// One tick. A panic inside the simulation is logged and the clock
    /// keeps running.
    fn run_tick(&mut self) {
        let now = unix_millis();
        let (world, step) = (&mut self.world, self.step);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| step(world, now))) {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(tick = self.world.tick_count(), reason = %reason, "Tick panicked");
        }
        self.tick.store(self.world.tick_count(), Ordering::Relaxed);
    }
}
