//! Synchronous authoritative core
//!
//! `World` owns the state store and applies every mutation: connection
//! lifecycle, inbound messages, the fixed-rate tick and the heartbeat sweep.
//! It never awaits and takes `now` (unix millis) as an argument, so the
//! async driver in `arena` is the only place that knows about real time.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::util::time::delta_secs;
use crate::ws::protocol::{
    ClientMsg, ConnectedPayload, DamageRequest, PlayerId, PongPayload, RespawnRequest, ServerMsg,
    Vec3,
};

use super::combat;
use super::player::{Player, GROUND_Y, MAX_HEALTH, SPAWN_POSITION};
use super::snapshot;
use super::store::{Connection, StateStore};
use super::validator;

pub struct World {
    store: StateStore,
    config: GameConfig,
    rng: ChaCha8Rng,
    tick: u64,
    last_tick_at: u64,
}

impl World {
    pub fn new(config: GameConfig, now: u64) -> Self {
        Self::with_rng(config, ChaCha8Rng::from_entropy(), now)
    }

    /// Deterministic respawn positions, for tests and replays
    pub fn with_seed(config: GameConfig, seed: u64, now: u64) -> Self {
        Self::with_rng(config, ChaCha8Rng::seed_from_u64(seed), now)
    }

    fn with_rng(config: GameConfig, rng: ChaCha8Rng, now: u64) -> Self {
        Self {
            store: StateStore::new(),
            config,
            rng,
            tick: 0,
            last_tick_at: now,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn player_count(&self) -> usize {
        self.store.player_count()
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    /// Register a new connection and its player.
    ///
    /// The new client learns its id first, then everyone (itself included)
    /// receives a full snapshot.
    pub fn connect(&mut self, player_id: PlayerId, outbound: mpsc::Sender<ServerMsg>, now: u64) {
        self.store
            .set_player(Player::new(player_id, SPAWN_POSITION, now));
        self.store
            .register_connection(Connection::new(player_id, outbound, now));

        info!(player_id = %player_id, players = self.store.player_count(), "Player connected");

        self.send_to(
            player_id,
            ServerMsg::PlayerConnected(ConnectedPayload {
                id: player_id,
                position: SPAWN_POSITION,
            }),
        );
        self.broadcast_state(now);
    }

    /// Remove a client and tell everyone else. Returns false if it was
    /// already gone.
    pub fn disconnect(&mut self, player_id: PlayerId, now: u64) -> bool {
        if !self.store.remove_client(&player_id) {
            return false;
        }
        info!(player_id = %player_id, players = self.store.player_count(), "Player disconnected");
        self.broadcast_state(now);
        true
    }

    /// Record inbound traffic for the heartbeat sweep
    pub fn touch(&mut self, player_id: PlayerId, now: u64) {
        if let Some(conn) = self.store.connection_mut(&player_id) {
            conn.last_seen = now;
        }
    }

    /// Drop every connection that has been silent for longer than `timeout_ms`
    pub fn sweep_idle(&mut self, now: u64, timeout_ms: u64) -> usize {
        let stale: Vec<PlayerId> = self
            .store
            .connections()
            .filter(|c| c.is_stale(now, timeout_ms))
            .map(|c| c.player_id)
            .collect();

        for player_id in &stale {
            info!(player_id = %player_id, "Heartbeat timeout");
            self.disconnect(*player_id, now);
        }
        stale.len()
    }

    // ========================================================================
    // Inbound messages
    // ========================================================================

    pub fn handle_message(&mut self, player_id: PlayerId, msg: ClientMsg, now: u64) {
        if self.store.connection_mut(&player_id).is_none() {
            debug!(player_id = %player_id, kind = msg.kind(), "Message from unknown connection");
            return;
        }
        self.touch(player_id, now);

        match msg {
            ClientMsg::PlayerUpdate(update) => {
                let Some(player) = self.store.player_mut(&player_id) else {
                    return;
                };
                let outcome = validator::apply_update(player, &update, &self.config);
                if outcome.wants_death() {
                    if let Some(event) = combat::kill(player, None, now, &self.config) {
                        self.broadcast(&event);
                    }
                }
            }
            ClientMsg::ProjectileSpawn(spawn) => {
                let projectile = match validator::validate_projectile(
                    &spawn,
                    player_id,
                    self.config.max_projectile_speed,
                    now,
                ) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(player_id = %player_id, projectile_id = %spawn.id, error = %e, "Rejected projectile");
                        return;
                    }
                };
                let echo = ServerMsg::ProjectileSpawn(projectile.snapshot());
                if !self.store.set_projectile(projectile) {
                    warn!(player_id = %player_id, projectile_id = %spawn.id, "Duplicate projectile id");
                    return;
                }
                debug!(player_id = %player_id, projectile_id = %spawn.id, "Projectile spawned");
                self.broadcast(&echo);
            }
            ClientMsg::PlayerAttack => {
                let duration = self.config.attack_duration_ms;
                if let Some(player) = self.store.player_mut(&player_id) {
                    if player.is_alive() {
                        player.is_attacking = true;
                        player.attack_until = Some(now + duration);
                    }
                }
            }
            ClientMsg::PlayerDamage(request) => self.handle_damage(player_id, request, now),
            ClientMsg::PlayerDeath => {
                let Some(player) = self.store.player_mut(&player_id) else {
                    return;
                };
                if let Some(event) = combat::kill(player, None, now, &self.config) {
                    self.broadcast(&event);
                }
            }
            ClientMsg::PlayerRespawn(request) => self.handle_respawn(player_id, request, now),
            ClientMsg::Ping(ping) => {
                let pong = ServerMsg::Pong(PongPayload {
                    client_time: ping.timestamp,
                    server_time: now,
                    server_tick: self.tick,
                });
                self.send_to(player_id, pong);
            }
        }
    }

    fn handle_damage(&mut self, attacker_id: PlayerId, request: DamageRequest, now: u64) {
        if request.target_id == attacker_id {
            debug!(player_id = %attacker_id, "Ignored self-damage");
            return;
        }
        if !request.amount.is_finite() || request.amount <= 0.0 {
            warn!(player_id = %attacker_id, amount = request.amount, "Invalid damage amount");
            return;
        }
        let amount = request.amount.round().min(MAX_HEALTH as f32) as u32;
        if amount == 0 {
            return;
        }

        let events = combat::apply_damage(
            &mut self.store,
            request.target_id,
            amount,
            Some(attacker_id),
            now,
            &self.config,
        );
        for event in &events {
            self.broadcast(event);
        }
    }

    fn handle_respawn(&mut self, player_id: PlayerId, request: RespawnRequest, now: u64) {
        let Some(player) = self.store.player_mut(&player_id) else {
            return;
        };
        if player.is_alive() {
            debug!(player_id = %player_id, "Respawn request while alive ignored");
            return;
        }

        // Only a granted respawn may draw from the rng
        let position = request
            .position
            .and_then(validator::validate_respawn_position)
            .unwrap_or_else(|| combat::random_spawn(&mut self.rng));

        let event = combat::respawn(player, position, now);
        self.broadcast(&event);
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance the simulation by one step and broadcast the result
    pub fn tick(&mut self, now: u64) {
        self.tick += 1;
        let dt = delta_secs(self.last_tick_at, now, self.config.max_tick_delta);
        self.last_tick_at = now;

        self.constrain_players(now);
        self.update_projectiles(dt, now);

        let mut events = Vec::new();
        for hit in combat::resolve_projectile_hits(&mut self.store, &self.config) {
            debug!(projectile_id = %hit.projectile_id, target_id = %hit.target_id, "Projectile hit");
            events.extend(combat::apply_damage(
                &mut self.store,
                hit.target_id,
                self.config.projectile_damage,
                hit.shooter_id,
                now,
                &self.config,
            ));
        }
        self.store.retain_projectiles(|p| p.active);

        events.extend(combat::respawn_due(&mut self.store, now, &mut self.rng));

        for event in &events {
            self.broadcast(event);
        }
        self.broadcast_state(now);
    }

    /// Ground constraint, stuck-in-air recovery and attack expiry
    fn constrain_players(&mut self, now: u64) {
        let config = self.config;
        for player in self.store.players_mut() {
            if player.attack_until.is_some_and(|until| now >= until) {
                player.is_attacking = false;
                player.attack_until = None;
            }

            if !player.is_alive() {
                continue;
            }

            if player.position.y < GROUND_Y {
                player.position.y = GROUND_Y;
            }

            if (player.position.y - player.last_y).abs() > config.stuck_epsilon {
                player.last_y = player.position.y;
                player.last_y_change_at = now;
            } else if player.position.y > config.stuck_height
                && now.saturating_sub(player.last_y_change_at) > config.stuck_timeout_ms
            {
                warn!(player_id = %player.id, y = player.position.y, "Player stuck in air, grounding");
                let grounded = Vec3 {
                    y: GROUND_Y,
                    ..player.position
                };
                player.teleport(grounded, now);
            }
        }
    }

    fn update_projectiles(&mut self, dt: f32, now: u64) {
        for projectile in self.store.projectiles_mut() {
            if projectile.active {
                projectile.advance(dt);
            }
        }
        let lifetime = self.config.projectile_lifetime_ms;
        self.store
            .retain_projectiles(|p| !p.should_remove(now, lifetime));
    }

    // ========================================================================
    // Fan-out
    // ========================================================================

    fn broadcast_state(&mut self, now: u64) {
        let state = snapshot::build(&self.store, self.tick, now);
        self.broadcast(&state);
    }

    /// Queue `msg` on every connection. A connection whose queue is full or
    /// closed is torn down; the rest still receive the message.
    fn broadcast(&mut self, msg: &ServerMsg) {
        let failed: Vec<PlayerId> = self
            .store
            .connections()
            .filter(|conn| conn.outbound.try_send(msg.clone()).is_err())
            .map(|conn| conn.player_id)
            .collect();

        for player_id in failed {
            self.drop_unreachable(player_id, msg.kind());
        }
    }

    fn send_to(&mut self, player_id: PlayerId, msg: ServerMsg) {
        let kind = msg.kind();
        let Some(conn) = self.store.connection_mut(&player_id) else {
            return;
        };
        if conn.outbound.try_send(msg).is_err() {
            self.drop_unreachable(player_id, kind);
        }
    }

    /// The next snapshot reflects the removal; no extra broadcast here.
    fn drop_unreachable(&mut self, player_id: PlayerId, kind: &'static str) {
        warn!(player_id = %player_id, kind, "Send failed, dropping connection");
        self.store.remove_client(&player_id);
    }
}
