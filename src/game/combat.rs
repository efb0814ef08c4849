//! Combat system - projectile hits, damage, death and respawn
//!
//! Player lifecycle: `alive -> (damage)* -> dead -> (respawn) -> alive`.
//! Entering `dead` is idempotent: a player that is already dead gets no
//! second death event and no second respawn deadline.

use rand::Rng;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::ws::protocol::{
    Animation, DamageEvent, DeathEvent, PlayerId, RespawnEvent, ServerMsg, Vec3,
};

use super::player::{Player, GROUND_Y};
use super::store::StateStore;

/// Half-width of the square respawn area around the origin
pub const SPAWN_SPREAD: f32 = 20.0;

/// A projectile that connected with a player this tick
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub projectile_id: String,
    pub shooter_id: Option<PlayerId>,
    pub target_id: PlayerId,
}

/// Scan active projectiles against live players and deactivate every
/// projectile that hit something.
///
/// Each projectile hits at most one player: the nearest one inside the
/// radius, with exact ties going to the lowest player id. A projectile never
/// hits its owner.
pub fn resolve_projectile_hits(store: &mut StateStore, config: &GameConfig) -> Vec<HitResult> {
    let radius_sq = config.hit_radius * config.hit_radius;
    let (projectiles, players) = store.projectiles_and_players_mut();
    let mut hits = Vec::new();

    for projectile in projectiles.iter_mut() {
        if !projectile.active {
            continue;
        }

        let target = players
            .values()
            .filter(|p| p.is_alive() && Some(p.id) != projectile.owner_id)
            .map(|p| (p.position.distance_sq(projectile.position), p.id))
            .filter(|(dist_sq, _)| *dist_sq < radius_sq)
            .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        if let Some((_, target_id)) = target {
            projectile.active = false;
            hits.push(HitResult {
                projectile_id: projectile.id.clone(),
                shooter_id: projectile.owner_id,
                target_id,
            });
        }
    }

    hits
}

/// Apply `amount` damage to a live target.
///
/// Returns the events to broadcast: a damage event, followed by a death
/// event if this hit was lethal. Dead or missing targets produce nothing.
pub fn apply_damage(
    store: &mut StateStore,
    target_id: PlayerId,
    amount: u32,
    attacker_id: Option<PlayerId>,
    now: u64,
    config: &GameConfig,
) -> Vec<ServerMsg> {
    let mut events = Vec::new();
    let Some(target) = store.player_mut(&target_id) else {
        return events;
    };
    if !target.is_alive() {
        return events;
    }

    let health = target.take_damage(amount);
    debug!(target_id = %target_id, attacker_id = ?attacker_id, amount, health, "Damage applied");

    events.push(ServerMsg::PlayerDamage(DamageEvent {
        target_id,
        attacker_id,
        amount,
        health,
    }));

    if health == 0 {
        events.extend(kill(target, attacker_id, now, config));
    }

    events
}

/// Transition a player to `dead` and schedule its respawn.
///
/// No-op (returns `None`) if the player is already dead, so simultaneous
/// lethal hits never double-schedule.
pub fn kill(
    player: &mut Player,
    killer_id: Option<PlayerId>,
    now: u64,
    config: &GameConfig,
) -> Option<ServerMsg> {
    if player.is_dead {
        return None;
    }

    player.health = 0;
    player.is_dead = true;
    player.is_attacking = false;
    player.attack_until = None;
    player.animation = Animation::Death;
    player.respawn_at = Some(now + config.respawn_delay_ms);

    info!(player_id = %player.id, killer_id = ?killer_id, respawn_at = now + config.respawn_delay_ms, "Player died");

    Some(ServerMsg::PlayerDeath(DeathEvent {
        player_id: player.id,
        killer_id,
    }))
}

/// Bring a dead player back at `position`
pub fn respawn(player: &mut Player, position: Vec3, now: u64) -> ServerMsg {
    player.revive(position, now);

    info!(player_id = %player.id, x = position.x, z = position.z, "Player respawned");

    ServerMsg::PlayerRespawn(RespawnEvent {
        player_id: player.id,
        position: player.position,
        health: player.health,
    })
}

/// Respawn every player whose deadline has passed.
///
/// Runs inside the tick, so a player that disconnected while dead is simply
/// no longer in the store and nothing happens.
pub fn respawn_due<R: Rng>(store: &mut StateStore, now: u64, rng: &mut R) -> Vec<ServerMsg> {
    let mut events = Vec::new();
    for player in store.players_mut() {
        if player.respawn_at.is_some_and(|at| at <= now) {
            let position = random_spawn(rng);
            events.push(respawn(player, position, now));
        }
    }
    events
}

/// Random ground-level point inside the spawn square
pub fn random_spawn<R: Rng>(rng: &mut R) -> Vec3 {
    Vec3::new(
        rng.gen_range(-SPAWN_SPREAD..SPAWN_SPREAD),
        GROUND_Y,
        rng.gen_range(-SPAWN_SPREAD..SPAWN_SPREAD),
    )
}
