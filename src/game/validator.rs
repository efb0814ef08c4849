//! Anti-cheat boundary for inbound client state
//!
//! Nothing a client sends reaches the store without passing through here.
//! Bad fields are dropped one by one; a too-long move is rejected as a unit.

use tracing::{debug, warn};

use crate::config::GameConfig;
use crate::ws::protocol::{PlayerId, PlayerUpdate, ProjectileSpawn, Vec3, MAX_PROJECTILE_ID_LEN};

use super::player::{Player, GROUND_Y, MAX_HEALTH};
use super::projectile::Projectile;

/// What a merged PLAYER_UPDATE asks the caller to do next
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpdateOutcome {
    /// Position was present but moved further than allowed
    pub position_rejected: bool,
    /// Client lowered its own health to zero
    pub health_depleted: bool,
    /// Client reported `isDead: true`
    pub reported_death: bool,
}

impl UpdateOutcome {
    /// Either form of self-inflicted death
    pub fn wants_death(&self) -> bool {
        self.health_depleted || self.reported_death
    }
}

/// Merge a client's partial update into the authoritative player
pub fn apply_update(
    player: &mut Player,
    update: &PlayerUpdate,
    config: &GameConfig,
) -> UpdateOutcome {
    let mut outcome = UpdateOutcome::default();

    if let Some(patch) = &update.position {
        let mut proposed = patch.merge(player.position);
        proposed.y = proposed.y.max(GROUND_Y);

        let distance = proposed.distance(player.position);
        if distance > config.max_move_distance {
            warn!(
                player_id = %player.id,
                distance,
                max = config.max_move_distance,
                "Rejected position update: moved too far"
            );
            outcome.position_rejected = true;
        } else {
            player.position = proposed;
        }
    }

    if let Some(patch) = &update.rotation {
        player.rotation = patch.merge(player.rotation);
    }

    // Clients may only report damage they took, never heal themselves
    if let Some(reported) = update.health {
        let reported = reported.round().clamp(0.0, MAX_HEALTH as f32) as u32;
        if reported < player.health {
            debug!(player_id = %player.id, from = player.health, to = reported, "Client lowered health");
            player.health = reported;
            outcome.health_depleted = reported == 0 && player.is_alive();
        }
    }

    if update.is_dead == Some(true) && player.is_alive() {
        outcome.reported_death = true;
    }

    if let Some(animation) = update.animation {
        player.animation = animation;
    }

    if let Some(is_attacking) = update.is_attacking {
        player.is_attacking = is_attacking;
    }

    if let Some(sequence) = update.sequence {
        player.acknowledge_input(sequence);
    }

    outcome
}

/// Why a PROJECTILE_SPAWN was refused
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectileRejection {
    #[error("projectile id is empty")]
    EmptyId,

    #[error("projectile id exceeds {} characters", MAX_PROJECTILE_ID_LEN)]
    IdTooLong,

    #[error("position or velocity is not finite")]
    NonFinite,

    #[error("velocity is zero")]
    ZeroVelocity,

    #[error("speed exceeds {max}")]
    TooFast { max: f32 },
}

/// Structural checks on a client-spawned projectile.
///
/// Ownership is pinned to the sender; a client cannot fire on someone
/// else's behalf.
pub fn validate_projectile(
    spawn: &ProjectileSpawn,
    sender: PlayerId,
    max_speed: f32,
    now: u64,
) -> Result<Projectile, ProjectileRejection> {
    if spawn.id.is_empty() {
        return Err(ProjectileRejection::EmptyId);
    }
    if spawn.id.chars().count() > MAX_PROJECTILE_ID_LEN {
        return Err(ProjectileRejection::IdTooLong);
    }
    if !spawn.position.is_finite() || !spawn.velocity.is_finite() {
        return Err(ProjectileRejection::NonFinite);
    }
    if spawn.velocity.length_sq() == 0.0 {
        return Err(ProjectileRejection::ZeroVelocity);
    }
    // length_sq overflows to inf for huge components, which also fails here
    if spawn.velocity.length_sq() > max_speed * max_speed {
        return Err(ProjectileRejection::TooFast { max: max_speed });
    }

    if spawn.owner_id.is_some_and(|owner| owner != sender) {
        warn!(player_id = %sender, claimed_owner = ?spawn.owner_id, "Projectile owner overridden");
    }

    Ok(Projectile::new(
        spawn.id.clone(),
        Some(sender),
        spawn.position,
        spawn.velocity,
        now,
    ))
}

/// Sanitize a client-chosen respawn point
pub fn validate_respawn_position(position: Vec3) -> Option<Vec3> {
    if !position.is_finite() {
        return None;
    }
    Some(Vec3::new(position.x, position.y.max(GROUND_Y), position.z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::SPAWN_POSITION;
    use crate::ws::protocol::{Animation, Vec3Patch};
    use uuid::Uuid;

    fn player() -> Player {
        Player::new(Uuid::new_v4(), SPAWN_POSITION, 0)
    }

    fn move_to(x: f32, y: f32, z: f32) -> PlayerUpdate {
        PlayerUpdate {
            position: Some(Vec3::new(x, y, z).into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_teleport_rejected() {
        let mut p = player();
        let outcome = apply_update(&mut p, &move_to(50.0, 0.0, 0.0), &GameConfig::default());
        assert!(outcome.position_rejected);
        assert_eq!(p.position, Vec3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_move_within_cap_accepted() {
        let mut p = player();
        let outcome = apply_update(&mut p, &move_to(6.0, 0.0, 8.0), &GameConfig::default());
        assert!(!outcome.position_rejected);
        assert_eq!(p.position, Vec3::new(6.0, 0.0, 8.0));
    }

    #[test]
    fn test_cap_is_strictly_greater_than() {
        let mut p = player();
        apply_update(&mut p, &move_to(10.0, 0.0, 0.0), &GameConfig::default());
        assert_eq!(p.position.x, 10.0);
    }

    #[test]
    fn test_rejected_position_still_applies_other_fields() {
        let mut p = player();
        let update = PlayerUpdate {
            animation: Some(Animation::Run),
            sequence: Some(3),
            ..move_to(0.0, 0.0, 99.0)
        };
        let outcome = apply_update(&mut p, &update, &GameConfig::default());
        assert!(outcome.position_rejected);
        assert_eq!(p.animation, Animation::Run);
        assert_eq!(p.last_processed_input, 3);
    }

    #[test]
    fn test_negative_height_clamped() {
        let mut p = player();
        apply_update(&mut p, &move_to(1.0, -4.0, 0.0), &GameConfig::default());
        assert_eq!(p.position, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_partial_position_keeps_missing_axes() {
        let mut p = player();
        p.position = Vec3::new(1.0, 2.0, 3.0);
        let update = PlayerUpdate {
            position: Some(Vec3Patch {
                x: Some(4.0),
                y: None,
                z: None,
            }),
            ..Default::default()
        };
        apply_update(&mut p, &update, &GameConfig::default());
        assert_eq!(p.position, Vec3::new(4.0, 2.0, 3.0));
    }

    #[test]
    fn test_health_can_only_drop() {
        let mut p = player();
        p.health = 40;
        let heal = PlayerUpdate {
            health: Some(100.0),
            ..Default::default()
        };
        apply_update(&mut p, &heal, &GameConfig::default());
        assert_eq!(p.health, 40);

        let hurt = PlayerUpdate {
            health: Some(-20.0),
            ..Default::default()
        };
        let outcome = apply_update(&mut p, &hurt, &GameConfig::default());
        assert_eq!(p.health, 0);
        assert!(outcome.health_depleted);
        assert!(outcome.wants_death());
    }

    #[test]
    fn test_is_dead_false_ignored() {
        let mut p = player();
        p.is_dead = true;
        let update = PlayerUpdate {
            is_dead: Some(false),
            ..Default::default()
        };
        let outcome = apply_update(&mut p, &update, &GameConfig::default());
        assert!(p.is_dead);
        assert!(!outcome.reported_death);
    }

    #[test]
    fn test_sequence_never_goes_backwards() {
        let mut p = player();
        for seq in [5, 9, 2] {
            let update = PlayerUpdate {
                sequence: Some(seq),
                ..Default::default()
            };
            apply_update(&mut p, &update, &GameConfig::default());
        }
        assert_eq!(p.last_processed_input, 9);
    }

    const MAX_SPEED: f32 = 100.0;

    fn spawn(id: &str, velocity: Vec3, owner: Option<PlayerId>) -> ProjectileSpawn {
        ProjectileSpawn {
            id: id.to_string(),
            owner_id: owner,
            position: Vec3::new(0.0, 1.0, 0.0),
            velocity,
        }
    }

    #[test]
    fn test_projectile_owner_forced_to_sender() {
        let sender = Uuid::new_v4();
        let projectile =
            validate_projectile(&spawn("p", Vec3::new(0.0, 0.0, 1.0), Some(Uuid::new_v4())), sender, MAX_SPEED, 7)
                .unwrap();
        assert_eq!(projectile.owner_id, Some(sender));
        assert_eq!(projectile.created_at, 7);
        assert!(projectile.active);
    }

    #[test]
    fn test_projectile_structural_rejections() {
        let sender = Uuid::new_v4();
        assert_eq!(
            validate_projectile(&spawn("", Vec3::new(1.0, 0.0, 0.0), None), sender, MAX_SPEED, 0).unwrap_err(),
            ProjectileRejection::EmptyId
        );
        assert_eq!(
            validate_projectile(&spawn(&"x".repeat(65), Vec3::new(1.0, 0.0, 0.0), None), sender, MAX_SPEED, 0)
                .unwrap_err(),
            ProjectileRejection::IdTooLong
        );
        assert_eq!(
            validate_projectile(&spawn("p", Vec3::ZERO, None), sender, MAX_SPEED, 0).unwrap_err(),
            ProjectileRejection::ZeroVelocity
        );
        assert_eq!(
            validate_projectile(&spawn("p", Vec3::new(f32::INFINITY, 0.0, 0.0), None), sender, MAX_SPEED, 0)
                .unwrap_err(),
            ProjectileRejection::NonFinite
        );
    }

    #[test]
    fn test_projectile_speed_capped() {
        let sender = Uuid::new_v4();
        assert!(validate_projectile(&spawn("p", Vec3::new(100.0, 0.0, 0.0), None), sender, MAX_SPEED, 0).is_ok());
        assert_eq!(
            validate_projectile(&spawn("p", Vec3::new(100.5, 0.0, 0.0), None), sender, MAX_SPEED, 0)
                .unwrap_err(),
            ProjectileRejection::TooFast { max: MAX_SPEED }
        );
        assert_eq!(
            validate_projectile(&spawn("p", Vec3::new(3e38, 0.0, 0.0), None), sender, MAX_SPEED, 0)
                .unwrap_err(),
            ProjectileRejection::TooFast { max: MAX_SPEED }
        );
    }

    #[test]
    fn test_respawn_position_sanitized() {
        assert_eq!(
            validate_respawn_position(Vec3::new(1.0, -2.0, 3.0)),
            Some(Vec3::new(1.0, 0.0, 3.0))
        );
        assert_eq!(validate_respawn_position(Vec3::new(f32::NAN, 0.0, 0.0)), None);
    }
}
