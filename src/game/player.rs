//! Authoritative player record

use crate::ws::protocol::{Animation, PlayerId, PlayerSnapshot, Vec3};

/// Full health; health never leaves `[0, MAX_HEALTH]`
pub const MAX_HEALTH: u32 = 100;

/// Height of the ground plane
pub const GROUND_Y: f32 = 0.0;

/// Where every new connection starts
pub const SPAWN_POSITION: Vec3 = Vec3::new(0.0, GROUND_Y, 0.0);

/// Player state in the arena (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,

    // Replicated state
    pub position: Vec3,
    pub rotation: Vec3,
    pub health: u32,
    pub is_dead: bool,
    pub is_attacking: bool,
    pub animation: Animation,
    pub last_processed_input: u64,

    // Server-only bookkeeping, never broadcast
    /// Pending automatic respawn, if any
    pub respawn_at: Option<u64>,
    /// When the current attack window closes
    pub attack_until: Option<u64>,
    /// Last height that counted as vertical movement
    pub last_y: f32,
    /// When `last_y` was recorded
    pub last_y_change_at: u64,
}

impl Player {
    pub fn new(id: PlayerId, position: Vec3, now: u64) -> Self {
        Self {
            id,
            position,
            rotation: Vec3::ZERO,
            health: MAX_HEALTH,
            is_dead: false,
            is_attacking: false,
            animation: Animation::Idle,
            last_processed_input: 0,
            respawn_at: None,
            attack_until: None,
            last_y: position.y,
            last_y_change_at: now,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.is_dead
    }

    /// Subtract `amount` from health, flooring at zero. Returns the new health.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        self.health = self.health.saturating_sub(amount).min(MAX_HEALTH);
        self.health
    }

    /// Record the sequence number the server has now applied.
    /// Never moves backwards.
    pub fn acknowledge_input(&mut self, sequence: u64) {
        self.last_processed_input = self.last_processed_input.max(sequence);
    }

    /// Move to `position` and restart the stuck-in-air clock
    pub fn teleport(&mut self, position: Vec3, now: u64) {
        self.position = position;
        self.last_y = position.y;
        self.last_y_change_at = now;
    }

    /// Back to full health at `position`
    pub fn revive(&mut self, position: Vec3, now: u64) {
        self.health = MAX_HEALTH;
        self.is_dead = false;
        self.is_attacking = false;
        self.attack_until = None;
        self.respawn_at = None;
        self.animation = Animation::Idle;
        self.teleport(position, now);
    }

    /// Sanitized copy for broadcast
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            position: self.position,
            rotation: self.rotation,
            health: self.health,
            is_dead: self.is_dead,
            is_attacking: self.is_attacking,
            animation: self.animation,
            last_processed_input: self.last_processed_input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_new_player_defaults() {
        let player = Player::new(Uuid::new_v4(), SPAWN_POSITION, 1_000);
        assert_eq!(player.health, MAX_HEALTH);
        assert!(player.is_alive());
        assert_eq!(player.last_processed_input, 0);
        assert_eq!(player.respawn_at, None);
        assert_eq!(player.last_y_change_at, 1_000);
    }

    #[test]
    fn test_damage_floors_at_zero() {
        let mut player = Player::new(Uuid::new_v4(), SPAWN_POSITION, 0);
        player.health = 20;
        assert_eq!(player.take_damage(30), 0);
        assert_eq!(player.take_damage(5), 0);
    }

    #[test]
    fn test_acknowledge_is_monotonic() {
        let mut player = Player::new(Uuid::new_v4(), SPAWN_POSITION, 0);
        player.acknowledge_input(10);
        player.acknowledge_input(4);
        assert_eq!(player.last_processed_input, 10);
    }

    #[test]
    fn test_revive_resets_combat_state() {
        let mut player = Player::new(Uuid::new_v4(), SPAWN_POSITION, 0);
        player.health = 0;
        player.is_dead = true;
        player.respawn_at = Some(3_000);
        player.animation = Animation::Death;

        player.revive(Vec3::new(5.0, 0.0, -5.0), 3_000);

        assert_eq!(player.health, MAX_HEALTH);
        assert!(!player.is_dead);
        assert_eq!(player.respawn_at, None);
        assert_eq!(player.animation, Animation::Idle);
        assert_eq!(player.position, Vec3::new(5.0, 0.0, -5.0));
        assert_eq!(player.last_y_change_at, 3_000);
    }

    #[test]
    fn test_snapshot_hides_bookkeeping() {
        let mut player = Player::new(Uuid::new_v4(), SPAWN_POSITION, 0);
        player.respawn_at = Some(99);
        let value = serde_json::to_value(player.snapshot()).unwrap();
        assert!(value.get("respawnAt").is_none());
        assert!(value.get("lastY").is_none());
        assert_eq!(value["health"], 100);
    }
}
