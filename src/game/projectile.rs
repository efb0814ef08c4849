//! Projectiles owned by the authoritative simulation

use crate::ws::protocol::{PlayerId, ProjectileSnapshot, Vec3};

/// Active projectile in the arena
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: String,
    /// `None` for environment-owned projectiles
    pub owner_id: Option<PlayerId>,
    pub position: Vec3,
    pub velocity: Vec3,
    pub created_at: u64,
    pub active: bool,
}

impl Projectile {
    pub fn new(
        id: String,
        owner_id: Option<PlayerId>,
        position: Vec3,
        velocity: Vec3,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            owner_id,
            position,
            velocity,
            created_at,
            active: true,
        }
    }

    /// Integrate position over `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        self.position = self.position.add(self.velocity.scale(dt));
    }

    /// A projectile needs a finite, non-zero velocity to stay in play
    pub fn has_velocity(&self) -> bool {
        self.velocity.is_finite() && self.velocity.length_sq() > 0.0
    }

    pub fn is_expired(&self, now: u64, lifetime_ms: u64) -> bool {
        now.saturating_sub(self.created_at) > lifetime_ms
    }

    /// Whether this projectile should be dropped at `now`. A position that
    /// overflowed cannot be serialized and is dropped too.
    pub fn should_remove(&self, now: u64, lifetime_ms: u64) -> bool {
        !self.active
            || !self.has_velocity()
            || !self.position.is_finite()
            || self.is_expired(now, lifetime_ms)
    }

    pub fn snapshot(&self) -> ProjectileSnapshot {
        ProjectileSnapshot {
            id: self.id.clone(),
            owner_id: self.owner_id,
            position: self.position,
            velocity: self.velocity,
            created_at: self.created_at,
        }
    }
}
