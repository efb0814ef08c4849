//! Physics body seam
//!
//! The engine never owns physics. It reads and writes position/velocity and
//! asks whether the body touches the ground; everything else belongs to the
//! body implementation.

use crate::ws::protocol::Vec3;

/// Downward acceleration of `KinematicBody` (units/s^2)
pub const GRAVITY: f32 = 20.0;

/// Ground plane height
pub const GROUND_Y: f32 = 0.0;

const GROUND_CONTACT_EPSILON: f32 = 1e-3;

pub trait PhysicsBody {
    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);
    fn velocity(&self) -> Vec3;
    fn set_velocity(&mut self, velocity: Vec3);
    /// Ground-contact query
    fn is_grounded(&self) -> bool;
    /// Integrate `dt` seconds
    fn step(&mut self, dt: f32);
}

/// Point mass over a flat ground plane
#[derive(Debug, Clone, Default)]
pub struct KinematicBody {
    position: Vec3,
    velocity: Vec3,
}

impl KinematicBody {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
        }
    }
}

impl PhysicsBody for KinematicBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    fn is_grounded(&self) -> bool {
        self.position.y <= GROUND_Y + GROUND_CONTACT_EPSILON && self.velocity.y <= 0.0
    }

    fn step(&mut self, dt: f32) {
        self.velocity.y -= GRAVITY * dt;
        self.position = self.position.add(self.velocity.scale(dt));

        if self.position.y <= GROUND_Y {
            self.position.y = GROUND_Y;
            self.velocity.y = self.velocity.y.max(0.0);
        }
    }
}
