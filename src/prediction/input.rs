//! Local input intent and the movement it produces

use crate::ws::protocol::Vec3;

/// Horizontal walk speed (units/s)
pub const WALK_SPEED: f32 = 5.0;
/// Initial vertical speed of a jump (units/s)
pub const JUMP_IMPULSE: f32 = 8.0;

/// Raw intent sampled for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputIntent {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub attack: bool,
}

impl InputIntent {
    pub fn is_moving(&self) -> bool {
        self.forward != self.backward || self.left != self.right
    }

    /// Horizontal velocity for this intent, relative to `yaw` (radians).
    /// Forward at yaw 0 is -z. Diagonals are normalized.
    pub fn horizontal_velocity(&self, yaw: f32) -> Vec3 {
        let axis = |pos: bool, neg: bool| (pos as i8 - neg as i8) as f32;
        let ahead = axis(self.forward, self.backward);
        let strafe = axis(self.right, self.left);
        if ahead == 0.0 && strafe == 0.0 {
            return Vec3::ZERO;
        }

        let (sin, cos) = yaw.sin_cos();
        let forward = Vec3::new(-sin, 0.0, -cos);
        let right = Vec3::new(cos, 0.0, -sin);
        let dir = forward.scale(ahead).add(right.scale(strafe));

        dir.scale(WALK_SPEED / dir.length_sq().sqrt())
    }
}
