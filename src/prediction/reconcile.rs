//! Reconciliation against authoritative snapshots
//!
//! The reference for a correction is the prediction the client made at the
//! input the server last acknowledged, not the live position: the live
//! position already includes inputs the server has not seen. A correction
//! blends that reference toward the server, then replays every pending input
//! on top with a fixed step.

use tracing::debug;

use crate::ws::protocol::Vec3;

use super::body::PhysicsBody;
use super::buffer::PredictionBuffer;
use super::input::JUMP_IMPULSE;

/// Corrections at or below this squared distance are skipped
pub const CORRECTION_TOLERANCE_SQ: f32 = 0.04;
/// Blend factor toward the server while grounded
pub const GROUNDED_CORRECTION: f32 = 0.3;
/// Blend factor toward the server while airborne
pub const AIRBORNE_CORRECTION: f32 = 0.1;
/// Fixed step used to replay pending inputs
pub const REPLAY_STEP: f32 = 1.0 / 60.0;
/// Smoothing factor of the correction moving average
pub const STATS_ALPHA: f32 = 0.1;

/// Diagnostics only; never read by gameplay code
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationStats {
    /// Exponential moving average of the correction vector
    pub average_correction: Vec3,
    pub corrections: u64,
    pub last_correction_at: Option<u64>,
}

impl ReconciliationStats {
    fn record(&mut self, correction: Vec3, now: u64) {
        self.average_correction = if self.corrections == 0 {
            correction
        } else {
            self.average_correction.lerp(correction, STATS_ALPHA)
        };
        self.corrections += 1;
        self.last_correction_at = Some(now);
    }
}

/// What the latest snapshot says about the local player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Authority {
    pub position: Vec3,
    /// Accept the vertical coordinate outright instead of blending it
    pub snap_vertical: bool,
    /// Local player is airborne; use the slower blend
    pub airborne: bool,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    tolerance_sq: f32,
    grounded_factor: f32,
    airborne_factor: f32,
    stats: ReconciliationStats,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            tolerance_sq: CORRECTION_TOLERANCE_SQ,
            grounded_factor: GROUNDED_CORRECTION,
            airborne_factor: AIRBORNE_CORRECTION,
            stats: ReconciliationStats::default(),
        }
    }
}

impl Reconciler {
    pub fn stats(&self) -> &ReconciliationStats {
        &self.stats
    }

    /// Correct `body` toward `authority`. Returns the correction applied to
    /// the reference position, or `None` if the error was within tolerance.
    ///
    /// Without a reference prediction for the acknowledged input the live
    /// position is corrected in place and nothing is replayed.
    pub fn reconcile<B: PhysicsBody + ?Sized>(
        &mut self,
        body: &mut B,
        buffer: &mut PredictionBuffer,
        authority: Authority,
        now: u64,
    ) -> Option<Vec3> {
        let reference = buffer.acknowledged_prediction();
        let (ref_position, ref_velocity) = match reference {
            Some(ack) => (ack.position, ack.velocity),
            None => (body.position(), body.velocity()),
        };

        let error_sq = authority.position.distance_sq(ref_position);
        if error_sq <= self.tolerance_sq {
            return None;
        }

        let factor = if authority.airborne {
            self.airborne_factor
        } else {
            self.grounded_factor
        };

        let mut base = ref_position.lerp(authority.position, factor);
        let mut velocity = ref_velocity;
        if authority.snap_vertical {
            base.y = authority.position.y;
            velocity.y = 0.0;
        }

        body.set_position(base);
        body.set_velocity(velocity);

        if reference.is_some() {
            buffer.set_acknowledged_prediction(base, velocity);

            let mut replayed = 0usize;
            for record in buffer.pending_mut() {
                let horizontal = record.intent.horizontal_velocity(record.yaw);
                let vertical = if record.jumped {
                    JUMP_IMPULSE
                } else {
                    body.velocity().y
                };
                body.set_velocity(Vec3::new(horizontal.x, vertical, horizontal.z));
                body.step(REPLAY_STEP);
                record.predicted_position = body.position();
                record.predicted_velocity = body.velocity();
                replayed += 1;
            }
            debug!(error_sq, replayed, "Reconciled with replay");
        } else {
            debug!(error_sq, "Reconciled in place");
        }

        let correction = base.sub(ref_position);
        self.stats.record(correction, now);
        Some(correction)
    }
}
