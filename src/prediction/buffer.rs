//! Prediction buffer: locally applied inputs awaiting acknowledgment

use std::collections::VecDeque;

use crate::ws::protocol::Vec3;

use super::input::InputIntent;

/// Records older than this are dropped even if unacknowledged
pub const BUFFER_WINDOW_MS: u64 = 1_000;

/// One locally applied input and the state it produced
#[derive(Debug, Clone, PartialEq)]
pub struct InputRecord {
    pub sequence: u64,
    pub intent: InputIntent,
    /// Yaw the intent was applied under
    pub yaw: f32,
    /// The jump impulse fired on this input
    pub jumped: bool,
    pub predicted_position: Vec3,
    pub predicted_velocity: Vec3,
    pub timestamp: u64,
}

/// Predicted body state at the last acknowledged input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcknowledgedPrediction {
    pub sequence: u64,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Sequence-ordered log of unacknowledged inputs.
///
/// Sequences start at 1 and strictly increase for the life of the buffer.
/// After [`acknowledge`](Self::acknowledge) returns, no record with a
/// sequence at or below the acknowledged one is retained.
#[derive(Debug)]
pub struct PredictionBuffer {
    records: VecDeque<InputRecord>,
    window_ms: u64,
    last_sequence: u64,
    last_acknowledged: u64,
    acknowledged: Option<AcknowledgedPrediction>,
}

impl Default for PredictionBuffer {
    fn default() -> Self {
        Self::new(BUFFER_WINDOW_MS)
    }
}

impl PredictionBuffer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            records: VecDeque::new(),
            window_ms,
            last_sequence: 0,
            last_acknowledged: 0,
            acknowledged: None,
        }
    }

    /// Allocate the next input sequence number
    pub fn next_sequence(&mut self) -> u64 {
        self.last_sequence += 1;
        self.last_sequence
    }

    pub fn push(&mut self, record: InputRecord) {
        debug_assert!(self
            .records
            .back()
            .map_or(true, |last| last.sequence < record.sequence));
        self.records.push_back(record);
    }

    /// Drop records that fell out of the time window
    pub fn prune_expired(&mut self, now: u64) {
        let window = self.window_ms;
        self.records
            .retain(|r| now.saturating_sub(r.timestamp) <= window);
    }

    /// Record a server acknowledgment. Returns false for stale or repeated
    /// acknowledgments, which change nothing.
    pub fn acknowledge(&mut self, sequence: u64) -> bool {
        if sequence <= self.last_acknowledged {
            return false;
        }
        self.last_acknowledged = sequence;

        // The reference state for the next correction is the prediction made
        // at exactly this input; if it already expired there is none.
        self.acknowledged = self
            .records
            .iter()
            .find(|r| r.sequence == sequence)
            .map(|r| AcknowledgedPrediction {
                sequence: r.sequence,
                position: r.predicted_position,
                velocity: r.predicted_velocity,
            });

        self.records.retain(|r| r.sequence > sequence);
        true
    }

    pub fn acknowledged_prediction(&self) -> Option<AcknowledgedPrediction> {
        self.acknowledged
    }

    /// Replace the acknowledged reference after a correction
    pub fn set_acknowledged_prediction(&mut self, position: Vec3, velocity: Vec3) {
        if let Some(ack) = self.acknowledged.as_mut() {
            ack.position = position;
            ack.velocity = velocity;
        }
    }

    /// Forget every record and the acknowledged reference (teleport, respawn).
    /// Sequence numbering continues.
    pub fn reset(&mut self) {
        self.records.clear();
        self.acknowledged = None;
    }

    pub fn pending(&self) -> impl Iterator<Item = &InputRecord> {
        self.records.iter()
    }

    pub fn pending_mut(&mut self) -> impl Iterator<Item = &mut InputRecord> {
        self.records.iter_mut()
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn last_acknowledged(&self) -> u64 {
        self.last_acknowledged
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
