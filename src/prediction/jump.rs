//! Jump state machine
//!
//! `Grounded -> Airborne -> Cooldown -> Grounded`. The client owns this
//! judgment between snapshots; server opinions are folded in through
//! [`JumpState::adopt_server_jump`] and [`JumpState::server_grounded`].

/// Minimum time between jump starts
pub const JUMP_COOLDOWN_MS: u64 = 500;
/// Airborne longer than this is force-landed
pub const MAX_AIRBORNE_MS: u64 = 2_000;
/// Ground contact is ignored this soon after take-off
pub const LANDING_GRACE_MS: u64 = 100;
/// A server "grounded" report is ignored this soon after take-off
pub const SERVER_GROUNDED_GRACE_MS: u64 = 300;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JumpState {
    #[default]
    Grounded,
    Airborne {
        started_at: u64,
    },
    Cooldown {
        until: u64,
    },
}

impl JumpState {
    pub fn is_airborne(&self) -> bool {
        matches!(self, JumpState::Airborne { .. })
    }

    pub fn can_jump(&self, now: u64) -> bool {
        match *self {
            JumpState::Grounded => true,
            JumpState::Airborne { .. } => false,
            JumpState::Cooldown { until } => now >= until,
        }
    }

    pub fn start(&mut self, now: u64) {
        *self = JumpState::Airborne { started_at: now };
    }

    /// Per-frame update from the local ground-contact query
    pub fn update(&mut self, now: u64, grounded: bool) {
        match *self {
            JumpState::Grounded => {}
            JumpState::Airborne { started_at } => {
                let elapsed = now.saturating_sub(started_at);
                if (grounded && elapsed >= LANDING_GRACE_MS) || elapsed >= MAX_AIRBORNE_MS {
                    self.land(now);
                }
            }
            JumpState::Cooldown { until } => {
                if now >= until {
                    *self = JumpState::Grounded;
                }
            }
        }
    }

    /// Server reports the player jumping. Adopted only from `Grounded`, so a
    /// stale report cannot restart a jump that just ended. Returns whether
    /// the state changed.
    pub fn adopt_server_jump(&mut self, now: u64) -> bool {
        if *self != JumpState::Grounded {
            return false;
        }
        self.start(now);
        true
    }

    /// Server reports the player grounded. Honored only once the local jump
    /// is old enough that the report cannot predate it. Returns whether the
    /// jump was ended.
    pub fn server_grounded(&mut self, now: u64) -> bool {
        match *self {
            JumpState::Airborne { started_at }
                if now.saturating_sub(started_at) >= SERVER_GROUNDED_GRACE_MS =>
            {
                self.land(now);
                true
            }
            _ => false,
        }
    }

    fn land(&mut self, now: u64) {
        let JumpState::Airborne { started_at } = *self else {
            return;
        };
        let until = started_at + JUMP_COOLDOWN_MS;
        *self = if now >= until {
            JumpState::Grounded
        } else {
            JumpState::Cooldown { until }
        };
    }
}
