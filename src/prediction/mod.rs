//! Client-side prediction and server reconciliation
//!
//! [`PredictionEngine`] applies local input immediately, logs it in the
//! prediction buffer and sends it to the server; on every authoritative
//! snapshot it prunes acknowledged inputs, arbitrates jump state and
//! corrects the local body. Both entry points run on the caller's loop, so
//! a reconciliation (replay included) always finishes before the next input
//! is applied.

pub mod body;
pub mod buffer;
pub mod clock;
pub mod input;
pub mod jump;
pub mod reconcile;
pub mod transport;

pub use body::{KinematicBody, PhysicsBody};
pub use buffer::{InputRecord, PredictionBuffer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use input::InputIntent;
pub use jump::JumpState;
pub use reconcile::{ReconciliationStats, Reconciler};
pub use transport::{ChannelTransport, Transport, TransportError};

use tracing::{debug, info};

use crate::util::time::delta_secs;
use crate::ws::protocol::{Animation, ClientMsg, PlayerId, PlayerSnapshot, PlayerUpdate, ServerMsg, Vec3};

use input::JUMP_IMPULSE;
use reconcile::Authority;

/// A server position at or below this height counts as grounded
pub const SERVER_GROUNDED_MAX_Y: f32 = 0.1;

/// Frame deltas are capped so a stalled loop does not tunnel
const MAX_FRAME_DT: f32 = 0.25;

pub struct PredictionEngine<C, B, T> {
    clock: C,
    body: B,
    transport: T,
    buffer: PredictionBuffer,
    jump: JumpState,
    reconciler: Reconciler,
    player_id: Option<PlayerId>,
    yaw: f32,
    last_frame_at: Option<u64>,
    /// Last input sent while locally airborne
    last_airborne_sequence: Option<u64>,
}

impl<C: Clock, B: PhysicsBody, T: Transport> PredictionEngine<C, B, T> {
    pub fn new(clock: C, body: B, transport: T) -> Self {
        Self {
            clock,
            body,
            transport,
            buffer: PredictionBuffer::default(),
            jump: JumpState::default(),
            reconciler: Reconciler::default(),
            player_id: None,
            yaw: 0.0,
            last_frame_at: None,
            last_airborne_sequence: None,
        }
    }

    /// Server-assigned id, once PLAYER_CONNECTED has arrived
    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn buffer(&self) -> &PredictionBuffer {
        &self.buffer
    }

    pub fn jump_state(&self) -> JumpState {
        self.jump
    }

    pub fn stats(&self) -> &ReconciliationStats {
        self.reconciler.stats()
    }

    pub fn set_yaw(&mut self, yaw: f32) {
        self.yaw = yaw;
    }

    /// Apply one frame of local input, record it and send it.
    ///
    /// Returns the sequence number assigned to the input. The input is
    /// applied and buffered even if the send fails.
    pub fn process_input(&mut self, intent: InputIntent) -> Result<u64, TransportError> {
        let now = self.clock.now_ms();
        let dt = self
            .last_frame_at
            .map_or(0.0, |prev| delta_secs(prev, now, MAX_FRAME_DT));
        self.last_frame_at = Some(now);

        self.jump.update(now, self.body.is_grounded());

        let sequence = self.buffer.next_sequence();
        let horizontal = intent.horizontal_velocity(self.yaw);
        let mut velocity = Vec3::new(horizontal.x, self.body.velocity().y, horizontal.z);
        let jumped = intent.jump && self.jump.can_jump(now) && self.body.is_grounded();
        if jumped {
            velocity.y = JUMP_IMPULSE;
            self.jump.start(now);
        }
        self.body.set_velocity(velocity);
        self.body.step(dt);

        let position = self.body.position();
        self.buffer.push(InputRecord {
            sequence,
            intent,
            yaw: self.yaw,
            jumped,
            predicted_position: position,
            predicted_velocity: self.body.velocity(),
            timestamp: now,
        });
        self.buffer.prune_expired(now);

        let animation = self.animation_for(&intent);
        if animation == Animation::Jump {
            self.last_airborne_sequence = Some(sequence);
        }

        let update = PlayerUpdate {
            position: Some(position.into()),
            rotation: Some(Vec3::new(0.0, self.yaw, 0.0).into()),
            animation: Some(animation),
            sequence: Some(sequence),
            ..Default::default()
        };
        self.transport.send(ClientMsg::PlayerUpdate(update))?;
        if intent.attack {
            self.transport.send(ClientMsg::PlayerAttack)?;
        }

        Ok(sequence)
    }

    pub fn on_server_message(&mut self, msg: &ServerMsg) {
        match msg {
            ServerMsg::PlayerConnected(connected) => {
                info!(player_id = %connected.id, "Assigned player id");
                self.player_id = Some(connected.id);
                self.teleport(connected.position);
            }
            ServerMsg::GameState(state) => {
                let Some(id) = self.player_id else {
                    return;
                };
                if let Some(snapshot) = state.players.get(&id) {
                    self.reconcile(snapshot);
                }
            }
            ServerMsg::PlayerRespawn(respawn) if Some(respawn.player_id) == self.player_id => {
                info!(x = respawn.position.x, z = respawn.position.z, "Respawned");
                self.teleport(respawn.position);
            }
            _ => {}
        }
    }

    fn reconcile(&mut self, snapshot: &PlayerSnapshot) {
        let now = self.clock.now_ms();
        self.buffer.acknowledge(snapshot.last_processed_input);

        let server_jumping = snapshot.animation == Animation::Jump;
        let server_grounded = !server_jumping && snapshot.position.y <= SERVER_GROUNDED_MAX_Y;

        // A jump report that only acknowledges our own airborne input is an
        // echo of a jump we already made
        let echoed_jump = self
            .last_airborne_sequence
            .is_some_and(|seq| snapshot.last_processed_input <= seq);

        if server_jumping && echoed_jump {
            debug!(ack = snapshot.last_processed_input, "Ignored echoed server jump");
        } else if server_jumping && self.jump.adopt_server_jump(now) {
            debug!("Adopted server jump");
            // Only kick off a local jump if the server really has us in the air
            if snapshot.position.y > SERVER_GROUNDED_MAX_Y && self.body.is_grounded() {
                let v = self.body.velocity();
                self.body.set_velocity(Vec3::new(v.x, JUMP_IMPULSE, v.z));
            }
        }
        if server_grounded && self.jump.server_grounded(now) {
            debug!("Server ended local jump");
        }

        let authority = Authority {
            position: snapshot.position,
            snap_vertical: server_grounded && !self.jump.is_airborne(),
            airborne: self.jump.is_airborne() || !self.body.is_grounded(),
        };
        if let Some(correction) =
            self.reconciler
                .reconcile(&mut self.body, &mut self.buffer, authority, now)
        {
            debug!(
                dx = correction.x,
                dy = correction.y,
                dz = correction.z,
                pending = self.buffer.len(),
                "Applied correction"
            );
        }
    }

    fn teleport(&mut self, position: Vec3) {
        self.body.set_position(position);
        self.body.set_velocity(Vec3::ZERO);
        self.buffer.reset();
        self.jump = JumpState::Grounded;
    }

    fn animation_for(&self, intent: &InputIntent) -> Animation {
        if self.jump.is_airborne() {
            Animation::Jump
        } else if intent.attack {
            Animation::Attack
        } else if intent.is_moving() {
            Animation::Walk
        } else {
            Animation::Idle
        }
    }
}
