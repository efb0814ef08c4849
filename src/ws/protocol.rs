//! WebSocket protocol message definitions
//! These are the wire types for client-server communication
//!
//! Every frame is a JSON text envelope `{ "type": "...", "data": { ... } }`.
//! Outbound messages are plain serde enums. Inbound messages go through
//! [`ClientMsg::decode`], which validates each variant explicitly so a
//! handler only ever sees a fully typed record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Player identifier, one per connection
pub type PlayerId = Uuid;

/// Longest accepted client-supplied projectile id
pub const MAX_PROJECTILE_ID_LEN: usize = 64;

/// A position, velocity or rotation in world units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(self, factor: f32) -> Vec3 {
        Vec3::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn distance_sq(self, other: Vec3) -> f32 {
        self.sub(other).length_sq()
    }

    pub fn distance(self, other: Vec3) -> f32 {
        self.distance_sq(other).sqrt()
    }

    /// Move `t` of the way from `self` towards `target`
    pub fn lerp(self, target: Vec3, t: f32) -> Vec3 {
        self.add(target.sub(self).scale(t))
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A partial vector from an untrusted client; missing or mistyped
/// components are `None` and keep the current value when merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3Patch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

impl Vec3Patch {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }

    /// Fill absent components from `base`
    pub fn merge(&self, base: Vec3) -> Vec3 {
        Vec3::new(
            self.x.unwrap_or(base.x),
            self.y.unwrap_or(base.y),
            self.z.unwrap_or(base.z),
        )
    }
}

impl From<Vec3> for Vec3Patch {
    fn from(v: Vec3) -> Self {
        Self {
            x: Some(v.x),
            y: Some(v.y),
            z: Some(v.z),
        }
    }
}

/// Animation tag replicated for remote rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Animation {
    #[default]
    Idle,
    Walk,
    Run,
    Jump,
    Attack,
    Death,
}

// ============================================================================
// Client -> Server
// ============================================================================

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMsg {
    /// Partial state merge, validated field by field
    PlayerUpdate(PlayerUpdate),
    /// Client-simulated projectile handed to the server
    ProjectileSpawn(ProjectileSpawn),
    /// Melee swing
    PlayerAttack,
    /// Client-detected hit on another player
    PlayerDamage(DamageRequest),
    /// Self-reported death
    PlayerDeath,
    /// Manual respawn request while dead
    PlayerRespawn(RespawnRequest),
    /// Latency check
    Ping(PingRequest),
}

/// Partial player state. Every field is optional and independently typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3Patch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3Patch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_dead: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_attacking: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileSpawn {
    pub id: String,
    #[serde(default)]
    pub owner_id: Option<PlayerId>,
    pub position: Vec3,
    pub velocity: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageRequest {
    pub target_id: PlayerId,
    pub amount: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RespawnRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PingRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// Raw envelope before per-variant validation
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl ClientMsg {
    /// Decode and validate one inbound text frame
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let envelope: RawEnvelope = serde_json::from_str(text)?;
        let data = envelope.data;

        match envelope.kind.as_str() {
            "PLAYER_UPDATE" => Ok(ClientMsg::PlayerUpdate(PlayerUpdate::from_value(&data))),
            "PROJECTILE_SPAWN" => serde_json::from_value(data)
                .map(ClientMsg::ProjectileSpawn)
                .map_err(|e| ProtocolError::invalid("PROJECTILE_SPAWN", e)),
            "PLAYER_ATTACK" => Ok(ClientMsg::PlayerAttack),
            "PLAYER_DAMAGE" => serde_json::from_value(data)
                .map(ClientMsg::PlayerDamage)
                .map_err(|e| ProtocolError::invalid("PLAYER_DAMAGE", e)),
            "PLAYER_DEATH" => Ok(ClientMsg::PlayerDeath),
            "PLAYER_RESPAWN" => Ok(ClientMsg::PlayerRespawn(RespawnRequest {
                position: data.get("position").and_then(full_vec3),
            })),
            "PING" => Ok(ClientMsg::Ping(PingRequest {
                timestamp: data.get("timestamp").and_then(non_negative_integer),
            })),
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMsg::PlayerUpdate(_) => "PLAYER_UPDATE",
            ClientMsg::ProjectileSpawn(_) => "PROJECTILE_SPAWN",
            ClientMsg::PlayerAttack => "PLAYER_ATTACK",
            ClientMsg::PlayerDamage(_) => "PLAYER_DAMAGE",
            ClientMsg::PlayerDeath => "PLAYER_DEATH",
            ClientMsg::PlayerRespawn(_) => "PLAYER_RESPAWN",
            ClientMsg::Ping(_) => "PING",
        }
    }
}

impl PlayerUpdate {
    /// Extract every field that type-checks; the rest are dropped silently.
    fn from_value(data: &Value) -> Self {
        Self {
            position: data.get("position").and_then(vec3_patch),
            rotation: data.get("rotation").and_then(vec3_patch),
            health: data.get("health").and_then(finite_f32),
            is_dead: data.get("isDead").and_then(Value::as_bool),
            animation: data
                .get("animation")
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
            is_attacking: data.get("isAttacking").and_then(Value::as_bool),
            sequence: data.get("sequence").and_then(non_negative_integer),
        }
    }
}

fn finite_f32(value: &Value) -> Option<f32> {
    let n = value.as_f64()? as f32;
    n.is_finite().then_some(n)
}

fn non_negative_integer(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

fn vec3_patch(value: &Value) -> Option<Vec3Patch> {
    let obj = value.as_object()?;
    let patch = Vec3Patch {
        x: obj.get("x").and_then(finite_f32),
        y: obj.get("y").and_then(finite_f32),
        z: obj.get("z").and_then(finite_f32),
    };
    (!patch.is_empty()).then_some(patch)
}

fn full_vec3(value: &Value) -> Option<Vec3> {
    let patch = vec3_patch(value)?;
    Some(Vec3::new(patch.x?, patch.y?, patch.z?))
}

// ============================================================================
// Server -> Client
// ============================================================================

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMsg {
    /// Sent once to a new connection
    PlayerConnected(ConnectedPayload),
    /// Full sanitized snapshot, every tick
    GameState(GameStateSnapshot),
    /// Projectile accepted by the server
    ProjectileSpawn(ProjectileSnapshot),
    PlayerDamage(DamageEvent),
    PlayerDeath(DeathEvent),
    PlayerRespawn(RespawnEvent),
    Pong(PongPayload),
}

impl ServerMsg {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMsg::PlayerConnected(_) => "PLAYER_CONNECTED",
            ServerMsg::GameState(_) => "GAME_STATE",
            ServerMsg::ProjectileSpawn(_) => "PROJECTILE_SPAWN",
            ServerMsg::PlayerDamage(_) => "PLAYER_DAMAGE",
            ServerMsg::PlayerDeath(_) => "PLAYER_DEATH",
            ServerMsg::PlayerRespawn(_) => "PLAYER_RESPAWN",
            ServerMsg::Pong(_) => "PONG",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub id: PlayerId,
    pub position: Vec3,
}

/// Player state as other clients may see it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub position: Vec3,
    pub rotation: Vec3,
    pub health: u32,
    pub is_dead: bool,
    pub is_attacking: bool,
    pub animation: Animation,
    /// Highest input sequence the server has applied for this player
    pub last_processed_input: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileSnapshot {
    pub id: String,
    pub owner_id: Option<PlayerId>,
    pub position: Vec3,
    pub velocity: Vec3,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSnapshot {
    pub tick: u64,
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    /// NPC state is owned by an external AI collaborator; the server relays none.
    #[serde(default)]
    pub enemies: Vec<Value>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageEvent {
    pub target_id: PlayerId,
    pub attacker_id: Option<PlayerId>,
    pub amount: u32,
    pub health: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathEvent {
    pub player_id: PlayerId,
    pub killer_id: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespawnEvent {
    pub player_id: PlayerId,
    pub position: Vec3,
    pub health: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongPayload {
    pub client_time: Option<u64>,
    pub server_time: u64,
    pub server_tick: u64,
}

/// Inbound decoding failures
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },
}

impl ProtocolError {
    fn invalid(kind: &'static str, err: serde_json::Error) -> Self {
        ProtocolError::InvalidPayload {
            kind,
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_player_update_full() {
        let text = json!({
            "type": "PLAYER_UPDATE",
            "data": {
                "position": { "x": 1.0, "y": 2.0, "z": 3.0 },
                "rotation": { "x": 0.0, "y": 1.5, "z": 0.0 },
                "animation": "run",
                "isAttacking": false,
                "sequence": 42
            }
        })
        .to_string();

        let ClientMsg::PlayerUpdate(update) = ClientMsg::decode(&text).unwrap() else {
            panic!("expected PLAYER_UPDATE");
        };
        assert_eq!(update.position.unwrap().merge(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(update.rotation.unwrap().y, Some(1.5));
        assert_eq!(update.animation, Some(Animation::Run));
        assert_eq!(update.is_attacking, Some(false));
        assert_eq!(update.sequence, Some(42));
        assert_eq!(update.health, None);
    }

    #[test]
    fn test_decode_player_update_drops_bad_fields_only() {
        let text = json!({
            "type": "PLAYER_UPDATE",
            "data": {
                "position": { "x": 4.0, "y": "high", "z": null },
                "animation": "moonwalk",
                "isDead": "yes",
                "health": "full",
                "sequence": "seven",
                "isAttacking": true
            }
        })
        .to_string();

        let ClientMsg::PlayerUpdate(update) = ClientMsg::decode(&text).unwrap() else {
            panic!("expected PLAYER_UPDATE");
        };
        let position = update.position.unwrap();
        assert_eq!(position.x, Some(4.0));
        assert_eq!(position.y, None);
        assert_eq!(position.z, None);
        assert_eq!(update.animation, None);
        assert_eq!(update.is_dead, None);
        assert_eq!(update.health, None);
        assert_eq!(update.sequence, None);
        assert_eq!(update.is_attacking, Some(true));
    }

    #[test]
    fn test_decode_sequence_accepts_integral_float() {
        let text = r#"{"type":"PLAYER_UPDATE","data":{"sequence":5.0}}"#;
        let ClientMsg::PlayerUpdate(update) = ClientMsg::decode(text).unwrap() else {
            panic!("expected PLAYER_UPDATE");
        };
        assert_eq!(update.sequence, Some(5));

        let text = r#"{"type":"PLAYER_UPDATE","data":{"sequence":-3}}"#;
        let ClientMsg::PlayerUpdate(update) = ClientMsg::decode(text).unwrap() else {
            panic!("expected PLAYER_UPDATE");
        };
        assert_eq!(update.sequence, None);
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = ClientMsg::decode("{not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_decode_unknown_type() {
        let err = ClientMsg::decode(r#"{"type":"TELEPORT","data":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(t) if t == "TELEPORT"));
    }

    #[test]
    fn test_decode_projectile_spawn_requires_vectors() {
        let text = json!({
            "type": "PROJECTILE_SPAWN",
            "data": { "id": "p1", "ownerId": null, "position": { "x": 0.0, "y": 1.0, "z": 0.0 } }
        })
        .to_string();
        let err = ClientMsg::decode(&text).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidPayload { kind: "PROJECTILE_SPAWN", .. }
        ));
    }

    #[test]
    fn test_decode_projectile_spawn() {
        let owner = Uuid::new_v4();
        let text = json!({
            "type": "PROJECTILE_SPAWN",
            "data": {
                "id": "arrow-1",
                "ownerId": owner,
                "position": { "x": 0.0, "y": 1.0, "z": 0.0 },
                "velocity": { "x": 0.0, "y": 0.0, "z": 10.0 }
            }
        })
        .to_string();
        let ClientMsg::ProjectileSpawn(spawn) = ClientMsg::decode(&text).unwrap() else {
            panic!("expected PROJECTILE_SPAWN");
        };
        assert_eq!(spawn.id, "arrow-1");
        assert_eq!(spawn.owner_id, Some(owner));
        assert_eq!(spawn.velocity, Vec3::new(0.0, 0.0, 10.0));
    }

    #[test]
    fn test_decode_unit_messages_without_data() {
        assert_eq!(
            ClientMsg::decode(r#"{"type":"PLAYER_ATTACK"}"#).unwrap(),
            ClientMsg::PlayerAttack
        );
        assert_eq!(
            ClientMsg::decode(r#"{"type":"PLAYER_DEATH","data":{}}"#).unwrap(),
            ClientMsg::PlayerDeath
        );
        assert_eq!(
            ClientMsg::decode(r#"{"type":"PING"}"#).unwrap(),
            ClientMsg::Ping(PingRequest { timestamp: None })
        );
    }

    #[test]
    fn test_decode_respawn_ignores_partial_position() {
        let text = r#"{"type":"PLAYER_RESPAWN","data":{"position":{"x":1,"y":2}}}"#;
        assert_eq!(
            ClientMsg::decode(text).unwrap(),
            ClientMsg::PlayerRespawn(RespawnRequest { position: None })
        );
    }

    #[test]
    fn test_client_update_survives_encode_decode() {
        let msg = ClientMsg::PlayerUpdate(PlayerUpdate {
            position: Some(Vec3::new(1.0, 0.0, -2.0).into()),
            animation: Some(Animation::Jump),
            sequence: Some(9),
            ..Default::default()
        });
        let text = serde_json::to_string(&msg).unwrap();
        assert!(text.contains(r#""type":"PLAYER_UPDATE""#));
        assert_eq!(ClientMsg::decode(&text).unwrap(), msg);
    }

    #[test]
    fn test_server_msg_envelope_shape() {
        let id = Uuid::new_v4();
        let msg = ServerMsg::PlayerDeath(DeathEvent {
            player_id: id,
            killer_id: None,
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "PLAYER_DEATH");
        assert_eq!(value["data"]["playerId"], id.to_string());
        assert!(value["data"]["killerId"].is_null());
    }

    #[test]
    fn test_vec3_math() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance(b), 5.0);
        assert_eq!(a.distance_sq(b), 25.0);
        assert_eq!(a.lerp(b, 0.5), Vec3::new(1.5, 2.0, 0.0));
        assert!(!Vec3::new(f32::NAN, 0.0, 0.0).is_finite());
    }
}
