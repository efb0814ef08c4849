//! GAME_STATE snapshot building

use std::collections::BTreeMap;

use crate::ws::protocol::{GameStateSnapshot, ServerMsg};

use super::store::StateStore;

/// Build the full-state snapshot broadcast at the end of every tick.
///
/// Only replicated fields leave the server; respawn deadlines, attack windows
/// and stuck-detection bookkeeping stay behind. Inactive projectiles are
/// omitted even if they have not been swept yet.
pub fn build(store: &StateStore, tick: u64, timestamp: u64) -> ServerMsg {
    let players = store
        .players()
        .map(|p| (p.id, p.snapshot()))
        .collect::<BTreeMap<_, _>>();

    let projectiles = store
        .projectiles()
        .iter()
        .filter(|p| p.active)
        .map(|p| p.snapshot())
        .collect();

    ServerMsg::GameState(GameStateSnapshot {
        tick,
        players,
        projectiles,
        enemies: Vec::new(),
        timestamp,
    })
}

/// Snapshot traffic stats, kept by observers of the GAME_STATE stream
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_players_per_snapshot: f32,
    pub last_tick: u64,
}

impl SnapshotStats {
    pub fn record(&mut self, snapshot: &GameStateSnapshot, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;
        self.last_tick = snapshot.tick;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_players_per_snapshot = self.avg_players_per_snapshot * ((n - 1.0) / n)
            + (snapshot.players.len() as f32 / n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::{Player, SPAWN_POSITION};
    use crate::game::projectile::Projectile;
    use crate::ws::protocol::Vec3;
    use uuid::Uuid;

    #[test]
    fn test_snapshot_skips_inactive_projectiles() {
        let mut store = StateStore::new();
        let id = Uuid::new_v4();
        store.set_player(Player::new(id, SPAWN_POSITION, 0));

        let velocity = Vec3::new(1.0, 0.0, 0.0);
        store.set_projectile(Projectile::new("live".into(), None, Vec3::ZERO, velocity, 0));
        let mut spent = Projectile::new("spent".into(), None, Vec3::ZERO, velocity, 0);
        spent.active = false;
        store.set_projectile(spent);

        let ServerMsg::GameState(state) = build(&store, 12, 3_400) else {
            panic!("expected GAME_STATE");
        };

        assert_eq!(state.tick, 12);
        assert_eq!(state.timestamp, 3_400);
        assert_eq!(state.players.len(), 1);
        assert_eq!(state.players[&id].health, 100);
        assert_eq!(state.projectiles.len(), 1);
        assert_eq!(state.projectiles[0].id, "live");
        assert!(state.enemies.is_empty());
    }

    #[test]
    fn test_snapshot_hides_server_bookkeeping() {
        let mut store = StateStore::new();
        let mut player = Player::new(Uuid::new_v4(), SPAWN_POSITION, 0);
        player.respawn_at = Some(9_000);
        player.attack_until = Some(800);
        store.set_player(player);

        let json = serde_json::to_string(&build(&store, 1, 0)).unwrap();
        assert!(!json.contains("respawnAt"));
        assert!(!json.contains("attackUntil"));
        assert!(!json.contains("lastY"));
        assert!(json.contains("lastProcessedInput"));
    }

    #[test]
    fn test_stats_running_average() {
        let mut stats = SnapshotStats::default();
        let mut snapshot = GameStateSnapshot {
            tick: 1,
            players: BTreeMap::new(),
            projectiles: Vec::new(),
            enemies: Vec::new(),
            timestamp: 0,
        };
        stats.record(&snapshot, 100);

        let id = Uuid::new_v4();
        snapshot.tick = 2;
        snapshot
            .players
            .insert(id, Player::new(id, SPAWN_POSITION, 0).snapshot());
        snapshot.players.insert(
            Uuid::new_v4(),
            Player::new(Uuid::new_v4(), SPAWN_POSITION, 0).snapshot(),
        );
        stats.record(&snapshot, 300);

        assert_eq!(stats.total_snapshots, 2);
        assert_eq!(stats.total_bytes, 400);
        assert_eq!(stats.last_tick, 2);
        assert!((stats.avg_players_per_snapshot - 1.0).abs() < 1e-6);
    }
}
