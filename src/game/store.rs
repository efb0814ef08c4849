//! The single in-memory table of authoritative state
//!
//! Owned by exactly one `World`; everything else reaches it through the
//! accessors below, never through shared globals.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::ws::protocol::{PlayerId, ServerMsg};

use super::player::Player;
use super::projectile::Projectile;

/// One live transport channel, bound to exactly one player
#[derive(Debug)]
pub struct Connection {
    pub player_id: PlayerId,
    pub outbound: mpsc::Sender<ServerMsg>,
    /// Last inbound traffic (unix millis), for the heartbeat sweep
    pub last_seen: u64,
}

impl Connection {
    pub fn new(player_id: PlayerId, outbound: mpsc::Sender<ServerMsg>, now: u64) -> Self {
        Self {
            player_id,
            outbound,
            last_seen: now,
        }
    }

    pub fn is_stale(&self, now: u64, timeout_ms: u64) -> bool {
        now.saturating_sub(self.last_seen) > timeout_ms
    }
}

#[derive(Debug, Default)]
pub struct StateStore {
    players: HashMap<PlayerId, Player>,
    /// Insertion order is kept; collision scans walk it front to back
    projectiles: Vec<Projectile>,
    connections: HashMap<PlayerId, Connection>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Players

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn set_player(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    pub fn delete_player(&mut self, id: &PlayerId) -> Option<Player> {
        self.players.remove(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    // Projectiles

    pub fn projectile(&self, id: &str) -> Option<&Projectile> {
        self.projectiles.iter().find(|p| p.id == id)
    }

    /// Insert a projectile; returns false (and stores nothing) if the id is taken
    pub fn set_projectile(&mut self, projectile: Projectile) -> bool {
        if self.projectile(&projectile.id).is_some() {
            return false;
        }
        self.projectiles.push(projectile);
        true
    }

    pub fn delete_projectile(&mut self, id: &str) -> Option<Projectile> {
        let idx = self.projectiles.iter().position(|p| p.id == id)?;
        Some(self.projectiles.remove(idx))
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn projectiles_mut(&mut self) -> &mut [Projectile] {
        &mut self.projectiles
    }

    pub fn retain_projectiles(&mut self, keep: impl FnMut(&Projectile) -> bool) {
        self.projectiles.retain(keep);
    }

    /// Split borrow used by collision resolution
    pub fn projectiles_and_players_mut(
        &mut self,
    ) -> (&mut [Projectile], &mut HashMap<PlayerId, Player>) {
        (&mut self.projectiles, &mut self.players)
    }

    // Connections

    pub fn register_connection(&mut self, connection: Connection) {
        self.connections.insert(connection.player_id, connection);
    }

    pub fn connection_mut(&mut self, id: &PlayerId) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Drop a client entirely: its connection and its player.
    /// A player without a live connection is never kept around.
    pub fn remove_client(&mut self, id: &PlayerId) -> bool {
        let had_connection = self.connections.remove(id).is_some();
        let had_player = self.players.remove(id).is_some();
        had_connection || had_player
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::SPAWN_POSITION;
    use crate::ws::protocol::Vec3;
    use uuid::Uuid;

    fn projectile(id: &str) -> Projectile {
        Projectile::new(id.into(), None, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 0)
    }

    #[test]
    fn test_player_accessors() {
        let mut store = StateStore::new();
        let id = Uuid::new_v4();
        store.set_player(Player::new(id, SPAWN_POSITION, 0));
        assert_eq!(store.player_count(), 1);

        store.player_mut(&id).unwrap().health = 50;
        assert_eq!(store.player(&id).unwrap().health, 50);

        assert!(store.delete_player(&id).is_some());
        assert!(store.player(&id).is_none());
    }

    #[test]
    fn test_duplicate_projectile_rejected() {
        let mut store = StateStore::new();
        assert!(store.set_projectile(projectile("a")));
        assert!(!store.set_projectile(projectile("a")));
        assert!(store.set_projectile(projectile("b")));
        assert_eq!(store.projectiles().len(), 2);
        assert_eq!(store.projectiles()[0].id, "a");

        assert!(store.delete_projectile("a").is_some());
        assert!(store.projectile("a").is_none());
    }

    #[test]
    fn test_remove_client_drops_player_and_connection() {
        let mut store = StateStore::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(4);
        store.set_player(Player::new(id, SPAWN_POSITION, 0));
        store.register_connection(Connection::new(id, tx, 0));

        assert!(store.remove_client(&id));
        assert_eq!(store.player_count(), 0);
        assert_eq!(store.connection_count(), 0);
        assert!(!store.remove_client(&id));
    }

    #[test]
    fn test_connection_staleness() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = Connection::new(Uuid::new_v4(), tx, 1_000);
        assert!(!conn.is_stale(31_000, 30_000));
        assert!(conn.is_stale(31_001, 30_000));
    }
}
