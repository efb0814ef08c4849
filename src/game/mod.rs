//! Authoritative game simulation

pub mod arena;
pub mod combat;
pub mod player;
pub mod projectile;
pub mod snapshot;
pub mod store;
pub mod validator;
pub mod world;

pub use arena::{Arena, ArenaHandle, GameCommand};
pub use world::World;
