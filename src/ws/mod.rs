//! WebSocket transport: wire protocol and per-connection session

pub mod handler;
pub mod protocol;
