//! Outbound transport seam for the client engine

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::ws::protocol::ClientMsg;

/// Client send failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("outbound queue full")]
    Full,
}

/// Non-blocking message sink. The client loop is cooperative, so a send
/// must never wait.
pub trait Transport {
    fn send(&mut self, msg: ClientMsg) -> Result<(), TransportError>;
}

/// Hands messages to a socket writer task over a bounded channel
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<ClientMsg>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::Sender<ClientMsg>) -> Self {
        Self { tx }
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, msg: ClientMsg) -> Result<(), TransportError> {
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Full,
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}
