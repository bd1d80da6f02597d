use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::messages::ClientMessage;
use super::registry::Registry;
use super::router;
use super::types::{ConnectionId, OutboundMessage, RelayError, RoomName};

/// Commands sent to the relay actor
pub(crate) enum RelayCommand {
    Attach {
        tx: mpsc::UnboundedSender<OutboundMessage>,
        reply: oneshot::Sender<ConnectionId>,
    },
    Detach {
        id: ConnectionId,
    },
    Dispatch {
        from: ConnectionId,
        msg: ClientMessage,
    },
    Presence {
        room: RoomName,
        reply: oneshot::Sender<bool>,
    },
}

/// Owns the registry. Commands are applied one at a time, so every
/// operation sees a consistent room table.
pub(crate) async fn relay_actor(mut rx: mpsc::Receiver<RelayCommand>) {
    let mut registry = Registry::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RelayCommand::Attach { tx, reply } => {
                let id = registry.attach(tx);
                if reply.send(id).is_err() {
                    // connection task went away before learning its id
                    registry.detach(id);
                }
            }

            RelayCommand::Detach { id } => {
                registry.detach(id);
                debug!(
                    "{} connections, {} rooms",
                    registry.connection_count(),
                    registry.room_count()
                );
            }

            RelayCommand::Dispatch { from, msg } => {
                if let Err(e) = router::dispatch(&mut registry, from, msg) {
                    warn!("Routing error for {}: {}", from, e);
                }
            }

            RelayCommand::Presence { room, reply } => {
                let _ = reply.send(registry.is_present(room.as_str()));
            }
        }
    }
}

/// Handle to communicate with the relay actor
#[derive(Clone)]
pub struct RelayHandle {
    pub(crate) tx: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    /// Spawn the actor on the current runtime
    pub fn spawn(buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel::<RelayCommand>(buffer);
        tokio::spawn(relay_actor(rx));
        Self { tx }
    }

    /// Register a connection's outbound channel and get its ID
    pub async fn attach(
        &self,
        peer_tx: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Result<ConnectionId, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RelayCommand::Attach {
                tx: peer_tx,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RelayError::Internal("actor channel closed".to_string()))?;
        reply_rx
            .await
            .map_err(|_| RelayError::Internal("actor channel closed".to_string()))
    }

    /// Remove a connection from every room
    pub async fn detach(&self, id: ConnectionId) {
        let _ = self.tx.send(RelayCommand::Detach { id }).await;
    }

    /// Route a client request
    pub async fn dispatch(&self, from: ConnectionId, msg: ClientMessage) -> Result<(), RelayError> {
        self.tx
            .send(RelayCommand::Dispatch { from, msg })
            .await
            .map_err(|_| RelayError::Internal("actor channel closed".to_string()))
    }

    /// True iff `room` has at least one member
    pub async fn is_present(&self, room: RoomName) -> Result<bool, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RelayCommand::Presence {
                room,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RelayError::Internal("actor channel closed".to_string()))?;
        reply_rx
            .await
            .map_err(|_| RelayError::Internal("actor channel closed".to_string()))
    }
}
