//! Connection registry and room directory.
//!
//! Plain synchronous state, owned by the relay actor. A room exists from the
//! first join and is dropped as soon as its last member leaves.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::types::{ConnectionId, OutboundMessage, RoomName};

#[derive(Debug)]
struct Connection {
    /// Channel for outbound messages to this connection
    tx: mpsc::UnboundedSender<OutboundMessage>,
    rooms: HashSet<RoomName>,
}

#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<RoomName, HashSet<ConnectionId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and put it in its personal room
    pub fn attach(&mut self, tx: mpsc::UnboundedSender<OutboundMessage>) -> ConnectionId {
        let mut id = ConnectionId::generate();
        while self.connections.contains_key(&id) {
            id = ConnectionId::generate();
        }

        self.connections.insert(
            id,
            Connection {
                tx,
                rooms: HashSet::new(),
            },
        );
        self.join(id, RoomName::from(id));

        info!("Connection {} attached", id);
        id
    }

    /// Remove a connection from the registry and from every room it joined
    pub fn detach(&mut self, id: ConnectionId) {
        let Some(conn) = self.connections.remove(&id) else {
            return;
        };

        for room in conn.rooms {
            if let Some(members) = self.rooms.get_mut(&room) {
                members.remove(&id);
                if members.is_empty() {
                    self.rooms.remove(&room);
                    debug!("Room {} removed (empty)", room);
                }
            }
        }

        info!("Connection {} detached", id);
    }

    /// Add `id` to `room`. Returns false if it was already a member or is not attached.
    pub fn join(&mut self, id: ConnectionId, room: RoomName) -> bool {
        let Some(conn) = self.connections.get_mut(&id) else {
            warn!("Join from unknown connection {}", id);
            return false;
        };

        if !conn.rooms.insert(room.clone()) {
            return false;
        }
        self.rooms.entry(room).or_default().insert(id);
        true
    }

    /// Current members of `room`, empty if the room does not exist
    pub fn members(&self, room: &str) -> HashSet<ConnectionId> {
        self.rooms.get(room).cloned().unwrap_or_default()
    }

    pub fn is_present(&self, room: &str) -> bool {
        self.rooms.get(room).is_some_and(|members| !members.is_empty())
    }

    pub fn is_attached(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Queue a message for one connection
    pub fn send(&self, id: ConnectionId, msg: OutboundMessage) -> bool {
        match self.connections.get(&id) {
            Some(conn) => conn.tx.send(msg).is_ok(),
            None => false,
        }
    }

    /// Queue a message for every member of `room` except `exclude`.
    /// Returns how many connections it was queued for.
    pub fn broadcast(
        &self,
        room: &str,
        msg: &OutboundMessage,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };

        let mut delivered = 0;
        for id in members {
            if Some(*id) == exclude {
                continue;
            }
            if self.send(*id, msg.clone()) {
                delivered += 1;
            } else {
                warn!("Dropped message to {} (writer gone)", id);
            }
        }
        delivered
    }
}
