//! WebSocket signaling relay: rooms, presence and envelope routing

mod actor;
mod messages;
mod registry;
mod router;
mod server;
mod types;

pub use actor::RelayHandle;
pub use messages::{ClientMessage, Envelope, EnvelopeKind, Responder, ServerMessage};
pub use registry::Registry;
pub use router::dispatch;
pub use server::SignalingServer;
pub use types::{ConnectionId, OutboundMessage, PEER_UNREACHABLE, RelayError, RoomName};
