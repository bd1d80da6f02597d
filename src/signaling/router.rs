//! Routing rules for client requests.
//!
//! Every request kind maps to one function below. Unreachable targets are
//! answered locally; malformed requests are dropped.

use tracing::{debug, info};

use super::messages::{ClientMessage, Envelope, Responder, ServerMessage};
use super::registry::Registry;
use super::types::{ConnectionId, PEER_UNREACHABLE, RelayError, RoomName};

/// Apply one request from `from` to the registry
pub fn dispatch(
    registry: &mut Registry,
    from: ConnectionId,
    msg: ClientMessage,
) -> Result<(), RelayError> {
    match msg {
        ClientMessage::CreateOrJoin(room) => create_or_join(registry, from, room),
        ClientMessage::CanConnect { probe, responder } => {
            can_connect(registry, from, probe, responder)
        }
        ClientMessage::MessageToDevice(envelope) => message_to_device(registry, from, envelope),
        ClientMessage::MessageToBrowser(envelope) => message_to_browser(registry, from, envelope),
        ClientMessage::Bye => {
            info!("Received bye from {}", from);
            Ok(())
        }
    }
}

fn create_or_join(
    registry: &mut Registry,
    from: ConnectionId,
    room: Option<RoomName>,
) -> Result<(), RelayError> {
    let Some(room) = room else {
        debug!("Ignoring createOrJoin without room name from {}", from);
        return Ok(());
    };
    if !registry.is_attached(from) {
        return Ok(());
    }

    registry.send(
        from,
        ServerMessage::log(format!("Received request to create {}", room)).to_outbound()?,
    );
    if registry.join(from, room.clone()) {
        info!("Connection {} joined room {}", from, room);
    }
    registry.send(from, ServerMessage::Created { data: room }.to_outbound()?);
    Ok(())
}

fn can_connect(
    registry: &mut Registry,
    from: ConnectionId,
    probe: Option<Envelope>,
    responder: Responder,
) -> Result<(), RelayError> {
    let Some(probe) = probe else {
        debug!("Ignoring canConnect without target from {}", from);
        return Ok(());
    };
    let to = probe.to().clone();

    if registry.is_present(to.as_str()) {
        let msg = ServerMessage::AskToConnect {
            data: probe.into_raw(),
        }
        .to_outbound()?;
        let delivered = registry.broadcast(to.as_str(), &msg, None);
        debug!("askToConnect from {} to {} ({} recipients)", from, to, delivered);
        return Ok(());
    }

    debug!("canConnect from {}: {} not present", from, to);
    let reply = match responder {
        Responder::Ack(id) => ServerMessage::Ack {
            id,
            data: vec![RelayError::PeerUnreachable(to).to_string()],
        },
        Responder::Emit => ServerMessage::MessageToBrowser {
            data: probe.unreachable_reply(PEER_UNREACHABLE)?,
        },
    };
    registry.send(from, reply.to_outbound()?);
    Ok(())
}

fn message_to_device(
    registry: &mut Registry,
    from: ConnectionId,
    envelope: Option<Envelope>,
) -> Result<(), RelayError> {
    let Some(envelope) = envelope else {
        debug!("Ignoring messageToDevice without target from {}", from);
        return Ok(());
    };
    let to = envelope.to().clone();

    if registry.is_present(to.as_str()) {
        debug!("messageToDevice {:?} from {} to {}", envelope.kind(), from, to);
        let msg = ServerMessage::MessageToDevice {
            data: envelope.into_raw(),
        }
        .to_outbound()?;
        registry.broadcast(to.as_str(), &msg, None);
        return Ok(());
    }

    debug!("messageToDevice from {}: {} not present, bouncing", from, to);
    let reply = ServerMessage::MessageToBrowser {
        data: envelope.into_error_reply(PEER_UNREACHABLE)?,
    };
    registry.send(from, reply.to_outbound()?);
    Ok(())
}

fn message_to_browser(
    registry: &mut Registry,
    from: ConnectionId,
    envelope: Option<Envelope>,
) -> Result<(), RelayError> {
    let Some(envelope) = envelope else {
        debug!("Ignoring messageToBrowser without target from {}", from);
        return Ok(());
    };
    let to = envelope.to().clone();
    let kind = envelope.kind().cloned();

    let msg = ServerMessage::MessageToBrowser {
        data: envelope.into_raw(),
    }
    .to_outbound()?;
    let delivered = registry.broadcast(to.as_str(), &msg, Some(from));
    if delivered == 0 {
        debug!("messageToBrowser from {} to {} dropped (no listeners)", from, to);
    } else {
        debug!("messageToBrowser {:?} from {} to {}", kind, from, to);
    }
    Ok(())
}
