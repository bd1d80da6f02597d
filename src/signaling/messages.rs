use serde::{Deserialize, Serialize};
use serde_json::value::{RawValue, to_raw_value};
use serde_json::{Map, Value, json};

use super::types::{ConnectionId, OutboundMessage, RelayError, RoomName};

/// Wire shape of every inbound frame: `{"event": .., "data": .., "ack": ..}`
#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Option<Box<RawValue>>,
    #[serde(default)]
    ack: Option<u64>,
}

/// Messages sent from client to server
#[derive(Debug)]
pub enum ClientMessage {
    /// Join the room named in the payload. `None` when the name is missing or blank.
    CreateOrJoin(Option<RoomName>),

    /// Ask whether anyone listens on `probe.to`
    CanConnect {
        probe: Option<Envelope>,
        responder: Responder,
    },

    /// Browser -> device, fanned out to every member of `to`
    MessageToDevice(Option<Envelope>),

    /// Device -> browser, fanned out to the other members of `to`
    MessageToBrowser(Option<Envelope>),

    Bye,
}

/// How a failed request is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Responder {
    /// The request carried an ack id; answer with an `ack` frame
    Ack(u64),
    /// No ack id; answer with an `error` envelope on `messageToBrowser`
    Emit,
}

impl ClientMessage {
    /// Parse a text frame. Returns `Ok(None)` for events the relay does not handle.
    pub fn parse(text: &str) -> Result<Option<Self>, RelayError> {
        let frame: RawFrame = serde_json::from_str(text)?;

        let msg = match frame.event.as_str() {
            "createOrJoin" => ClientMessage::CreateOrJoin(frame.data.and_then(room_from_raw)),
            "canConnect" => ClientMessage::CanConnect {
                probe: frame.data.and_then(Envelope::from_raw),
                responder: match frame.ack {
                    Some(id) => Responder::Ack(id),
                    None => Responder::Emit,
                },
            },
            "messageToDevice" => {
                ClientMessage::MessageToDevice(frame.data.and_then(Envelope::from_raw))
            }
            "messageToBrowser" => {
                ClientMessage::MessageToBrowser(frame.data.and_then(Envelope::from_raw))
            }
            "bye" => ClientMessage::Bye,
            _ => return Ok(None),
        };

        Ok(Some(msg))
    }
}

fn room_from_raw(raw: Box<RawValue>) -> Option<RoomName> {
    let name: String = serde_json::from_str(raw.get()).ok()?;
    RoomName::parse(&name)
}

/// Envelope `type` tag. Tags the relay does not know are kept as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnvelopeKind {
    Offer,
    Answer,
    Candidate,
    Ready,
    Error,
    Log,
    Other(String),
}

impl From<String> for EnvelopeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "offer" => EnvelopeKind::Offer,
            "answer" => EnvelopeKind::Answer,
            "candidate" => EnvelopeKind::Candidate,
            "ready" => EnvelopeKind::Ready,
            "error" => EnvelopeKind::Error,
            "log" => EnvelopeKind::Log,
            _ => EnvelopeKind::Other(s),
        }
    }
}

impl From<EnvelopeKind> for String {
    fn from(kind: EnvelopeKind) -> Self {
        match kind {
            EnvelopeKind::Offer => "offer".to_string(),
            EnvelopeKind::Answer => "answer".to_string(),
            EnvelopeKind::Candidate => "candidate".to_string(),
            EnvelopeKind::Ready => "ready".to_string(),
            EnvelopeKind::Error => "error".to_string(),
            EnvelopeKind::Log => "log".to_string(),
            EnvelopeKind::Other(s) => s,
        }
    }
}

/// Only `to` is typed; `from` and `type` may be any JSON value
#[derive(Debug, Deserialize)]
struct EnvelopeHeader {
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    from: Option<Value>,
    #[serde(rename = "type", default)]
    kind: Option<Value>,
}

/// An addressed message. Only the header is decoded; the payload is kept as
/// the sender's original JSON text and forwarded without re-encoding.
#[derive(Debug)]
pub struct Envelope {
    to: RoomName,
    from: Option<Value>,
    kind: Option<EnvelopeKind>,
    raw: Box<RawValue>,
}

impl Envelope {
    /// `None` unless `raw` is an object with a non-blank string `to`
    pub fn from_raw(raw: Box<RawValue>) -> Option<Self> {
        let header: EnvelopeHeader = serde_json::from_str(raw.get()).ok()?;
        let to = RoomName::parse(header.to.as_deref()?)?;
        Some(Self {
            to,
            from: header.from,
            kind: match header.kind {
                Some(Value::String(tag)) => Some(EnvelopeKind::from(tag)),
                _ => None,
            },
            raw,
        })
    }

    pub fn to(&self) -> &RoomName {
        &self.to
    }

    pub fn sender(&self) -> Option<&Value> {
        self.from.as_ref()
    }

    pub fn kind(&self) -> Option<&EnvelopeKind> {
        self.kind.as_ref()
    }

    pub fn as_raw(&self) -> &RawValue {
        &self.raw
    }

    pub fn into_raw(self) -> Box<RawValue> {
        self.raw
    }

    /// The same envelope turned around: `from`/`to` swapped, `type` set to
    /// `error` and `msg` set to `reason`. Every other field is kept.
    pub fn into_error_reply(self, reason: &str) -> Result<Box<RawValue>, RelayError> {
        let mut fields: Map<String, Value> = serde_json::from_str(self.raw.get())?;
        let from = fields.remove("from");
        let to = fields.remove("to");
        if let Some(to) = to {
            fields.insert("from".to_string(), to);
        }
        if let Some(from) = from {
            fields.insert("to".to_string(), from);
        }
        fields.insert("type".to_string(), Value::from(String::from(EnvelopeKind::Error)));
        fields.insert("msg".to_string(), Value::from(reason));
        Ok(to_raw_value(&fields)?)
    }

    /// A fresh `error` envelope addressed back to the sender of this one
    pub fn unreachable_reply(&self, reason: &str) -> Result<Box<RawValue>, RelayError> {
        let reply = json!({
            "type": EnvelopeKind::Error,
            "from": self.to,
            "to": self.from,
            "msg": reason,
        });
        Ok(to_raw_value(&reply)?)
    }
}

/// Messages sent from server to client
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerMessage {
    /// First frame on every connection
    Connected { id: ConnectionId },

    /// Room joined
    Created { data: RoomName },

    /// Relay-originated diagnostic
    Log { data: Vec<String> },

    AskToConnect { data: Box<RawValue> },

    MessageToDevice { data: Box<RawValue> },

    MessageToBrowser { data: Box<RawValue> },

    /// Answer to a request that carried an ack id
    Ack { id: u64, data: Vec<String> },
}

impl ServerMessage {
    pub fn log(text: impl Into<String>) -> Self {
        ServerMessage::Log {
            data: vec!["log from server:".to_string(), text.into()],
        }
    }

    pub fn to_outbound(&self) -> Result<OutboundMessage, RelayError> {
        Ok(OutboundMessage::from(serde_json::to_string(self)?))
    }
}
