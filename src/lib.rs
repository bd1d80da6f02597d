//! Rendezvous relay: lets a browser peer and a device peer find each other by
//! a shared room name and exchange WebRTC handshake envelopes.

pub mod config;
pub mod signaling;
