//! Relay configuration, from command-line flags or the environment.

use std::time::Duration;

use clap::Parser;

use crate::signaling::RelayError;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:10900";
pub const DEFAULT_PING_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_PONG_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_COMMAND_BUFFER: usize = 1024;

/// Rendezvous signaling relay
///
/// Lets a browser peer and a device peer meet in a room named after the
/// device and exchange WebRTC handshake envelopes.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct RelayConfig {
    /// Address the WebSocket listener binds to
    #[arg(long, default_value = DEFAULT_BIND_ADDR, env = "RELAY_BIND_ADDR")]
    pub bind_addr: String,

    /// How often each connection is pinged, in milliseconds
    #[arg(long, default_value_t = DEFAULT_PING_INTERVAL_MS, env = "RELAY_PING_INTERVAL_MS")]
    pub ping_interval_ms: u64,

    /// How long a Pong may take before the connection is dropped, in milliseconds
    #[arg(long, default_value_t = DEFAULT_PONG_TIMEOUT_MS, env = "RELAY_PONG_TIMEOUT_MS")]
    pub pong_timeout_ms: u64,

    /// Capacity of the relay actor's command queue
    #[arg(long, default_value_t = DEFAULT_COMMAND_BUFFER, env = "RELAY_COMMAND_BUFFER")]
    pub command_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            ping_interval_ms: DEFAULT_PING_INTERVAL_MS,
            pong_timeout_ms: DEFAULT_PONG_TIMEOUT_MS,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl RelayConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.ping_interval_ms == 0 {
            return Err(RelayError::Config("ping interval must be non-zero".to_string()));
        }
        if self.command_buffer == 0 {
            return Err(RelayError::Config("command buffer must be non-zero".to_string()));
        }
        Ok(())
    }
}
