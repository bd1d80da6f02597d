use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use super::actor::RelayHandle;
use super::messages::{ClientMessage, ServerMessage};
use super::types::{ConnectionId, OutboundMessage, RelayError};
use crate::config::RelayConfig;

#[derive(Debug, Clone, Copy)]
struct KeepAlive {
    ping_interval: Duration,
    pong_timeout: Duration,
}

pub struct SignalingServer {
    listener: TcpListener,
    handle: RelayHandle,
    keep_alive: KeepAlive,
}

impl SignalingServer {
    /// Bind the listener and start the relay actor
    pub async fn bind(config: &RelayConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Signaling relay listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            handle: RelayHandle::spawn(config.command_buffer),
            keep_alive: KeepAlive {
                ping_interval: config.ping_interval(),
                pong_timeout: config.pong_timeout(),
            },
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let handle = self.handle.clone();
            let keep_alive = self.keep_alive;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, handle, keep_alive).await {
                    error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: RelayHandle,
    keep_alive: KeepAlive,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<Message>();

    let id = handle.attach(tx.clone()).await?;
    info!("WebSocket connection {} from {}", id, addr);
    let hello = ServerMessage::Connected { id };
    match hello.to_outbound() {
        Ok(msg) => {
            let _ = tx.send(msg);
        }
        Err(e) => warn!("Cannot announce id to {}: {}", id, e),
    }

    let mut ping_interval = tokio::time::interval(keep_alive.ping_interval);
    // the first tick fires immediately
    ping_interval.tick().await;
    // set while a Ping is unanswered
    let mut pong_deadline: Option<tokio::time::Instant> = None;

    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    let ws_msg = Message::Text(msg.into_inner());
                    if ws_tx.send(ws_msg).await.is_err() {
                        break;
                    }
                }
                Some(ctrl_msg) = ctrl_rx.recv() => {
                    if ws_tx.send(ctrl_msg).await.is_err() {
                        break;
                    }
                }
                else => break,
            }
        }
    });

    loop {
        let pong_timeout = async move {
            match pong_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = ping_interval.tick() => {
                if pong_deadline.is_some() {
                    warn!("No Pong received, disconnecting {}", id);
                    break;
                }
                if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                    break;
                }
                pong_deadline = Some(tokio::time::Instant::now() + keep_alive.pong_timeout);
                debug!("Ping sent to {}", id);
            }

            _ = pong_timeout => {
                warn!("Pong timeout, disconnecting {}", id);
                break;
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!("WebSocket error on {}: {}", id, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => {
                        if handle_text_message(&text, id, &handle).await.is_err() {
                            // relay actor is gone
                            break;
                        }
                    }
                    Message::Pong(_) => {
                        pong_deadline = None;
                        debug!("Pong received from {}", id);
                    }
                    Message::Close(_) => {
                        info!("Close received from {}", id);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    handle.detach(id).await;

    send_task.abort();
    info!("WebSocket disconnected: {} ({})", id, addr);

    Ok(())
}

/// Parse one text frame and hand it to the relay. Frames the relay cannot
/// understand are dropped here; only a dead actor is reported as an error.
async fn handle_text_message(
    text: &str,
    id: ConnectionId,
    handle: &RelayHandle,
) -> Result<(), RelayError> {
    match ClientMessage::parse(text) {
        Ok(Some(msg)) => handle.dispatch(id, msg).await,
        Ok(None) => {
            debug!("Ignoring unknown event from {}", id);
            Ok(())
        }
        Err(e) => {
            debug!("Ignoring invalid frame from {}: {}", id, e);
            Ok(())
        }
    }
}
