use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use rendezvous::config::RelayConfig;
use rendezvous::signaling::{PEER_UNREACHABLE, RelayHandle, RoomName, SignalingServer};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> (SocketAddr, RelayHandle) {
    start_server_with(RelayConfig::default()).await
}

async fn start_server_with(config: RelayConfig) -> (SocketAddr, RelayHandle) {
    let config = RelayConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        ..config
    };
    let server = SignalingServer::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.handle();
    tokio::spawn(server.run());
    (addr, handle)
}

/// Connect and return the client with the id the relay assigned
async fn connect(addr: SocketAddr) -> (Client, String) {
    let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    let hello = next_event(&mut ws).await;
    assert_eq!(hello["event"], "connected");
    let id = hello["id"].as_str().unwrap().to_string();
    (ws, id)
}

async fn next_text(ws: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return text.as_str().to_string();
        }
    }
}

async fn next_event(ws: &mut Client) -> Value {
    serde_json::from_str(&next_text(ws).await).unwrap()
}

async fn send(ws: &mut Client, frame: String) {
    ws.send(Message::text(frame)).await.unwrap();
}

async fn wait_until_absent(handle: &RelayHandle, room: &str) {
    let room = RoomName::parse(room).unwrap();
    tokio::time::timeout(WAIT, async {
        while handle.is_present(room.clone()).await.unwrap() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("room never emptied");
}

#[tokio::test]
async fn browser_and_device_rendezvous() {
    let (addr, handle) = start_server().await;
    let (mut device, device_id) = connect(addr).await;
    let (mut browser, browser_id) = connect(addr).await;
    assert_ne!(device_id, browser_id);

    send(&mut device, json!({"event": "createOrJoin", "data": "deviceX"}).to_string()).await;
    assert_eq!(next_event(&mut device).await["event"], "log");
    assert_eq!(
        next_event(&mut device).await,
        json!({"event": "created", "data": "deviceX"})
    );

    send(
        &mut browser,
        json!({"event": "canConnect", "data": {"to": "deviceX", "from": browser_id}, "ack": 1})
            .to_string(),
    )
    .await;
    assert_eq!(
        next_event(&mut device).await,
        json!({"event": "askToConnect", "data": {"to": "deviceX", "from": browser_id}})
    );

    let offer = format!(
        r#"{{"to":"deviceX","from":"{}","type":"offer","sdp":"v=0\r\n"}}"#,
        browser_id
    );
    send(
        &mut browser,
        format!(r#"{{"event":"messageToDevice","data":{}}}"#, offer),
    )
    .await;
    assert_eq!(
        next_text(&mut device).await,
        format!(r#"{{"event":"messageToDevice","data":{}}}"#, offer)
    );

    send(
        &mut device,
        json!({
            "event": "messageToBrowser",
            "data": {"to": browser_id, "from": device_id, "type": "answer", "sdp": "v=0"}
        })
        .to_string(),
    )
    .await;
    let answer = next_event(&mut browser).await;
    assert_eq!(answer["event"], "messageToBrowser");
    assert_eq!(answer["data"]["type"], "answer");
    assert_eq!(answer["data"]["from"], device_id.as_str());

    device.close(None).await.unwrap();
    wait_until_absent(&handle, "deviceX").await;

    send(
        &mut browser,
        json!({
            "event": "messageToDevice",
            "data": {"to": "deviceX", "from": browser_id, "type": "candidate"}
        })
        .to_string(),
    )
    .await;
    let bounced = next_event(&mut browser).await;
    assert_eq!(bounced["event"], "messageToBrowser");
    assert_eq!(bounced["data"]["type"], "error");
    assert_eq!(bounced["data"]["from"], "deviceX");
    assert_eq!(bounced["data"]["to"], browser_id.as_str());
    assert_eq!(bounced["data"]["msg"], PEER_UNREACHABLE);
}

#[tokio::test]
async fn can_connect_to_absent_device_answers_by_ack_or_envelope() {
    let (addr, _handle) = start_server().await;
    let (mut browser, browser_id) = connect(addr).await;

    send(
        &mut browser,
        json!({"event": "canConnect", "data": {"to": "nobody", "from": browser_id}, "ack": 42})
            .to_string(),
    )
    .await;
    assert_eq!(
        next_event(&mut browser).await,
        json!({"event": "ack", "id": 42, "data": [PEER_UNREACHABLE]})
    );

    send(
        &mut browser,
        json!({"event": "canConnect", "data": {"to": "nobody", "from": browser_id}}).to_string(),
    )
    .await;
    assert_eq!(
        next_event(&mut browser).await,
        json!({
            "event": "messageToBrowser",
            "data": {"type": "error", "from": "nobody", "to": browser_id, "msg": PEER_UNREACHABLE}
        })
    );
}

#[tokio::test]
async fn malformed_frames_do_not_break_the_connection() {
    let (addr, _handle) = start_server().await;
    let (mut client, _id) = connect(addr).await;

    for frame in [
        "not json",
        r#"{"event":"messageToDevice"}"#,
        r#"{"event":"createOrJoin","data":""}"#,
        r#"{"event":"teleport","data":{}}"#,
        r#"{"event":"bye"}"#,
    ] {
        send(&mut client, frame.to_string()).await;
    }

    send(&mut client, json!({"event": "createOrJoin", "data": "room1"}).to_string()).await;
    let first = next_event(&mut client).await;
    assert_eq!(first["event"], "log");
    assert_eq!(first["data"][1], "Received request to create room1");
}

#[tokio::test]
async fn silent_client_is_dropped_after_pong_timeout() {
    let (addr, handle) = start_server_with(RelayConfig {
        ping_interval_ms: 100,
        pong_timeout_ms: 50,
        ..RelayConfig::default()
    })
    .await;
    let (mut device, _id) = connect(addr).await;

    send(&mut device, json!({"event": "createOrJoin", "data": "dev"}).to_string()).await;
    assert_eq!(next_event(&mut device).await["event"], "log");
    assert_eq!(next_event(&mut device).await["event"], "created");
    assert!(handle.is_present(RoomName::parse("dev").unwrap()).await.unwrap());

    // stop reading, so Pings are never answered
    wait_until_absent(&handle, "dev").await;
    drop(device);
}
