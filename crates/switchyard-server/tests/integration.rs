//! End-to-end tests: real TCP agents against a real HTTP control surface.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::timeout;

use switchyard_core::events::{DisconnectReason, RelayEvent};
use switchyard_core::ids::ClientId;
use switchyard_server::{ServerConfig, ServerHandle};

const TIMEOUT: Duration = Duration::from_secs(5);

/// A fake agent speaking the line protocol over a real socket.
struct Agent {
    id: ClientId,
    lines: Lines<BufReader<OwnedReadHalf>>,
    tx: OwnedWriteHalf,
}

impl Agent {
    async fn connect(handle: &ServerHandle, events: &mut broadcast::Receiver<RelayEvent>) -> Self {
        let stream = TcpStream::connect(handle.agent_addr).await.unwrap();
        let (rx, tx) = stream.into_split();
        let id = loop {
            match timeout(TIMEOUT, events.recv()).await.unwrap().unwrap() {
                RelayEvent::ClientConnected { client_id } => break client_id,
                _ => continue,
            }
        };
        Self {
            id,
            lines: BufReader::new(rx).lines(),
            tx,
        }
    }

    async fn next_command(&mut self) -> Value {
        let line = timeout(TIMEOUT, self.lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .expect("agent socket closed");
        serde_json::from_str(&line).unwrap()
    }

    async fn reply(&mut self, body: Value) {
        let mut line = body.to_string();
        line.push('\n');
        self.tx.write_all(line.as_bytes()).await.unwrap();
    }
}

async fn boot_server() -> (ServerHandle, broadcast::Receiver<RelayEvent>, String) {
    let handle = switchyard_server::start(ServerConfig::default()).await.unwrap();
    let events = handle.subscribe();
    let base = format!("http://{}", handle.http_addr);
    (handle, events, base)
}

async fn wait_for(
    events: &mut broadcast::Receiver<RelayEvent>,
    matches: impl Fn(&RelayEvent) -> bool,
) -> RelayEvent {
    loop {
        let event = timeout(TIMEOUT, events.recv()).await.unwrap().unwrap();
        if matches(&event) {
            return event;
        }
    }
}

#[tokio::test]
async fn agent_bootstrap_shows_up_in_listing() {
    let (handle, mut events, base) = boot_server().await;
    let mut agent = Agent::connect(&handle, &mut events).await;

    let bootstrap = agent.next_command().await;
    assert_eq!(bootstrap, json!({ "type": "get_system_info", "payload": {} }));

    agent
        .reply(json!({
            "status": "system_info",
            "message": "",
            "data": { "hostname": "box-1", "os": "linux", "id": "spoofed" }
        }))
        .await;

    let client = reqwest::Client::new();
    let listing = timeout(TIMEOUT, async {
        loop {
            let listing: Vec<Value> = client
                .get(format!("{base}/api/clients"))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if listing.len() == 1 && listing[0].get("hostname").is_some() {
                return listing;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    let entry = &listing[0];
    assert_eq!(entry["id"], agent.id.as_str());
    assert_eq!(entry["hostname"], "box-1");
    assert_eq!(entry["os"], "linux");
    assert_eq!(entry["streaming"], false);
    assert!(entry["last_active"].as_str().unwrap().ends_with('Z'));
    assert!(entry["connected_at"].is_string());

    let single: Value = client
        .get(format!("{base}/api/client/{}", agent.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(single["hostname"], "box-1");

    handle.shutdown(TIMEOUT).await;
}

#[tokio::test]
async fn command_to_unknown_client_is_404() {
    let (handle, mut events, base) = boot_server().await;
    let _agent = Agent::connect(&handle, &mut events).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/command"))
        .json(&json!({ "client_id": "unknown-id", "type": "ping" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "not_found");

    assert_eq!(handle.registry().count(), 1);
    handle.shutdown(TIMEOUT).await;
}

#[tokio::test]
async fn command_round_trip_records_result() {
    let (handle, mut events, base) = boot_server().await;
    let mut agent = Agent::connect(&handle, &mut events).await;
    agent.next_command().await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/api/command"))
        .json(&json!({
            "client_id": agent.id.as_str(),
            "type": "exec",
            "payload": { "cmd": "uptime" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "success");

    let command = agent.next_command().await;
    assert_eq!(command["type"], "exec");
    assert_eq!(command["payload"]["cmd"], "uptime");

    agent
        .reply(json!({
            "status": "command_result",
            "message": "up 3 days",
            "data": { "exit_code": "0" }
        }))
        .await;
    wait_for(&mut events, |e| matches!(e, RelayEvent::CommandResult { .. })).await;

    let results: Vec<Value> = client
        .get(format!("{base}/api/client/{}/results", agent.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["message"], "up 3 days");
    assert_eq!(results[0]["data"]["exit_code"], "0");

    handle.shutdown(TIMEOUT).await;
}

#[tokio::test]
async fn stream_toggle_sends_commands() {
    let (handle, mut events, base) = boot_server().await;
    let mut agent = Agent::connect(&handle, &mut events).await;
    agent.next_command().await;

    let client = reqwest::Client::new();
    let url = format!("{base}/api/stream?client_id={}&type=screen", agent.id);

    let resp = client.post(&url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "stream_started");
    assert_eq!(
        agent.next_command().await,
        json!({ "type": "start_stream", "payload": { "type": "screen" } })
    );
    assert!(handle.registry().lookup(&agent.id).unwrap().is_streaming());

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), 501);

    let resp = client.delete(&url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "stream_stopped");
    assert_eq!(agent.next_command().await["type"], "stop_stream");
    assert!(!handle.registry().lookup(&agent.id).unwrap().is_streaming());

    let resp = client
        .post(format!("{base}/api/stream?client_id=nobody&type=screen"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    handle.shutdown(TIMEOUT).await;
}

#[tokio::test]
async fn stream_data_is_published() {
    let (handle, mut events, _base) = boot_server().await;
    let mut agent = Agent::connect(&handle, &mut events).await;
    agent.next_command().await;

    agent
        .reply(json!({ "status": "stream_data", "message": "frame", "data": { "seq": "1" } }))
        .await;

    let event = wait_for(&mut events, |e| matches!(e, RelayEvent::StreamData { .. })).await;
    match event {
        RelayEvent::StreamData {
            client_id,
            message,
            data,
        } => {
            assert_eq!(client_id, agent.id);
            assert_eq!(message, "frame");
            assert_eq!(data["seq"], "1");
        }
        other => panic!("unexpected event {other:?}"),
    }

    handle.shutdown(TIMEOUT).await;
}

#[tokio::test]
async fn remote_close_removes_client() {
    let (handle, mut events, base) = boot_server().await;
    let mut agent = Agent::connect(&handle, &mut events).await;
    agent.next_command().await;
    let id = agent.id.clone();
    drop(agent);

    let event = wait_for(&mut events, |e| {
        matches!(e, RelayEvent::ClientDisconnected { .. })
    })
    .await;
    assert!(matches!(
        event,
        RelayEvent::ClientDisconnected {
            reason: DisconnectReason::Eof,
            ..
        }
    ));

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{base}/api/client/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .post(format!("{base}/api/command"))
        .json(&json!({ "client_id": id.as_str(), "type": "ping" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["clients"], 0);

    handle.shutdown(TIMEOUT).await;
}

#[tokio::test]
async fn malformed_line_keeps_connection() {
    let (handle, mut events, _base) = boot_server().await;
    let mut agent = Agent::connect(&handle, &mut events).await;
    agent.next_command().await;

    agent.tx.write_all(b"{not json\n").await.unwrap();
    agent
        .reply(json!({ "status": "command_result", "message": "still here", "data": {} }))
        .await;

    let event = wait_for(&mut events, |e| {
        matches!(e, RelayEvent::CommandResult { .. } | RelayEvent::ClientDisconnected { .. })
    })
    .await;
    assert!(matches!(event, RelayEvent::CommandResult { .. }));
    assert!(handle.registry().lookup(&agent.id).is_ok());

    handle.shutdown(TIMEOUT).await;
}

#[tokio::test]
async fn shutdown_closes_agent_sockets() {
    let (handle, mut events, _base) = boot_server().await;
    let mut agent = Agent::connect(&handle, &mut events).await;
    agent.next_command().await;

    handle.shutdown(TIMEOUT).await;

    let next = timeout(TIMEOUT, agent.lines.next_line()).await.unwrap();
    assert!(matches!(next, Ok(None) | Err(_)));
}
